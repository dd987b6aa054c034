//! The Oracle REST API.
//!
//! - `POST /v1/channel/open`
//! - `POST /v1/channel/join`
//! - `POST /v1/channel/update`
//! - `POST /v1/channel/leave`
//! - `GET /v1/channel/:id/state`
//! - `GET /v1/channel/:id/history`
use std::sync::Arc;

use adapter::prelude::*;
use axum::{
    extract::Path,
    routing::{get, post},
    Extension, Json, Router,
};
use primitives::{
    chain::ChainReader,
    oracle::{HistoryResponse, StateResponse, TokenRequest, TokenResponse, UpdateRequest},
    storage::{ContentStore, NamingService},
    ChannelId, SenderEnvelope,
};

use crate::{oracle::Accepted, response::ResponseError, Error, Oracle};

pub fn channel_router<C, S, N, R>() -> Router
where
    C: Unlocked + 'static,
    S: ContentStore + 'static,
    N: NamingService + 'static,
    R: ChainReader + 'static,
{
    Router::new()
        .route("/open", post(open_channel::<C, S, N, R>))
        .route("/join", post(join_channel::<C, S, N, R>))
        .route("/update", post(update_channel::<C, S, N, R>))
        .route("/leave", post(leave_channel::<C, S, N, R>))
        .route("/:id/state", get(channel_state::<C, S, N, R>))
        .route("/:id/history", get(channel_history::<C, S, N, R>))
}

/// `POST /v1/channel/open`
pub async fn open_channel<C, S, N, R>(
    Extension(oracle): Extension<Arc<Oracle<C, S, N, R>>>,
    Json(request): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, ResponseError>
where
    C: Unlocked + 'static,
    S: ContentStore + 'static,
    N: NamingService + 'static,
    R: ChainReader + 'static,
{
    let envelope = SenderEnvelope::from_hex(&request.token).map_err(Error::from)?;

    token_response(oracle.open(envelope).await?)
}

/// `POST /v1/channel/join`
pub async fn join_channel<C, S, N, R>(
    Extension(oracle): Extension<Arc<Oracle<C, S, N, R>>>,
    Json(request): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, ResponseError>
where
    C: Unlocked + 'static,
    S: ContentStore + 'static,
    N: NamingService + 'static,
    R: ChainReader + 'static,
{
    let envelope = SenderEnvelope::from_hex(&request.token).map_err(Error::from)?;

    token_response(oracle.join(envelope).await?)
}

/// `POST /v1/channel/update`
pub async fn update_channel<C, S, N, R>(
    Extension(oracle): Extension<Arc<Oracle<C, S, N, R>>>,
    Json(request): Json<UpdateRequest>,
) -> Result<Json<TokenResponse>, ResponseError>
where
    C: Unlocked + 'static,
    S: ContentStore + 'static,
    N: NamingService + 'static,
    R: ChainReader + 'static,
{
    let envelope = SenderEnvelope::from_hex(&request.token).map_err(Error::from)?;

    token_response(
        oracle
            .update(envelope, request.amount, request.receiver)
            .await?,
    )
}

/// `POST /v1/channel/leave`
pub async fn leave_channel<C, S, N, R>(
    Extension(oracle): Extension<Arc<Oracle<C, S, N, R>>>,
    Json(request): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, ResponseError>
where
    C: Unlocked + 'static,
    S: ContentStore + 'static,
    N: NamingService + 'static,
    R: ChainReader + 'static,
{
    let envelope = SenderEnvelope::from_hex(&request.token).map_err(Error::from)?;

    token_response(oracle.leave(envelope).await?)
}

/// `GET /v1/channel/:id/state`
pub async fn channel_state<C, S, N, R>(
    Extension(oracle): Extension<Arc<Oracle<C, S, N, R>>>,
    Path(channel_id): Path<ChannelId>,
) -> Result<Json<StateResponse>, ResponseError>
where
    C: Unlocked + 'static,
    S: ContentStore + 'static,
    N: NamingService + 'static,
    R: ChainReader + 'static,
{
    let snapshot = oracle.state(&channel_id).await?;

    Ok(Json(StateResponse {
        channel_id,
        cid: snapshot.pointer,
        state: snapshot.state.into_participants(),
    }))
}

/// `GET /v1/channel/:id/history`
pub async fn channel_history<C, S, N, R>(
    Extension(oracle): Extension<Arc<Oracle<C, S, N, R>>>,
    Path(channel_id): Path<ChannelId>,
) -> Result<Json<HistoryResponse>, ResponseError>
where
    C: Unlocked + 'static,
    S: ContentStore + 'static,
    N: NamingService + 'static,
    R: ChainReader + 'static,
{
    let history = oracle.history(&channel_id).await?;

    Ok(Json(HistoryResponse {
        channel_id,
        history,
    }))
}

fn token_response(accepted: Accepted) -> Result<Json<TokenResponse>, ResponseError> {
    Ok(Json(TokenResponse {
        token: accepted.token.to_hex().map_err(Error::from)?,
        cid: accepted.pointer,
    }))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::{settle_open, setup_oracle, sign_envelope, DummyOracle};
    use adapter::{
        dummy::{DummyChain, MemoryNaming, MemoryStore},
        ed25519::{Ed25519, UnlockedWallet},
        test_util::{keypair_adapter, ALICE_SECRET, BOB_SECRET},
    };
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
        Router,
    };
    use pretty_assertions::assert_eq;
    use primitives::{
        oracle::ErrorResponse,
        test_util::{join_action, open_action, update_action, ALICE, BOB, CHANNEL_ID},
        OracleToken, Participant, PrevState,
    };
    use serde::{de::DeserializeOwned, Serialize};
    use tower::ServiceExt;

    fn router(oracle: Arc<DummyOracle>) -> Router {
        Router::new()
            .nest(
                "/v1/channel",
                channel_router::<Ed25519<UnlockedWallet>, MemoryStore, MemoryNaming, DummyChain>(),
            )
            .layer(Extension(oracle))
    }

    async fn request<T: DeserializeOwned>(
        router: &Router,
        method: Method,
        uri: &str,
        body: Option<impl Serialize>,
    ) -> (StatusCode, T) {
        let body = match body {
            Some(body) => Body::from(serde_json::to_vec(&body).expect("Should serialize")),
            None => Body::empty(),
        };
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(body)
            .expect("Should build Request");

        let response = router
            .clone()
            .oneshot(request)
            .await
            .expect("Router is infallible");
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body())
            .await
            .expect("Should read the body");

        (
            status,
            serde_json::from_slice(&bytes).expect("Should deserialize the body"),
        )
    }

    #[tokio::test]
    async fn open_join_and_update_over_http() {
        let setup = setup_oracle();
        let router = router(setup.oracle.clone());
        let alice = keypair_adapter(&ALICE_SECRET);
        let bob = keypair_adapter(&BOB_SECRET);

        let open = sign_envelope(&alice, open_action(&CHANNEL_ID, *ALICE, 100), PrevState::Genesis);
        let (status, opened) = request::<TokenResponse>(
            &router,
            Method::POST,
            "/v1/channel/open",
            Some(TokenRequest {
                token: open.to_hex().unwrap(),
            }),
        )
        .await;
        assert_eq!(StatusCode::OK, status);
        let token = OracleToken::from_hex(&opened.token).expect("Should decode the token");
        assert_eq!(open.signed_action(), token.action);

        let (status, error) = request::<ErrorResponse>(
            &router,
            Method::POST,
            "/v1/channel/open",
            Some(TokenRequest {
                token: open.to_hex().unwrap(),
            }),
        )
        .await;
        assert_eq!(StatusCode::CONFLICT, status);
        assert!(error.message.contains("already exists"));

        settle_open(&setup.chain, &CHANNEL_ID, *ALICE, 100);
        let join = sign_envelope(&bob, join_action(&CHANNEL_ID, *BOB, 50), PrevState::Genesis);
        let (status, joined) = request::<TokenResponse>(
            &router,
            Method::POST,
            "/v1/channel/join",
            Some(TokenRequest {
                token: join.to_hex().unwrap(),
            }),
        )
        .await;
        assert_eq!(StatusCode::OK, status);

        let update = sign_envelope(
            &alice,
            update_action(&CHANNEL_ID, *ALICE, &[(*ALICE, 70), (*BOB, 80)]),
            joined.cid.clone().into(),
        );
        let (status, updated) = request::<TokenResponse>(
            &router,
            Method::POST,
            "/v1/channel/update",
            Some(UpdateRequest {
                token: update.to_hex().unwrap(),
                amount: 30,
                receiver: *BOB,
            }),
        )
        .await;
        assert_eq!(StatusCode::OK, status);

        let (status, state) = request::<StateResponse>(
            &router,
            Method::GET,
            &format!("/v1/channel/{}/state", *CHANNEL_ID),
            None::<()>,
        )
        .await;
        assert_eq!(StatusCode::OK, status);
        assert_eq!(updated.cid, state.cid);
        assert_eq!(
            vec![
                Participant {
                    address: *ALICE,
                    balance: 70
                },
                Participant {
                    address: *BOB,
                    balance: 80
                }
            ],
            state.state
        );

        let (status, history) = request::<HistoryResponse>(
            &router,
            Method::GET,
            &format!("/v1/channel/{}/history", *CHANNEL_ID),
            None::<()>,
        )
        .await;
        assert_eq!(StatusCode::OK, status);
        assert_eq!(3, history.history.len());
        assert_eq!(updated.cid, history.history[0].pointer);
    }

    #[tokio::test]
    async fn error_responses() {
        let setup = setup_oracle();
        let router = router(setup.oracle.clone());

        let (status, error) = request::<ErrorResponse>(
            &router,
            Method::GET,
            "/v1/channel/unknown/state",
            None::<()>,
        )
        .await;
        assert_eq!(StatusCode::NOT_FOUND, status);
        assert_eq!("Channel unknown not found", error.message);

        let (status, _) = request::<ErrorResponse>(
            &router,
            Method::POST,
            "/v1/channel/join",
            Some(TokenRequest {
                token: "not hex".into(),
            }),
        )
        .await;
        assert_eq!(StatusCode::BAD_REQUEST, status);

        setup.naming.set_unavailable(true);
        let (status, _) = request::<ErrorResponse>(
            &router,
            Method::GET,
            "/v1/channel/unknown/state",
            None::<()>,
        )
        .await;
        assert_eq!(StatusCode::SERVICE_UNAVAILABLE, status);
    }
}
