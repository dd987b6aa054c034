//! An Oracle running in the same process, for testing the [`Driver`](crate::Driver)
//! without the REST API.
use std::sync::Arc;

use adapter::{
    dummy::{DummyChain, MemoryNaming, MemoryStore},
    ed25519::{Ed25519, UnlockedWallet},
    prelude::*,
    test_util::{keypair_adapter, ORACLE_SECRET},
};
use async_trait::async_trait;
use oracle::{
    register_oracle,
    response::ResponseError,
    test_util::{setup_oracle, Setup},
    Accepted, Oracle,
};
use primitives::{
    chain::ChainReader,
    history::DEFAULT_MAX_DEPTH,
    oracle::{HistoryResponse, StateResponse, TokenResponse},
    storage::{ContentStore, NamingService},
    test_util::PROGRAM_ID,
    util::logging::discard_logger,
    Address, ChannelId, Reconstructor, SenderEnvelope,
};
use reqwest::StatusCode;

use crate::{
    oracle_interface::{Error, OracleInterface},
    Driver,
};

pub struct InProcessOracle<C: Unlocked, S, N, R>(pub Arc<Oracle<C, S, N, R>>);

impl<C: Unlocked, S, N, R> Clone for InProcessOracle<C, S, N, R> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

#[async_trait]
impl<C, S, N, R> OracleInterface for InProcessOracle<C, S, N, R>
where
    C: Unlocked + 'static,
    S: ContentStore + 'static,
    N: NamingService + 'static,
    R: ChainReader + 'static,
{
    async fn open(&self, envelope: &SenderEnvelope) -> Result<TokenResponse, Error> {
        token_response(self.0.open(envelope.clone()).await)
    }

    async fn join(&self, envelope: &SenderEnvelope) -> Result<TokenResponse, Error> {
        token_response(self.0.join(envelope.clone()).await)
    }

    async fn update(
        &self,
        envelope: &SenderEnvelope,
        amount: u64,
        receiver: Address,
    ) -> Result<TokenResponse, Error> {
        token_response(self.0.update(envelope.clone(), amount, receiver).await)
    }

    async fn leave(&self, envelope: &SenderEnvelope) -> Result<TokenResponse, Error> {
        token_response(self.0.leave(envelope.clone()).await)
    }

    async fn state(&self, channel_id: &ChannelId) -> Result<StateResponse, Error> {
        let snapshot = self.0.state(channel_id).await.map_err(rejected)?;

        Ok(StateResponse {
            channel_id: channel_id.clone(),
            cid: snapshot.pointer,
            state: snapshot.state.into_participants(),
        })
    }

    async fn history(&self, channel_id: &ChannelId) -> Result<HistoryResponse, Error> {
        let history = self.0.history(channel_id).await.map_err(rejected)?;

        Ok(HistoryResponse {
            channel_id: channel_id.clone(),
            history,
        })
    }
}

fn token_response(accepted: Result<Accepted, oracle::Error>) -> Result<TokenResponse, Error> {
    let accepted = accepted.map_err(rejected)?;

    Ok(TokenResponse {
        token: accepted.token.to_hex()?,
        cid: accepted.pointer,
    })
}

/// The rejection the REST API would respond with.
fn rejected(error: oracle::Error) -> Error {
    let message = error.to_string();
    let status = StatusCode::from_u16(ResponseError::from(error).status().as_u16())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    Error::Rejected { status, message }
}

pub type DummyDriver = Driver<
    MemoryStore,
    MemoryNaming,
    DummyChain,
    InProcessOracle<Ed25519<UnlockedWallet>, MemoryStore, MemoryNaming, DummyChain>,
>;

/// A [`Driver`] of the `ORACLE` and the in-memory collaborators it shares with it.
pub struct DriverSetup {
    pub driver: DummyDriver,
    pub oracle: Setup,
}

/// Registers the `ORACLE` with the dummy chain and sets up a [`Driver`] for it.
pub async fn setup_driver() -> DriverSetup {
    let oracle = setup_oracle();
    register_oracle(
        &keypair_adapter(&ORACLE_SECRET),
        &oracle.chain,
        &PROGRAM_ID,
        &discard_logger(),
    )
    .await
    .expect("Should register the oracle");

    let reconstructor = Reconstructor::new(
        Arc::new(oracle.store.clone()),
        Arc::new(oracle.naming.clone()),
        Arc::new(oracle.chain.clone()),
        *PROGRAM_ID,
        DEFAULT_MAX_DEPTH,
        discard_logger(),
    );
    let driver = Driver::new(
        InProcessOracle(oracle.oracle.clone()),
        oracle.oracle.whoami(),
        reconstructor,
        discard_logger(),
    );

    DriverSetup { driver, oracle }
}
