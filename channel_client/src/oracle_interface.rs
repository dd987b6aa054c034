//! The Oracle as seen by a stakeholder.
use std::time::Duration;

use async_trait::async_trait;
use primitives::{
    oracle::{ErrorResponse, HistoryResponse, StateResponse, TokenRequest, TokenResponse, UpdateRequest},
    token, Address, ChannelId, SenderEnvelope,
};
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use slog::{debug, Logger};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Request to the Oracle: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Oracle request timed out")]
    Timeout,
    #[error("Oracle responded with {status}: {message}")]
    Rejected { status: StatusCode, message: String },
    #[error("Encoding the envelope: {0}")]
    Envelope(#[from] token::Error),
}

impl Error {
    /// Rejections are final, the Oracle was unreachable or unavailable otherwise.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Request(err) => err.is_connect() || err.is_timeout(),
            Error::Timeout => true,
            Error::Rejected { status, .. } => status.is_server_error(),
            Error::Envelope(_) => false,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[async_trait]
pub trait OracleInterface: Send + Sync {
    async fn open(&self, envelope: &SenderEnvelope) -> Result<TokenResponse, Error>;

    async fn join(&self, envelope: &SenderEnvelope) -> Result<TokenResponse, Error>;

    async fn update(
        &self,
        envelope: &SenderEnvelope,
        amount: u64,
        receiver: Address,
    ) -> Result<TokenResponse, Error>;

    async fn leave(&self, envelope: &SenderEnvelope) -> Result<TokenResponse, Error>;

    async fn state(&self, channel_id: &ChannelId) -> Result<StateResponse, Error>;

    async fn history(&self, channel_id: &ChannelId) -> Result<HistoryResponse, Error>;
}

/// The REST API of the Oracle.
#[derive(Debug, Clone)]
pub struct OracleApi {
    /// e.g. `http://127.0.0.1:8005/v1/channel`
    channel_url: String,
    client: Client,
    logger: Logger,
}

impl OracleApi {
    pub fn new(oracle_url: &str, timeout: Duration, logger: Logger) -> Result<Self, Error> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            channel_url: format!("{}/v1/channel", oracle_url.trim_end_matches('/')),
            client,
            logger,
        })
    }

    async fn post<B: Serialize + Sync>(&self, route: &str, body: &B) -> Result<TokenResponse, Error> {
        let url = format!("{}/{route}", self.channel_url);
        debug!(&self.logger, "Submitting to the Oracle"; "url" => &url);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(request_error)?;

        json_response(response).await
    }

    async fn get<T: DeserializeOwned>(&self, channel_id: &ChannelId, route: &str) -> Result<T, Error> {
        let url = format!("{}/{channel_id}/{route}", self.channel_url);

        let response = self.client.get(&url).send().await.map_err(request_error)?;

        json_response(response).await
    }
}

#[async_trait]
impl OracleInterface for OracleApi {
    async fn open(&self, envelope: &SenderEnvelope) -> Result<TokenResponse, Error> {
        self.post("open", &token_request(envelope)?).await
    }

    async fn join(&self, envelope: &SenderEnvelope) -> Result<TokenResponse, Error> {
        self.post("join", &token_request(envelope)?).await
    }

    async fn update(
        &self,
        envelope: &SenderEnvelope,
        amount: u64,
        receiver: Address,
    ) -> Result<TokenResponse, Error> {
        let request = UpdateRequest {
            token: envelope.to_hex()?,
            amount,
            receiver,
        };

        self.post("update", &request).await
    }

    async fn leave(&self, envelope: &SenderEnvelope) -> Result<TokenResponse, Error> {
        self.post("leave", &token_request(envelope)?).await
    }

    async fn state(&self, channel_id: &ChannelId) -> Result<StateResponse, Error> {
        self.get(channel_id, "state").await
    }

    async fn history(&self, channel_id: &ChannelId) -> Result<HistoryResponse, Error> {
        self.get(channel_id, "history").await
    }
}

fn token_request(envelope: &SenderEnvelope) -> Result<TokenRequest, Error> {
    Ok(TokenRequest {
        token: envelope.to_hex()?,
    })
}

async fn json_response<T: DeserializeOwned>(response: Response) -> Result<T, Error> {
    let status = response.status();
    if status.is_success() {
        return response.json().await.map_err(request_error);
    }

    let message = match response.json::<ErrorResponse>().await {
        Ok(ErrorResponse { message }) => message,
        Err(_) => status.to_string(),
    };

    Err(Error::Rejected { status, message })
}

fn request_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Timeout
    } else {
        Error::Request(err)
    }
}
