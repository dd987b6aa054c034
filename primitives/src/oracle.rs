//! Request and response bodies of the Oracle REST API.
//!
//! Tokens are exchanged hex encoded: the client submits a [`SenderEnvelope`]
//! and receives the cosigned [`OracleToken`].
//!
//! [`SenderEnvelope`]: crate::SenderEnvelope
//! [`OracleToken`]: crate::OracleToken
use serde::{Deserialize, Serialize};

use crate::{history::HistoryEntry, Address, ChannelId, ContentPointer, Participant};

/// `POST /v1/channel/open`, `POST /v1/channel/join` & `POST /v1/channel/leave`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRequest {
    /// The hex encoded sender envelope.
    pub token: String,
}

/// `POST /v1/channel/update`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    pub token: String,
    pub amount: u64,
    pub receiver: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    /// The hex encoded oracle token.
    pub token: String,
    /// The pointer the token is stored at and published under the channel name.
    pub cid: ContentPointer,
}

/// `GET /v1/channel/:id/state`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateResponse {
    pub channel_id: ChannelId,
    pub cid: ContentPointer,
    pub state: Vec<Participant>,
}

/// `GET /v1/channel/:id/history`, newest token first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub channel_id: ChannelId,
    pub history: Vec<HistoryEntry>,
}

/// The body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}
