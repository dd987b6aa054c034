use primitives::{
    chain, history, state, storage, token, ActionKind, Address, ChannelId, OracleToken,
};
use thiserror::Error;

use crate::oracle_interface;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Oracle: {0}")]
    Oracle(#[from] oracle_interface::Error),
    #[error("Malformed token: {0}")]
    MalformedToken(#[from] token::Error),
    #[error("The Oracle token is not signed by {oracle} over the submitted action")]
    SignatureInvalid { oracle: Address },
    #[error("Channel {0} not found")]
    ChannelNotFound(ChannelId),
    #[error("Participant {0} is not part of the channel")]
    ParticipantNotFound(Address),
    #[error("Insufficient balance of {sender}: {balance} is less than {amount}")]
    InsufficientBalance {
        sender: Address,
        balance: u64,
        amount: u64,
    },
    #[error("Cannot move an empty balance")]
    InvalidBalance,
    #[error("Invalid transfer: {0}")]
    InvalidTransfer(String),
    #[error("{0} tokens are not anchored on-chain")]
    NotAnchored(ActionKind),
    #[error("Reconstructing the channel: {0}")]
    History(#[source] history::Error),
    #[error("Storage: {0}")]
    Storage(#[from] storage::Error),
    #[error("Chain: {0}")]
    Chain(#[from] chain::Error),
    /// The Oracle cosigned the action but anchoring it failed.
    ///
    /// The token is valid and can be anchored again with `Driver::anchor`.
    #[error("Anchoring the cosigned token failed: {source}")]
    SubmissionFailed {
        token: Box<OracleToken>,
        #[source]
        source: chain::Error,
    },
    #[error("Signing: {0}")]
    Signing(#[from] adapter::Error),
}

impl Error {
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Oracle(err) => err.is_retryable(),
            Error::History(err) => err.is_retryable(),
            Error::Storage(err) => err.is_retryable(),
            Error::Chain(err) => err.is_retryable(),
            Error::SubmissionFailed { .. } => true,
            _ => false,
        }
    }

    /// The cosigned token of a failed anchoring.
    pub fn orphaned_token(&self) -> Option<&OracleToken> {
        match self {
            Error::SubmissionFailed { token, .. } => Some(token.as_ref()),
            _ => None,
        }
    }
}

impl From<state::Error> for Error {
    fn from(error: state::Error) -> Self {
        match error {
            state::Error::ParticipantNotFound(address) => Self::ParticipantNotFound(address),
            state::Error::InsufficientBalance {
                sender,
                balance,
                amount,
            } => Self::InsufficientBalance {
                sender,
                balance,
                amount,
            },
            error => Self::InvalidTransfer(error.to_string()),
        }
    }
}

impl From<history::Error> for Error {
    fn from(error: history::Error) -> Self {
        match error {
            history::Error::ChannelNotFound(channel_id) => Self::ChannelNotFound(channel_id),
            error => Self::History(error),
        }
    }
}
