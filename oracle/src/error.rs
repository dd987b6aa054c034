use primitives::{
    chain, history, state, storage, token, ActionKind, Address, ChannelId, ContentPointer,
    PrevState,
};
use thiserror::Error;

/// The reasons for the Oracle to reject an action.
///
/// Nothing is stored or published when an action is rejected.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Malformed token: {0}")]
    MalformedToken(String),
    #[error("Signature of {0} is invalid")]
    SignatureInvalid(Address),
    #[error("Channel {0} already exists")]
    ChannelAlreadyExists(ChannelId),
    #[error("Channel {0} not found")]
    ChannelNotFound(ChannelId),
    #[error("Channel {0} is not open")]
    ChannelNotOpen(ChannelId),
    #[error("Participant {0} is not part of the channel")]
    ParticipantNotFound(Address),
    #[error("Insufficient balance of {sender}: has {balance} but transfers {amount}")]
    InsufficientBalance {
        sender: Address,
        balance: u64,
        amount: u64,
    },
    #[error("Submitted balances do not match the expected ones: {0}")]
    BalanceMismatch(String),
    #[error("Opener {opener} of channel {channel_id} has no stakeholder account")]
    IncompleteChannel {
        channel_id: ChannelId,
        opener: Address,
    },
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
    /// Content of the channel history is missing or unreadable.
    #[error("Stored content is missing or corrupt: {0}")]
    StorageCorrupt(String),
    #[error("Request to the chain failed: {0}")]
    Chain(#[source] chain::Error),
    #[error("Transaction failed: {0}")]
    SubmissionFailed(String),
    #[error("Expected prev_state {expected}, got {actual}")]
    InvalidPrevState {
        expected: PrevState,
        actual: PrevState,
    },
    #[error("Sender {sender} cannot act on behalf of {address}")]
    SenderMismatch { sender: Address, address: Address },
    #[error("Balance should be greater than 0")]
    InvalidBalance,
    #[error("Expected action {expected}, got {actual}")]
    InvalidAction {
        expected: ActionKind,
        actual: ActionKind,
    },
    #[error("Invalid transfer: {0}")]
    InvalidTransfer(String),
    #[error("History of the channel is longer than {0} tokens")]
    ChainTooDeep(usize),
    #[error("Request timed out")]
    Timeout,
    #[error("Signing: {0}")]
    Signing(#[from] adapter::Error),
}

impl Error {
    /// Only failures of the storage, the chain or a timeout can succeed if retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::StorageUnavailable(_) | Error::SubmissionFailed(_) | Error::Timeout => true,
            Error::Chain(err) => err.is_retryable(),
            _ => false,
        }
    }
}

impl From<token::Error> for Error {
    fn from(error: token::Error) -> Self {
        Self::MalformedToken(error.to_string())
    }
}

impl From<storage::Error> for Error {
    fn from(error: storage::Error) -> Self {
        match error {
            storage::Error::Timeout => Self::Timeout,
            storage::Error::Unavailable(reason) => Self::StorageUnavailable(reason),
            error @ (storage::Error::NotFound(_) | storage::Error::InvalidResponse(_)) => {
                Self::StorageCorrupt(error.to_string())
            }
        }
    }
}

impl From<chain::Error> for Error {
    fn from(error: chain::Error) -> Self {
        match error {
            chain::Error::Timeout => Self::Timeout,
            chain::Error::SubmissionFailed { signature, reason } => {
                Self::SubmissionFailed(format!("{signature}: {reason}"))
            }
            chain::Error::ConfirmationTimeout(signature) => {
                Self::SubmissionFailed(format!("{signature}: confirmation timed out"))
            }
            error => Self::Chain(error),
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
            error @ (state::Error::ZeroAmount
            | state::Error::SelfTransfer(_)
            | state::Error::BalanceOverflow(_)) => Self::InvalidTransfer(error.to_string()),
        }
    }
}

impl From<history::Error> for Error {
    fn from(error: history::Error) -> Self {
        match error {
            history::Error::ChannelNotFound(channel_id) => Self::ChannelNotFound(channel_id),
            history::Error::IncompleteChannel { channel_id, opener } => {
                Self::IncompleteChannel { channel_id, opener }
            }
            history::Error::ChainTooDeep(depth) => Self::ChainTooDeep(depth),
            history::Error::Storage(error) => error.into(),
            history::Error::Chain(error) => error.into(),
            error @ (history::Error::MalformedToken { .. }
            | history::Error::ForeignToken { .. }
            | history::Error::MissingOpen(_)
            | history::Error::Cycle(_)
            | history::Error::Replay(_)) => Self::MalformedToken(error.to_string()),
        }
    }
}

/// The stored history does not link to the pointer published for the channel.
pub(crate) fn stale_prev_state(current: &ContentPointer, actual: &PrevState) -> Error {
    Error::InvalidPrevState {
        expected: PrevState::Pointer(current.clone()),
        actual: actual.clone(),
    }
}
