#![deny(rust_2018_idioms)]
#![deny(clippy::all)]
#![cfg_attr(docsrs, feature(doc_cfg))]
//! The domain of off-chain payment channels: channel action tokens, the
//! replayed channel state, the content store & naming service abstractions
//! and the on-chain accounts and instructions anchoring a channel.

pub use self::{
    address::Address,
    channel::{
        ChannelAccount, ChannelId, ChannelStatus, OracleAccount, StakeholderAccount,
        StakeholderStatus,
    },
    config::Config,
    history::{Reconstructor, Snapshot},
    ipfs::{ContentPointer, PrevState},
    signature::Signature,
    state::{ChannelState, Participant},
    token::{ActionKind, CoreActionData, OracleToken, SenderEnvelope, SignedAction},
};

pub mod address;
pub mod chain;
pub mod channel;
pub mod config;
pub mod history;
pub mod ipfs;
pub mod oracle;
pub mod signature;
pub mod state;
pub mod storage;
pub mod token;
pub mod util {
    pub mod logging;
}

#[cfg(feature = "test-util")]
#[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
pub mod test_util;
