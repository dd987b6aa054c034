//! Deterministic addresses and fixtures for testing.
//!
//! The addresses are the public keys of the keypairs in `adapter::test_util`,
//! the oracle keypair is also stored in `docs/keys/oracle.json`.
use once_cell::sync::Lazy;

use crate::{
    token::{CoreActionData, FixedAction, UpdateAction},
    Address, ChannelId, Participant,
};

/// The address of the channel program used in tests.
pub static PROGRAM_ID: Lazy<Address> = Lazy::new(|| {
    "BLVxek8YMXUQhcKmMvrFTrzh5FXg8ec88Crp6otEzWVm"
        .parse()
        .expect("Valid program address")
});

pub static ORACLE: Lazy<Address> = Lazy::new(|| {
    "6yC8o9xEdAycdZztrqFzGbJbJA576dLZ19EqMP84n2Jx"
        .parse()
        .expect("Valid oracle address")
});

pub static ALICE: Lazy<Address> = Lazy::new(|| {
    "9qGgZahX1zBGoAy5zCrMf5ib9DoymokfcmnfjrYCc1BU"
        .parse()
        .expect("Valid alice address")
});

pub static BOB: Lazy<Address> = Lazy::new(|| {
    "FwMZjZHPAD8SP1oMEVDhJT6sgxBLadjBfFiQTdNviioh"
        .parse()
        .expect("Valid bob address")
});

pub static CAROL: Lazy<Address> = Lazy::new(|| {
    "FwGZhUamKqvwXAou7nKToBA6jV5C88Lun8ov1F8afWh1"
        .parse()
        .expect("Valid carol address")
});

pub static CHANNEL_ID: Lazy<ChannelId> =
    Lazy::new(|| "test-channel".parse().expect("Valid channel id"));

pub fn open_action(channel_id: &ChannelId, opener: Address, balance: u64) -> CoreActionData {
    CoreActionData::Open(FixedAction {
        channel_id: channel_id.clone(),
        address: opener,
        balance,
        sender: opener,
    })
}

pub fn join_action(channel_id: &ChannelId, joiner: Address, balance: u64) -> CoreActionData {
    CoreActionData::Join(FixedAction {
        channel_id: channel_id.clone(),
        address: joiner,
        balance,
        sender: joiner,
    })
}

pub fn leave_action(channel_id: &ChannelId, leaver: Address, balance: u64) -> CoreActionData {
    CoreActionData::Leave(FixedAction {
        channel_id: channel_id.clone(),
        address: leaver,
        balance,
        sender: leaver,
    })
}

pub fn update_action(
    channel_id: &ChannelId,
    sender: Address,
    participants: &[(Address, u64)],
) -> CoreActionData {
    CoreActionData::Update(UpdateAction {
        channel_id: channel_id.clone(),
        participants: participants
            .iter()
            .map(|&(address, balance)| Participant { address, balance })
            .collect(),
        sender,
    })
}
