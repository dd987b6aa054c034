//! Deterministic keypairs whose public keys are the addresses in
//! [`primitives::test_util`].
//!
//! Every secret key is the SHA-256 of `channel-{name}`.
use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};

use crate::{
    ed25519::{Ed25519, UnlockedWallet},
    prelude::*,
    Adapter, UnlockedState,
};

pub type KeypairAdapter = Adapter<Ed25519<UnlockedWallet>, UnlockedState<Ed25519<UnlockedWallet>>>;

pub static ORACLE_SECRET: Lazy<[u8; 32]> = Lazy::new(|| secret_key("oracle"));
pub static ALICE_SECRET: Lazy<[u8; 32]> = Lazy::new(|| secret_key("alice"));
pub static BOB_SECRET: Lazy<[u8; 32]> = Lazy::new(|| secret_key("bob"));
pub static CAROL_SECRET: Lazy<[u8; 32]> = Lazy::new(|| secret_key("carol"));

fn secret_key(name: &str) -> [u8; 32] {
    Sha256::digest(format!("channel-{name}").as_bytes()).into()
}

/// An Unlocked [`Adapter`] for the given secret key.
pub fn keypair_adapter(secret: &[u8; 32]) -> KeypairAdapter {
    let client = Ed25519::from_secret(*secret)
        .and_then(|client| client.unlock())
        .expect("Secret keys always unlock");

    Adapter::with_unlocked(client)
}
