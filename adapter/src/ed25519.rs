//! The Ed25519 client for the [`crate::Adapter`], using keypair files
//! in the Solana CLI format: a JSON array of the 32 bytes secret key followed
//! by the 32 bytes public key.
use solana_sdk::signer::keypair::Keypair;

pub use self::{
    client::{Ed25519, Options},
    error::{Error, KeystoreError},
};

mod client;
mod error;

/// The keypair is only parsed to a [`Keypair`] when unlocking.
#[derive(Debug, Clone)]
pub enum LockedWallet {
    KeyStore { keypair: Vec<u8> },
    SecretKey([u8; 32]),
}

#[derive(Debug)]
pub struct UnlockedWallet {
    pub(crate) wallet: Keypair,
}

impl Clone for UnlockedWallet {
    fn clone(&self) -> Self {
        Self {
            wallet: self.wallet.insecure_clone(),
        }
    }
}

pub trait WalletState: Send + Sync {}
impl WalletState for LockedWallet {}
impl WalletState for UnlockedWallet {}
