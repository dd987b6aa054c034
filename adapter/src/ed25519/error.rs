use primitives::address::Error as AddressError;
use thiserror::Error;

impl From<Error> for crate::Error {
    fn from(error: Error) -> Self {
        match error {
            err @ Error::Keystore(_) => crate::Error::keystore(err),
            err @ Error::WalletUnlock(_) => crate::Error::wallet_unlock(err),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Keystore: {0}")]
    Keystore(#[from] KeystoreError),
    #[error("Wallet unlocking: {0}")]
    WalletUnlock(String),
}

#[derive(Debug, Error)]
pub enum KeystoreError {
    /// reading the keystore file failed
    #[error("Reading keystore file: {0}")]
    ReadingFile(#[source] std::io::Error),
    /// Deserializing the keystore file failed
    #[error("Deserializing keystore file: {0}")]
    Deserialization(#[source] serde_json::Error),
    /// The keypair should be exactly 64 bytes long
    #[error("Keypair should be 64 bytes long, got {0}")]
    KeypairLength(usize),
    /// The public key half of the keypair is not a valid `Address`
    #[error("Public key is invalid: {0}")]
    AddressInvalid(#[source] AddressError),
}
