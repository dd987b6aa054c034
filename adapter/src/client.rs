use async_trait::async_trait;
use primitives::{Address, Signature};

#[async_trait]
/// Available methods for Locked clients.
pub trait Locked: Sync + Send {
    type Error: std::error::Error + Into<crate::Error> + 'static;

    /// Get Adapter whoami
    fn whoami(&self) -> Address;

    /// Verify that `signature` is the signature of `signer` over the exact `payload` bytes.
    ///
    /// Returns `Ok(false)` for a signature by any other key or over any other payload.
    fn verify(
        &self,
        signer: Address,
        payload: &[u8],
        signature: &Signature,
    ) -> Result<bool, Self::Error>;
}

/// Available methods for Unlocked clients.
/// Unlocked clients should also implement [`Locked`].
#[async_trait]
pub trait Unlocked: Locked {
    // requires Unlocked
    fn sign(&self, payload: &[u8]) -> Result<Signature, Self::Error>;
}

/// A client that can be `unlock()`ed
/// and implements both [`Locked`] & [`Unlocked`].
///
/// **Note:** A possibly expensive operation as it might result in cloning
pub trait Unlockable {
    type Unlocked: Unlocked;

    fn unlock(&self) -> Result<Self::Unlocked, <Self::Unlocked as Locked>::Error>;
}
