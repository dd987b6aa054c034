#![deny(rust_2018_idioms)]
#![deny(clippy::all)]
#![cfg_attr(docsrs, feature(doc_cfg))]
//! Clients for the outside world of a payment channel:
//! the signing keypair, the content store & naming service and the chain.

use std::{marker::PhantomData, ops::Deref};

use primitives::{Address, Signature};

pub use self::{
    ed25519::Ed25519,
    error::Error,
    ipfs::Ipfs,
    solana::SolanaRpc,
};

pub mod prelude {
    pub use crate::client::{Locked, Unlockable, Unlocked};
}

use prelude::*;

mod client;
#[cfg(any(test, feature = "test-util"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
pub mod dummy;
pub mod ed25519;
mod error;
mod impls;
pub mod ipfs;
pub mod solana;

#[cfg(any(test, feature = "test-util"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
pub mod test_util;

/// A client in a Locked state.
#[derive(Debug, Clone)]
pub struct LockedState<C: Locked>(C);

/// A client in an Unlocked state.
#[derive(Debug, Clone)]
pub struct UnlockedState<C: Unlocked>(C);

/// The [`Adapter`] struct wraps a client and its state,
/// only an Unlocked client can sign.
#[derive(Debug)]
pub struct Adapter<C, S = LockedState<C>> {
    /// client in a specific state - Locked or Unlocked
    client: S,
    /// We must use the `C` type from the definition
    _phantom: PhantomData<C>,
}

impl<C, S: Clone> Clone for Adapter<C, S> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<C: Locked> Adapter<C> {
    /// Create a new [`Adapter`] in [`LockedState`].
    pub fn new(client: C) -> Self {
        Self {
            client: LockedState(client),
            _phantom: PhantomData,
        }
    }
}

impl<C: Unlocked> Adapter<C, UnlockedState<C>> {
    /// Create a new [`Adapter`] in [`UnlockedState`].
    pub fn with_unlocked(client: C) -> Self {
        Self {
            client: UnlockedState(client),
            _phantom: PhantomData,
        }
    }
}

impl<C: Locked + Unlockable> Adapter<C, LockedState<C>> {
    pub fn unlock(self) -> Result<Adapter<C::Unlocked, UnlockedState<C::Unlocked>>, Error> {
        let unlocked = self.client.0.unlock().map_err(Into::into)?;

        Ok(Adapter {
            client: UnlockedState(unlocked),
            _phantom: PhantomData,
        })
    }
}

impl<C, S> Adapter<C, S>
where
    C: Locked,
    S: Deref<Target = C>,
{
    pub fn whoami(&self) -> Address {
        self.client.whoami()
    }

    /// Verify that `signer` signed exactly the `payload` bytes.
    pub fn verify(
        &self,
        signer: Address,
        payload: &[u8],
        signature: &Signature,
    ) -> Result<bool, Error> {
        self.client
            .verify(signer, payload, signature)
            .map_err(Into::into)
    }
}

impl<C: Unlocked> Adapter<C, UnlockedState<C>> {
    pub fn sign(&self, payload: &[u8]) -> Result<Signature, Error> {
        self.client.sign(payload).map_err(Into::into)
    }
}
