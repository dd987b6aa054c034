//! The content-addressed store of tokens and the naming service holding
//! the mutable pointer to the latest token of each channel.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ChannelId, ContentPointer};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
    #[error("Storage request timed out")]
    Timeout,
    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
}

impl Error {
    /// Failures of the backend which might succeed if retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Unavailable(_) | Error::Timeout)
    }
}

/// A key of the naming service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameKey {
    pub name: String,
    pub id: String,
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn store(&self, bytes: Vec<u8>) -> Result<ContentPointer, Error>;

    /// Returns [`Error::NotFound`] for unknown pointers.
    async fn fetch(&self, pointer: &ContentPointer) -> Result<Vec<u8>, Error>;
}

/// Mutable pointers keyed by [`ChannelId`].
#[async_trait]
pub trait NamingService: Send + Sync {
    async fn create_key(&self, name: &ChannelId) -> Result<NameKey, Error>;

    async fn key_exists(&self, name: &ChannelId) -> Result<bool, Error>;

    async fn publish(&self, name: &ChannelId, pointer: &ContentPointer) -> Result<(), Error>;

    /// Returns [`Error::NotFound`] when there is no key or nothing has been published under it.
    async fn resolve(&self, name: &ChannelId) -> Result<ContentPointer, Error>;
}
