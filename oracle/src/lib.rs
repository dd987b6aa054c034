#![deny(clippy::all)]
#![deny(rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]
//! The Oracle of the payment channels.
//!
//! It validates the channel actions signed by the stakeholders against the
//! reconstructed channel state, cosigns them and publishes the cosigned
//! tokens as the new head of the channel history.

pub use self::{
    application::Application,
    error::Error,
    oracle::{Accepted, Oracle},
    register::register_oracle,
};

pub mod application;
mod error;
pub mod oracle;
mod register;
pub mod response;
pub mod routes;

#[cfg(any(test, feature = "test-util"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
pub mod test_util;
