#![deny(rust_2018_idioms)]
#![deny(clippy::all)]
#![cfg_attr(docsrs, feature(doc_cfg))]
//! The client of a channel stakeholder: drives the channel actions through
//! the Oracle and anchors them with the channel program.

pub use self::{
    driver::{Driver, Outcome},
    error::Error,
    oracle_interface::{OracleApi, OracleInterface},
};

pub mod driver;
pub mod error;
pub mod oracle_interface;

#[cfg(any(test, feature = "test-util"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
pub mod test_util;
