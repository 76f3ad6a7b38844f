//! # ordo-core
//!
//! Shared error and result types for the ordo workspace.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::expect_used)]

pub mod error;
pub mod result;

pub use error::Error;
pub use result::{Result, ResultExt};
