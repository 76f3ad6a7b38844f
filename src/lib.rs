#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # ordo
//!
//! Run asynchronous tasks one at a time, in the order they were submitted.
//!
//! The queue itself lives in [`ordo_queue`]; this crate adds TOML task plans
//! and a runner that reports every outcome, used by the `ordo` binary.

pub use ordo_core;
pub use ordo_queue;

pub mod cli;
pub mod plan;
pub mod runner;
