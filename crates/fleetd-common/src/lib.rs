//! # fleetd-common
//!
//! Common error types shared across the fleetd crates.

pub mod errors;

pub use errors::{Error, Result};
