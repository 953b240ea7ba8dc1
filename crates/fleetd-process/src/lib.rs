//! # fleetd-process
//!
//! Low-level OS process primitives for fleetd:
//! - Subprocess execution with captured output
//! - Process existence verification
//! - Signal delivery
//!
//! The supervisor protocol (SIGUSR2 log-rotation handshake) is Unix-only,
//! so this crate targets Unix.

pub mod check;
pub mod command;
pub mod signal;

pub use check::process_exists;
pub use command::{run_command, CommandOutput};
pub use signal::{send_signal, Signal};
