//! Error types for fleetd supervisor integration.

use thiserror::Error;

/// Result type alias for fleetd operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for fleetd supervisor operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A subprocess could not be spawned.
    #[error("Failed to spawn {command}: {reason}")]
    SpawnFailed { command: String, reason: String },

    /// A subprocess ran but reported failure.
    #[error("Command failed: {command} - {reason}")]
    CommandFailed { command: String, reason: String },

    /// A signal could not be delivered to a process.
    #[error("Failed to signal pid {pid}: {reason}")]
    SignalFailed { pid: u32, reason: String },

    /// External output did not have the expected shape.
    #[error("Unexpected {what} output: {output}")]
    InvalidOutput { what: String, output: String },

    /// An update was requested while one is already in flight.
    #[error("Update is already running")]
    UpdateAlreadyRunning,

    /// Internal error (shouldn't happen in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),

    /// I/O error (wraps std::io::Error).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Creates a SpawnFailed error.
    pub fn spawn_failed(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SpawnFailed {
            command: command.into(),
            reason: reason.into(),
        }
    }

    /// Creates a CommandFailed error.
    pub fn command_failed(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CommandFailed {
            command: command.into(),
            reason: reason.into(),
        }
    }

    /// Creates a SignalFailed error.
    pub fn signal_failed(pid: u32, reason: impl Into<String>) -> Self {
        Self::SignalFailed {
            pid,
            reason: reason.into(),
        }
    }

    /// Creates an InvalidOutput error.
    pub fn invalid_output(what: impl Into<String>, output: impl Into<String>) -> Self {
        Self::InvalidOutput {
            what: what.into(),
            output: output.into(),
        }
    }

    /// Creates an Internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}
