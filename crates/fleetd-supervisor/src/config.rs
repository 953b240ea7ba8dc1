//! Supervisor integration configuration.

use std::path::PathBuf;

/// Program name the supervisor uses for itself in its own log
/// (the `<name> logreopen` confirmation line).
pub const SUPERVISOR_PROGRAM: &str = "supervisord";

/// Configuration for the supervisor integration.
///
/// The defaults match the production image; tests override the paths.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Path to the supervisor's control CLI.
    pub supervisorctl_path: PathBuf,

    /// Name of the supervised program that performs the self-update.
    pub update_program: String,

    /// Path of the update program's log file, truncated by the supervisor
    /// when it reopens logs.
    pub update_log_path: PathBuf,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            supervisorctl_path: PathBuf::from("supervisorctl"),
            update_program: "fleet-update-perform".to_string(),
            update_log_path: PathBuf::from("/srv/logs/fleet-update-perform.log"),
        }
    }
}
