//! Subprocess execution with captured output.

use fleetd_common::{Error, Result};
use std::ffi::OsStr;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Captured result of a finished subprocess.
#[derive(Debug)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

/// Run a command to completion and capture its output.
///
/// The child is spawned with `kill_on_drop` so that an in-flight invocation
/// is killed, not orphaned, if the caller's future is dropped. A spawn
/// failure is the only error; a non-zero exit status is reported through
/// [`CommandOutput::success`] because several supervisor subcommands exit
/// non-zero while still producing meaningful output.
pub async fn run_command(program: impl AsRef<OsStr>, args: &[&str]) -> Result<CommandOutput> {
    let program = program.as_ref();
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| Error::spawn_failed(program.to_string_lossy(), e.to_string()))?;

    debug!(
        command = %program.to_string_lossy(),
        status = %output.status,
        "command finished"
    );

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        success: output.status.success(),
    })
}
