//! Supervisor control-command interface.

use async_trait::async_trait;
use fleetd_common::{Error, Result};
use fleetd_process::{run_command, CommandOutput, Signal};
use std::path::PathBuf;
use tracing::debug;

/// Control commands of the external process supervisor.
///
/// Behind a trait so the update orchestrator can be exercised against a fake
/// supervisor in tests.
#[async_trait]
pub trait SupervisorControl: Send + Sync {
    /// Raw `status <program>` output.
    ///
    /// A non-zero exit that still produced output is not an error: the
    /// supervisor's CLI exits non-zero for stopped programs.
    async fn status(&self, program: &str) -> Result<String>;

    /// Issue `start <program>`.
    async fn start_program(&self, program: &str) -> Result<()>;

    /// The supervisor's own OS process id, from `pid`.
    async fn pid(&self) -> Result<u32>;

    /// Ask the supervisor to reopen its log files (SIGUSR2).
    async fn signal_log_reopen(&self, pid: u32) -> Result<()>;
}

/// [`SupervisorControl`] implementation over the `supervisorctl` CLI.
pub struct Supervisorctl {
    path: PathBuf,
}

impl Supervisorctl {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn run(&self, args: &[&str]) -> Result<CommandOutput> {
        run_command(&self.path, args).await
    }
}

#[async_trait]
impl SupervisorControl for Supervisorctl {
    async fn status(&self, program: &str) -> Result<String> {
        let out = self.run(&["status", program]).await?;
        if !out.success && out.stdout.trim().is_empty() {
            return Err(Error::command_failed(
                format!("status {program}"),
                out.stderr.trim().to_string(),
            ));
        }
        Ok(out.stdout)
    }

    async fn start_program(&self, program: &str) -> Result<()> {
        let out = self.run(&["start", program]).await?;
        // the CLI reports some failures on stdout with a zero exit status
        if !out.success || out.stdout.contains("ERROR") {
            return Err(Error::command_failed(
                format!("start {program}"),
                format!("{}{}", out.stdout.trim(), out.stderr.trim()),
            ));
        }
        debug!(program, "program started");
        Ok(())
    }

    async fn pid(&self) -> Result<u32> {
        let out = self.run(&["pid"]).await?;
        let text = out.stdout.trim();
        text.parse()
            .map_err(|_| Error::invalid_output("supervisor pid", text))
    }

    async fn signal_log_reopen(&self, pid: u32) -> Result<()> {
        if !fleetd_process::process_exists(pid)? {
            return Err(Error::signal_failed(pid, "no such process"));
        }
        fleetd_process::send_signal(pid, Signal::SIGUSR2)
    }
}
