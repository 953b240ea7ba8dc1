//! Periodic update-availability check.
//!
//! Runs the updater binary in check mode on an interval and caches the
//! parsed result for the API layer to serve without blocking on a cold
//! check.

use chrono::{DateTime, Utc};
use fleetd_common::{Error, Result};
use fleetd_process::run_command;
use parking_lot::Mutex;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Version details of an installed or available package, as reported by the
/// updater binary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PackageInfo {
    pub version: String,
    pub full_version: String,
    pub build_time: Option<DateTime<Utc>>,
    pub repo: String,
}

/// JSON result of `<updater> -check`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UpdateCheckResult {
    pub installed: PackageInfo,
    pub latest: PackageInfo,
    pub update_available: bool,
    #[serde(default)]
    pub latest_news_url: String,
}

#[derive(Debug, Clone)]
pub struct UpdateCheckerConfig {
    /// Path to the updater binary.
    pub updater_path: PathBuf,

    /// Interval between automatic checks.
    pub check_interval: Duration,
}

impl Default for UpdateCheckerConfig {
    fn default() -> Self {
        Self {
            updater_path: PathBuf::from("fleet-update"),
            check_interval: Duration::from_secs(24 * 60 * 60),
        }
    }
}

#[derive(Debug, Clone)]
struct CheckState {
    result: UpdateCheckResult,
    checked_at: DateTime<Utc>,
}

/// Periodically runs the updater binary in check mode and caches the result.
pub struct UpdateChecker {
    config: UpdateCheckerConfig,
    last: Mutex<Option<CheckState>>,
}

impl UpdateChecker {
    pub fn new(config: UpdateCheckerConfig) -> Self {
        Self {
            config,
            last: Mutex::new(None),
        }
    }

    /// Check on the configured interval until cancelled. The first check
    /// runs immediately; failures are logged and retried at the next tick.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.check_interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("update checker stopped");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.force_check().await {
                        warn!(error = %e, "update check failed");
                    }
                }
            }
        }
    }

    /// Run a fresh check now, replacing the cached result.
    pub async fn force_check(&self) -> Result<UpdateCheckResult> {
        let out = run_command(&self.config.updater_path, &["-check"]).await?;
        if !out.success {
            return Err(Error::command_failed(
                format!("{} -check", self.config.updater_path.display()),
                out.stderr.trim().to_string(),
            ));
        }

        let result = parse_check_output(&out.stdout)?;
        if result.update_available {
            info!(
                installed = %result.installed.version,
                latest = %result.latest.version,
                "update available"
            );
        }

        *self.last.lock() = Some(CheckState {
            result: result.clone(),
            checked_at: Utc::now(),
        });
        Ok(result)
    }

    /// Version details of the installed package, if a check has completed.
    pub fn installed_package_info(&self) -> Option<PackageInfo> {
        self.last.lock().as_ref().map(|s| s.result.installed.clone())
    }

    /// The most recent check result and when it was obtained.
    pub fn check_result(&self) -> Option<(UpdateCheckResult, DateTime<Utc>)> {
        self.last
            .lock()
            .as_ref()
            .map(|s| (s.result.clone(), s.checked_at))
    }
}

fn parse_check_output(stdout: &str) -> Result<UpdateCheckResult> {
    serde_json::from_str(stdout).map_err(|e| Error::invalid_output("update check", e.to_string()))
}
