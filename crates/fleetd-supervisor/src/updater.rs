//! Update orchestration: start protocol, status reconciliation, and
//! incremental update-log reads.

use crate::bus::EventBus;
use crate::config::{SupervisorConfig, SUPERVISOR_PROGRAM};
use crate::control::SupervisorControl;
use crate::event::EventType;
use crate::watcher::LastEventCache;
use fleetd_common::{Error, Result};
use std::io::SeekFrom;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tracing::warn;

/// Self-update operations over the supervisor.
///
/// The orchestration is mutex-guarded from precondition check to start
/// command, so concurrent callers serialize and the second one observes the
/// "already running" precondition instead of racing the rotation handshake.
pub struct UpdateService {
    config: SupervisorConfig,
    bus: Arc<EventBus>,
    cache: Arc<LastEventCache>,
    ctl: Arc<dyn SupervisorControl>,
    start_lock: tokio::sync::Mutex<()>,
}

impl UpdateService {
    pub fn new(
        config: SupervisorConfig,
        bus: Arc<EventBus>,
        cache: Arc<LastEventCache>,
        ctl: Arc<dyn SupervisorControl>,
    ) -> Self {
        Self {
            config,
            bus,
            cache,
            ctl,
            start_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Start the update program and return the baseline byte offset for
    /// subsequent [`update_log`](Self::update_log) polling.
    ///
    /// The update log must be read from a freshly rotated file, and rotation
    /// is asynchronous with respect to the reopen signal. The sequence is:
    /// subscribe for the supervisor's log-reopen confirmation, delete the old
    /// log, signal the supervisor, wait for the confirmation event, stat the
    /// new file, then start the program. Skipping the wait would reintroduce
    /// the race between rotation and the first read.
    pub async fn start_update(&self) -> Result<u32> {
        // held for the whole protocol, including the handshake wait
        let _guard = self.start_lock.lock().await;

        if self.update_running().await {
            return Err(Error::UpdateAlreadyRunning);
        }

        // registered before the signal so the confirmation cannot be missed
        let reopened = self.bus.subscribe(SUPERVISOR_PROGRAM, &[EventType::LogReopen]);

        // remove the previous run's log; a missing file is the normal case
        if let Err(e) = tokio::fs::remove_file(&self.config.update_log_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(error = %e, "failed to remove old update log");
            }
        }

        let pid = self.ctl.pid().await?;
        if let Err(e) = self.ctl.signal_log_reopen(pid).await {
            // the supervisor is expected to self-heal; keep going
            warn!(error = %e, pid, "failed to signal log reopen");
        }

        reopened
            .await
            .map_err(|_| Error::internal("event bus closed while waiting for log reopen"))?;

        let offset = match tokio::fs::metadata(&self.config.update_log_path).await {
            Ok(meta) => {
                if meta.len() != 0 {
                    warn!(len = meta.len(), "update log is not empty after reopen");
                }
                clamp_offset(meta.len())
            }
            Err(e) => {
                warn!(error = %e, "failed to stat update log");
                0
            }
        };

        self.ctl
            .start_program(&self.config.update_program)
            .await?;
        Ok(offset)
    }

    /// Whether the update program is still running.
    ///
    /// Two sources are merged. The polled status is authoritative when
    /// definitive, but can race with very recent transitions; the cached
    /// last event fills that gap. Neither source alone is sufficient.
    pub async fn update_running(&self) -> bool {
        let program = self.config.update_program.as_str();

        match self.ctl.status(program).await {
            Ok(out) => {
                if let Some(word) = status_word(&out) {
                    match word {
                        // terminal; the supervisor will not restart it
                        "FATAL" | "STOPPED" => return false,
                        "STARTING" | "RUNNING" | "BACKOFF" | "STOPPING" => return true,
                        // the program may already have been auto-restarted
                        // by the time the status command returned
                        "EXITED" => {}
                        other => {
                            warn!(program, status = %other, "unknown program status")
                        }
                    }
                }
            }
            // a control-plane hiccup is not "not running"
            Err(e) => warn!(program, error = %e, "status query failed"),
        }

        match self.cache.last(program) {
            EventType::Stopping | EventType::Starting | EventType::Running => true,
            // unexpected exits are auto-restarted by the supervisor
            EventType::ExitedUnexpected => true,
            EventType::ExitedExpected | EventType::Fatal => false,
            last => {
                warn!(program, last_event = %last, "unhandled program state, assuming not running");
                false
            }
        }
    }

    /// Read new complete lines of the update log starting at `offset`, and
    /// return them with the offset to resume from.
    ///
    /// A missing log file is the caller's error (the update was never
    /// started). A trailing line without a newline is still being written;
    /// it is neither returned nor counted into the new offset, so the next
    /// poll picks it up whole.
    pub async fn update_log(&self, offset: u32) -> Result<(Vec<String>, u32)> {
        let file = File::open(&self.config.update_log_path).await?;
        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(u64::from(offset))).await?;

        let mut lines = Vec::new();
        let mut new_offset = offset;
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let read = reader.read_until(b'\n', &mut buf).await?;
            if read == 0 || buf.last() != Some(&b'\n') {
                break;
            }
            new_offset = new_offset.saturating_add(clamp_offset(read as u64));
            match std::str::from_utf8(&buf[..read - 1]) {
                Ok(line) => lines.push(line.to_string()),
                Err(e) => {
                    warn!(error = %e, "non-UTF-8 line in update log");
                    lines.push(String::from_utf8_lossy(&buf[..read - 1]).into_owned());
                }
            }
        }
        Ok((lines, new_offset))
    }
}

/// Second whitespace-separated field of a `status <program>` output line,
/// e.g. `fleet-update-perform RUNNING pid 12983, uptime 0:00:05`.
fn status_word(output: &str) -> Option<&str> {
    output.split_whitespace().nth(1)
}

/// Clamp a byte count to the u32 offset space of the polling API.
///
/// The update log stays far below 4 GiB in practice; a clamped offset keeps
/// the reader pinned at the end of the file instead of wrapping around to
/// stale bytes.
fn clamp_offset(len: u64) -> u32 {
    u32::try_from(len).unwrap_or_else(|_| {
        warn!(len, "update log offset exceeds u32 range, clamping");
        u32::MAX
    })
}
