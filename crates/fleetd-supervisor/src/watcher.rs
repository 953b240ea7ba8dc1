//! Maintail watcher - perpetual follow of the supervisor's live log.

use crate::bus::EventBus;
use crate::config::SupervisorConfig;
use crate::event::{parse_event, Event, EventType};
use chrono::{DateTime, Utc};
use fleetd_common::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Delay before restarting the maintail command after it fails or exits.
const RESTART_BACKOFF: Duration = Duration::from_secs(1);

/// Last lifecycle event type observed per watched program.
///
/// Written only by the watcher; read by the update status reconciler. Each
/// instance is independent, so parallel tests get isolated state.
#[derive(Debug, Default)]
pub struct LastEventCache {
    watched: Vec<String>,
    events: Mutex<HashMap<String, EventType>>,
}

impl LastEventCache {
    /// Create a cache tracking the given program names. Events for other
    /// programs are ignored.
    pub fn new(watched: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            watched: watched.into_iter().map(Into::into).collect(),
            events: Mutex::new(HashMap::new()),
        }
    }

    /// Record `event` as the latest observation for its program, if the
    /// program is watched.
    pub fn record(&self, event: &Event) {
        if self.watched.iter().any(|p| p == &event.program) {
            self.events
                .lock()
                .insert(event.program.clone(), event.event_type);
        }
    }

    /// The last observed event type for `program`, or
    /// [`EventType::Unknown`] if nothing has been observed yet.
    pub fn last(&self, program: &str) -> EventType {
        self.events
            .lock()
            .get(program)
            .copied()
            .unwrap_or(EventType::Unknown)
    }
}

/// Follows the supervisor's live log (`supervisorctl maintail -f`), turning
/// its lines into typed events that are recorded in the [`LastEventCache`]
/// and published on the [`EventBus`].
pub struct MaintailWatcher {
    config: SupervisorConfig,
    bus: Arc<EventBus>,
    cache: Arc<LastEventCache>,
}

impl MaintailWatcher {
    pub fn new(config: SupervisorConfig, bus: Arc<EventBus>, cache: Arc<LastEventCache>) -> Self {
        Self { config, bus, cache }
    }

    /// Run until `cancel` fires, restarting the maintail command with a
    /// fixed backoff whenever it fails or exits. Errors are never fatal to
    /// the loop; the event stream favors liveness over surfacing hiccups.
    pub async fn run(&self, cancel: CancellationToken) {
        // survives command restarts so that replayed history is dropped
        let mut last_seen: Option<DateTime<Utc>> = None;

        while !cancel.is_cancelled() {
            if let Err(e) = self.follow_once(&cancel, &mut last_seen).await {
                error!(error = %e, "maintail command failed");
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(RESTART_BACKOFF) => {}
            }
        }
        debug!("maintail watcher stopped");
    }

    /// One maintail invocation: spawn, stream lines until EOF, a read error,
    /// or cancellation.
    async fn follow_once(
        &self,
        cancel: &CancellationToken,
        last_seen: &mut Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut child = Command::new(&self.config.supervisorctl_path)
            .args(["maintail", "-f"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::spawn_failed(
                    self.config.supervisorctl_path.to_string_lossy(),
                    e.to_string(),
                )
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::internal("maintail stdout was not captured"))?;
        let mut lines = BufReader::new(stdout).lines();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    if let Err(e) = child.kill().await {
                        warn!(error = %e, "failed to kill maintail command");
                    }
                    return Ok(());
                }
                line = lines.next_line() => match line {
                    Ok(Some(line)) => self.handle_line(&line, last_seen),
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "error reading maintail output");
                        break;
                    }
                }
            }
        }

        match child.wait().await {
            Ok(status) => debug!(%status, "maintail command exited"),
            Err(e) => warn!(error = %e, "failed to wait for maintail command"),
        }
        Ok(())
    }

    /// Process one maintail line: parse it, drop stale replays, record the
    /// last-event state, publish on the bus.
    ///
    /// An event whose time is not strictly after the last published event's
    /// time is history re-emitted by a restarted maintail command; without
    /// this guard it would be dispatched twice.
    fn handle_line(&self, line: &str, last_seen: &mut Option<DateTime<Utc>>) {
        let Some(event) = parse_event(line) else {
            return;
        };
        if let Some(last) = *last_seen {
            if event.time <= last {
                return;
            }
        }
        *last_seen = Some(event.time);

        self.cache.record(&event);
        self.bus.publish(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot::error::TryRecvError;

    fn watcher() -> MaintailWatcher {
        let config = SupervisorConfig::default();
        let bus = Arc::new(EventBus::new());
        let cache = Arc::new(LastEventCache::new([config.update_program.clone()]));
        MaintailWatcher::new(config, bus, cache)
    }

    #[tokio::test]
    async fn test_events_flow_to_cache_and_bus() {
        let w = watcher();
        let rx = w
            .bus
            .subscribe("fleet-update-perform", &[EventType::ExitedUnexpected]);

        let mut last_seen = None;
        w.handle_line("not an event line", &mut last_seen);
        w.handle_line(
            "2019-08-08 17:09:48,494 INFO exited: fleet-update-perform (exit status 1; not expected)",
            &mut last_seen,
        );

        let event = rx.await.unwrap();
        assert_eq!(event.event_type, EventType::ExitedUnexpected);
        assert_eq!(w.cache.last("fleet-update-perform"), EventType::ExitedUnexpected);
    }

    #[tokio::test]
    async fn test_stale_and_duplicate_events_are_dropped() {
        let w = watcher();
        let mut last_seen = None;

        w.handle_line(
            "2019-08-08 17:09:48,494 INFO exited: fleet-update-perform (exit status 1; not expected)",
            &mut last_seen,
        );
        assert_eq!(w.cache.last("fleet-update-perform"), EventType::ExitedUnexpected);

        // a restarted maintail replays history: older and same-time events
        // must not be redelivered
        let mut rx = w
            .bus
            .subscribe("fleet-update-perform", &[EventType::Starting, EventType::ExitedUnexpected]);
        w.handle_line(
            "2019-08-08 17:09:41,806 INFO spawned: 'fleet-update-perform' with pid 12983",
            &mut last_seen,
        );
        w.handle_line(
            "2019-08-08 17:09:48,494 INFO exited: fleet-update-perform (exit status 1; not expected)",
            &mut last_seen,
        );
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(w.cache.last("fleet-update-perform"), EventType::ExitedUnexpected);

        // a strictly newer event goes through
        w.handle_line(
            "2019-08-08 17:10:28,975 INFO exited: fleet-update-perform (exit status 0; expected)",
            &mut last_seen,
        );
        assert_eq!(w.cache.last("fleet-update-perform"), EventType::ExitedExpected);
    }

    #[tokio::test]
    async fn test_published_times_are_monotonic() {
        let w = watcher();
        let mut last_seen = None;

        // shuffled input; only the in-order suffix survives
        let lines = [
            "2019-08-08 17:09:48,494 INFO exited: fleet-update-perform (exit status 1; not expected)",
            "2019-08-08 17:09:41,806 INFO spawned: 'fleet-update-perform' with pid 12983",
            "2019-08-08 17:10:27,686 INFO spawned: 'fleet-update-perform' with pid 13888",
            "2019-08-08 17:10:27,686 INFO spawned: 'fleet-update-perform' with pid 13888",
            "2019-08-08 17:10:28,975 INFO exited: fleet-update-perform (exit status 0; expected)",
        ];

        let mut published = Vec::new();
        for line in lines {
            let mut rx = w.bus.subscribe(
                "fleet-update-perform",
                &[
                    EventType::Starting,
                    EventType::ExitedExpected,
                    EventType::ExitedUnexpected,
                ],
            );
            w.handle_line(line, &mut last_seen);
            if let Ok(event) = rx.try_recv() {
                published.push(event.time);
            }
        }

        assert_eq!(published.len(), 3);
        assert!(published.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_cache_ignores_unwatched_programs() {
        let cache = LastEventCache::new(["fleet-update-perform"]);
        let event = parse_event("2019-08-08 17:10:08,258 INFO stopped: nginx (exit status 0)").unwrap();
        cache.record(&event);
        assert_eq!(cache.last("nginx"), EventType::Unknown);
        assert_eq!(cache.last("fleet-update-perform"), EventType::Unknown);
    }
}
