//! End-to-end test of the maintail watcher against a scripted supervisor
//! CLI that replays a captured log and then blocks like `maintail -f`.

use fleetd_supervisor::{EventBus, EventType, LastEventCache, MaintailWatcher, SupervisorConfig};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const MAINTAIL_LOG: &str = "\
2019-08-08 17:09:41,806 INFO spawned: 'fleet-update-perform' with pid 12983
2019-08-08 17:09:43,509 INFO success: fleet-update-perform entered RUNNING state, process has stayed up for > than 1 seconds (startsecs)
2019-08-08 17:09:48,494 INFO exited: fleet-update-perform (exit status 1; not expected)
2019-08-08 17:09:57,284 INFO received SIGUSR2 indicating log reopen request
2019-08-08 17:09:57,284 INFO supervisord logreopen
2019-08-08 17:10:28,975 INFO exited: fleet-update-perform (exit status 0; expected)
";

fn fake_supervisorctl(dir: &Path) -> PathBuf {
    let path = dir.join("supervisorctl");
    let script = format!(
        "#!/bin/sh\n[ \"$1\" = maintail ] || exit 2\ncat <<'EOF'\n{MAINTAIL_LOG}EOF\nexec sleep 60\n"
    );
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[tokio::test]
async fn test_watcher_streams_events_from_live_log() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = SupervisorConfig {
        supervisorctl_path: fake_supervisorctl(dir.path()),
        ..SupervisorConfig::default()
    };

    let bus = Arc::new(EventBus::new());
    let cache = Arc::new(LastEventCache::new(["fleet-update-perform"]));
    let reopen = bus.subscribe("supervisord", &[EventType::LogReopen]);
    let exited = bus.subscribe("fleet-update-perform", &[EventType::ExitedExpected]);

    let watcher = MaintailWatcher::new(config, Arc::clone(&bus), Arc::clone(&cache));
    let cancel = CancellationToken::new();
    let task = {
        let cancel = cancel.clone();
        tokio::spawn(async move { watcher.run(cancel).await })
    };

    let event = tokio::time::timeout(Duration::from_secs(5), reopen)
        .await
        .expect("log reopen event not published")
        .unwrap();
    assert_eq!(event.program, "supervisord");
    assert_eq!(event.event_type, EventType::LogReopen);

    let event = tokio::time::timeout(Duration::from_secs(5), exited)
        .await
        .expect("exit event not published")
        .unwrap();
    assert_eq!(event.event_type, EventType::ExitedExpected);
    assert_eq!(
        cache.last("fleet-update-perform"),
        EventType::ExitedExpected
    );

    // cancellation kills the in-flight maintail command and stops the loop
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("watcher did not stop after cancellation")
        .unwrap();
}
