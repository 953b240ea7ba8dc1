//! Typed lifecycle events parsed from the supervisor's log stream.

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Lifecycle event kinds emitted by the supervisor for its programs.
///
/// See <http://supervisord.org/subprocess.html#process-states>.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Stopping,
    Stopped,
    Starting,
    Running,
    ExitedExpected,
    ExitedUnexpected,
    Fatal,
    LogReopen,
    /// Initial sentinel for programs with no observed event yet.
    /// Never produced by the parser.
    Unknown,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::Stopping => write!(f, "STOPPING"),
            EventType::Stopped => write!(f, "STOPPED"),
            EventType::Starting => write!(f, "STARTING"),
            EventType::Running => write!(f, "RUNNING"),
            EventType::ExitedExpected => write!(f, "EXITED (expected)"),
            EventType::ExitedUnexpected => write!(f, "EXITED (unexpected)"),
            EventType::Fatal => write!(f, "FATAL"),
            EventType::LogReopen => write!(f, "LOG REOPEN"),
            EventType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// A supervisor program event observed in the log stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub time: DateTime<Utc>,
    pub event_type: EventType,
    pub program: String,
}

/// Message patterns of the supervisor log, each anchored on the free-text
/// part of a line, with the program name as the first capture group.
static PATTERNS: LazyLock<Vec<(Regex, EventType)>> = LazyLock::new(|| {
    vec![
        (
            Regex::new(r"^waiting for ([\w-]+) to stop$").unwrap(),
            EventType::Stopping,
        ),
        (
            Regex::new(r"^stopped: ([\w-]+) \(exit status \d+\)$").unwrap(),
            EventType::Stopped,
        ),
        (
            Regex::new(r"^spawned: '([\w-]+)' with pid \d+$").unwrap(),
            EventType::Starting,
        ),
        (
            Regex::new(
                r"^success: ([\w-]+) entered RUNNING state, process has stayed up for > than \d+ seconds \(startsecs\)$",
            )
            .unwrap(),
            EventType::Running,
        ),
        (
            Regex::new(r"^exited: ([\w-]+) \(exit status \d+; expected\)$").unwrap(),
            EventType::ExitedExpected,
        ),
        (
            Regex::new(r"^exited: ([\w-]+) \(exit status \d+; not expected\)$").unwrap(),
            EventType::ExitedUnexpected,
        ),
        (
            Regex::new(r"^gave up: ([\w-]+) entered FATAL state, too many start retries too quickly$")
                .unwrap(),
            EventType::Fatal,
        ),
        (
            Regex::new(r"^([\w-]+) logreopen$").unwrap(),
            EventType::LogReopen,
        ),
    ]
});

/// Log line timestamp format: `2019-08-08 17:09:48,494`.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

/// Parse one supervisor log line into an [`Event`], or `None`.
///
/// Lines are `YYYY-MM-DD HH:MM:SS,mmm LEVEL <message>`. The supervisor log
/// interleaves many lines that carry no lifecycle information; those, and
/// lines with a malformed timestamp, are silently skipped.
pub fn parse_event(line: &str) -> Option<Event> {
    let mut parts = line.splitn(4, ' ');
    let date = parts.next()?;
    let clock = parts.next()?;
    let _level = parts.next()?;
    let message = parts.next()?;

    let timestamp = format!("{date} {clock}");
    let time = NaiveDateTime::parse_from_str(&timestamp, TIMESTAMP_FORMAT)
        .ok()?
        .and_utc();

    for (re, event_type) in PATTERNS.iter() {
        if let Some(caps) = re.captures(message) {
            return Some(Event {
                time,
                event_type: *event_type,
                program: caps[1].to_string(),
            });
        }
    }
    None
}
