//! # fleetd-supervisor
//!
//! Integration with the external process supervisor that manages fleetd's
//! own long-running daemons. This crate watches the supervisor's live log
//! stream, turns raw log lines into typed lifecycle events, fans events out
//! to interested callers through one-shot subscriptions, and drives the
//! multi-step self-update workflow on top of that event stream.
//!
//! ## Components
//!
//! - [`event::parse_event`] - pure log-line-to-event parser
//! - [`EventBus`] - registry of pending one-shot subscriptions
//! - [`MaintailWatcher`] - perpetual `supervisorctl maintail -f` follow loop
//! - [`SupervisorControl`] / [`Supervisorctl`] - supervisor control commands
//! - [`UpdateService`] - update orchestration, status reconciliation,
//!   incremental update-log reads
//! - [`UpdateChecker`] - periodic update-availability check
//!
//! The watcher is the only long-lived background task and the sole writer of
//! the shared last-event state; everything else is a plain async call made
//! from the (external) API layer.

pub mod bus;
pub mod checker;
pub mod config;
pub mod control;
pub mod event;
pub mod updater;
pub mod watcher;

pub use bus::EventBus;
pub use checker::{PackageInfo, UpdateCheckResult, UpdateChecker, UpdateCheckerConfig};
pub use config::SupervisorConfig;
pub use control::{SupervisorControl, Supervisorctl};
pub use event::{parse_event, Event, EventType};
pub use updater::UpdateService;
pub use watcher::{LastEventCache, MaintailWatcher};
