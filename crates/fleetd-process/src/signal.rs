//! Signal delivery primitives.

use fleetd_common::{Error, Result};

pub use nix::sys::signal::Signal;

/// Deliver `signal` to the process with the given PID.
pub fn send_signal(pid: u32, signal: Signal) -> Result<()> {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid as i32), signal).map_err(|e| Error::signal_failed(pid, e.to_string()))
}
