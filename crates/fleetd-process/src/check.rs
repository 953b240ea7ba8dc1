//! Process existence checking.

use fleetd_common::{Error, Result};

/// Check if a process with the given PID exists and is running.
///
/// Performs a non-destructive `kill(pid, 0)` probe: no signal is delivered,
/// but the process table is consulted.
///
/// # Returns
///
/// * `Ok(true)` - Process exists and is running
/// * `Ok(false)` - Process does not exist
/// * `Err(_)` - Error occurred while checking
pub fn process_exists(pid: u32) -> Result<bool> {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    match kill(Pid::from_raw(pid as i32), None) {
        Ok(_) => Ok(true),
        Err(nix::errno::Errno::ESRCH) => Ok(false),
        // Process exists but we don't have permission to signal it
        Err(nix::errno::Errno::EPERM) => Ok(true),
        Err(e) => Err(Error::signal_failed(pid, e.to_string())),
    }
}
