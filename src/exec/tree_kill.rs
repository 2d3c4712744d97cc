// src/exec/tree_kill.rs

//! Process-tree termination.
//!
//! Runners are spawned as leaders of their own process group (unix), so the
//! whole tree they start can be signalled at once with `killpg`.

use std::io;
use std::time::Duration;

use tokio::process::Child;
use tracing::{debug, warn};

/// Politely terminate the child's process tree, escalating after `grace`.
///
/// Returns once the signals have been delivered; the caller still awaits
/// the child's exit status.
#[cfg(unix)]
pub async fn terminate_tree(child: &mut Child, grace: Duration) -> io::Result<()> {
    use nix::sys::signal::Signal;

    // `None` means the child has already been reaped.
    let Some(pid) = child.id() else {
        return Ok(());
    };

    signal_group(pid, Signal::SIGTERM)?;
    debug!(pid, "sent SIGTERM to runner process group");

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(_) => Ok(()),
        Err(_) => {
            warn!(pid, grace_ms = grace.as_millis() as u64, "runner ignored SIGTERM; sending SIGKILL to its process group");
            signal_group(pid, Signal::SIGKILL)
        }
    }
}

#[cfg(not(unix))]
pub async fn terminate_tree(child: &mut Child, _grace: Duration) -> io::Result<()> {
    child.start_kill()
}

/// Send `signal` to the process group led by `pid`. A group that no longer
/// exists counts as success.
#[cfg(unix)]
pub fn signal_group(pid: u32, signal: nix::sys::signal::Signal) -> io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    #[allow(clippy::cast_possible_wrap)]
    let pgid = Pid::from_raw(pid as i32);
    match killpg(pgid, signal) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(io::Error::from(e)),
    }
}
