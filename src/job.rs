//! Child bookkeeping: one handle per launched stage, and the reap loop
//! that collects every termination status.

use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::Pid;

/// A launched stage: its position in the pipeline and the pid to wait on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageHandle {
    pub index: usize,
    pub pid: Pid,
}

/// How a stage ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    /// Normal termination with the given exit code.
    Exited(i32),
    /// Terminated by a signal.
    Signaled(Signal),
}

impl StageStatus {
    /// The status as a shell-style exit code: the code itself for a
    /// normal exit, 128 plus the signal number for a signal death.
    pub fn code(self) -> i32 {
        match self {
            StageStatus::Exited(code) => code,
            StageStatus::Signaled(sig) => 128 + sig as i32,
        }
    }

    pub fn success(self) -> bool {
        matches!(self, StageStatus::Exited(0))
    }
}

/// Blocks until `handle`'s child terminates, retrying interrupted waits.
///
/// Waits on the specific pid, never on -1, so children owned by other
/// threads of the host are left alone.
fn reap(handle: StageHandle) -> Result<StageStatus, Errno> {
    loop {
        match waitpid(handle.pid, None) {
            Ok(WaitStatus::Exited(_, code)) => return Ok(StageStatus::Exited(code)),
            Ok(WaitStatus::Signaled(_, sig, _)) => return Ok(StageStatus::Signaled(sig)),
            Ok(_) => continue,
            Err(Errno::EINTR) => continue,
            Err(err) => return Err(err),
        }
    }
}

/// Reaps every handle in order, returning the statuses in the same order.
///
/// Every handle is waited on even if an earlier wait fails, so one error
/// cannot leave the remaining children as zombies; the first error is the
/// one reported.
pub fn reap_all(handles: &[StageHandle]) -> Result<Vec<StageStatus>, Errno> {
    let mut statuses = Vec::with_capacity(handles.len());
    let mut first_err = None;
    for handle in handles {
        match reap(*handle) {
            Ok(status) => {
                tracing::debug!(stage = handle.index, pid = %handle.pid, ?status, "reaped");
                statuses.push(status);
            }
            Err(err) => {
                tracing::debug!(stage = handle.index, pid = %handle.pid, %err, "wait failed");
                first_err.get_or_insert(err);
            }
        }
    }
    match first_err {
        None => Ok(statuses),
        Some(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_pass_through() {
        assert_eq!(StageStatus::Exited(0).code(), 0);
        assert_eq!(StageStatus::Exited(41).code(), 41);
        assert!(StageStatus::Exited(0).success());
        assert!(!StageStatus::Exited(1).success());
    }

    #[test]
    fn signal_deaths_use_the_128_convention() {
        assert_eq!(StageStatus::Signaled(Signal::SIGKILL).code(), 137);
        assert_eq!(StageStatus::Signaled(Signal::SIGTERM).code(), 143);
        assert!(!StageStatus::Signaled(Signal::SIGTERM).success());
    }
}
