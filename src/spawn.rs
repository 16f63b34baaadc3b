//! Per-stage launch: fork, rewire stdin/stdout onto the pipeline's
//! channels, exec the command.
//!
//! The host may be running other threads, so everything a child needs is
//! prepared before `fork`: argv as C strings and the failure diagnostics
//! already rendered. Between `fork` and `execvp` the child sticks to
//! `dup2`, `close`, `write` and `_exit`; its failure paths allocate
//! nothing.

use std::ffi::CString;
use std::os::fd::AsRawFd;

use nix::errno::Errno;
use nix::sys::signal::{signal, SigHandler, Signal};
use nix::unistd::{self, ForkResult};

use crate::channel::ChannelSet;
use crate::error::JshError;
use crate::job::StageHandle;
use crate::types::CommandStage;

/// Exit status a child reports when its own setup or exec fails.
pub const CHILD_SETUP_FAILURE: i32 = 127;

const STDIN_REDIRECT_FAILED: &[u8] = b"jsh error: unable to redirect stdin";
const STDOUT_REDIRECT_FAILED: &[u8] = b"jsh error: unable to redirect stdout";

/// The fork-safe form of one stage.
struct StagePlan {
    program: CString,
    argv: Vec<CString>,
    exec_failed_msg: Vec<u8>,
}

impl StagePlan {
    fn new(stage: &CommandStage) -> Result<StagePlan, JshError> {
        let argv = stage
            .words()
            .iter()
            .map(|word| CString::new(word.as_str()))
            .collect::<Result<Vec<_>, _>>()?;
        let program = argv[0].clone();
        let exec_failed_msg =
            format!("jsh error: Command not found: {}\n", stage.program()).into_bytes();
        Ok(StagePlan { program, argv, exec_failed_msg })
    }
}

/// Forks stage `index` and, in the parent, returns its handle.
///
/// The child never returns: it either becomes the stage's command or
/// `_exit`s with `CHILD_SETUP_FAILURE` after writing a diagnostic.
pub fn launch_stage(
    index: usize,
    stage: &CommandStage,
    channels: &ChannelSet,
) -> Result<StageHandle, JshError> {
    let plan = StagePlan::new(stage)?;

    match unsafe { unistd::fork() }.map_err(JshError::Fork)? {
        ForkResult::Parent { child } => {
            tracing::debug!(stage = index, pid = %child, program = stage.program(), "launched");
            Ok(StageHandle { index, pid: child })
        }
        ForkResult::Child => exec_stage(index, &plan, channels),
    }
}

/// Child side, running in a fresh copy of the address space.
fn exec_stage(index: usize, plan: &StagePlan, channels: &ChannelSet) -> ! {
    // The host ignores SIGPIPE and that disposition would survive exec;
    // pipeline stages rely on dying when their reader goes away.
    unsafe {
        let _ = signal(Signal::SIGPIPE, SigHandler::SigDfl);
    }

    if let Some(read) = channels.read_end(index) {
        if let Err(errno) = unistd::dup2(read.as_raw_fd(), libc::STDIN_FILENO) {
            child_fail_errno(STDIN_REDIRECT_FAILED, errno);
        }
    }
    if let Some(write) = channels.write_end(index) {
        if let Err(errno) = unistd::dup2(write.as_raw_fd(), libc::STDOUT_FILENO) {
            child_fail_errno(STDOUT_REDIRECT_FAILED, errno);
        }
    }
    // The dup2'ed copies on fds 0 and 1 survive this.
    channels.close_all_raw();

    let _ = unistd::execvp(&plan.program, &plan.argv);
    child_fail(&plan.exec_failed_msg);
}

fn child_fail(msg: &[u8]) -> ! {
    write_stderr_raw(msg);
    unsafe { libc::_exit(CHILD_SETUP_FAILURE) }
}

fn child_fail_errno(msg: &[u8], errno: Errno) -> ! {
    write_stderr_raw(msg);
    write_stderr_raw(b": ");
    write_stderr_raw(errno.desc().as_bytes());
    write_stderr_raw(b"\n");
    unsafe { libc::_exit(CHILD_SETUP_FAILURE) }
}

/// Raw `write(2)` to stderr. Nothing useful can be done about a failed
/// write at this point, so the result is dropped.
fn write_stderr_raw(bytes: &[u8]) {
    unsafe {
        libc::write(libc::STDERR_FILENO, bytes.as_ptr().cast(), bytes.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CommandStage;

    fn stage(words: &[&str]) -> CommandStage {
        CommandStage::new(words.iter().map(|w| w.to_string()).collect()).unwrap()
    }

    #[test]
    fn plan_is_rendered_before_the_fork() {
        let plan = StagePlan::new(&stage(&["grep", "-q", "pattern"])).unwrap();
        assert_eq!(plan.program.to_str().unwrap(), "grep");
        assert_eq!(plan.argv.len(), 3);
        assert_eq!(plan.argv[2].to_str().unwrap(), "pattern");
        assert_eq!(
            plan.exec_failed_msg,
            b"jsh error: Command not found: grep\n".to_vec()
        );
    }

    #[test]
    fn interior_nul_is_rejected() {
        let result = StagePlan::new(&stage(&["e\0cho"]));
        assert!(matches!(result, Err(JshError::Nul(_))));
    }

    #[test]
    fn exec_drops_channels_of_other_pipelines() {
        use std::io::Read;
        use std::time::{Duration, Instant};

        let unrelated = ChannelSet::for_stages(2).unwrap();
        let mut reader = std::fs::File::from(unrelated.read_end(1).unwrap().try_clone().unwrap());

        // Forked while `unrelated` is open in the host; once exec'd, the
        // child must hold none of its descriptors.
        let own = ChannelSet::for_stages(1).unwrap();
        let handle = launch_stage(0, &stage(&["sleep", "2"]), &own).unwrap();
        drop(own);

        drop(unrelated);
        let start = Instant::now();
        let mut buf = [0u8; 1];
        let n = reader.read(&mut buf).unwrap();
        let waited = start.elapsed();
        assert_eq!(n, 0);
        assert!(
            waited < Duration::from_secs(1),
            "end-of-stream held up {waited:?} by a child of a different pipeline"
        );

        crate::job::reap_all(&[handle]).unwrap();
    }
}
