//! Inter-stage pipe allocation.
//!
//! A pipeline of N stages needs N-1 pipes. `ChannelSet` owns all of them
//! as `OwnedFd` pairs, so every descriptor is closed when the set drops,
//! on success and on every failure path alike.

use std::os::fd::{AsRawFd, OwnedFd};

use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::unistd;

/// One pipe: bytes written to `write` come out of `read`.
#[derive(Debug)]
struct Channel {
    read: OwnedFd,
    write: OwnedFd,
}

/// The pipes connecting adjacent stages: channel `i` joins stage `i`'s
/// stdout to stage `i + 1`'s stdin.
#[derive(Debug)]
pub struct ChannelSet {
    channels: Vec<Channel>,
}

impl ChannelSet {
    /// Allocates the `stages - 1` pipes a pipeline of `stages` commands
    /// needs. If any allocation fails, the pipes already created are
    /// closed before the error is returned.
    ///
    /// Every descriptor is close-on-exec: a stage wires its own two ends
    /// onto stdin/stdout with `dup2` (which clears the flag on the
    /// copies), so anything a child merely inherited vanishes at exec
    /// and concurrent pipelines cannot leak descriptors into each
    /// other's children.
    pub fn for_stages(stages: usize) -> Result<ChannelSet, Errno> {
        let wanted = stages.saturating_sub(1);
        let mut channels = Vec::with_capacity(wanted);
        for _ in 0..wanted {
            let (read, write) = unistd::pipe2(OFlag::O_CLOEXEC)?;
            channels.push(Channel { read, write });
        }
        Ok(ChannelSet { channels })
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// The read end feeding stage `index`'s stdin, when that stage has an
    /// upstream neighbor.
    pub fn read_end(&self, index: usize) -> Option<&OwnedFd> {
        let upstream = index.checked_sub(1)?;
        self.channels.get(upstream).map(|c| &c.read)
    }

    /// The write end carrying stage `index`'s stdout, when that stage has
    /// a downstream neighbor.
    pub fn write_end(&self, index: usize) -> Option<&OwnedFd> {
        self.channels.get(index).map(|c| &c.write)
    }

    /// Closes every descriptor with raw `close(2)` calls. For the child
    /// between `fork` and `exec`, which must not run `Drop` glue; the
    /// `OwnedFd`s stay untouched in this copy of the address space, and
    /// the caller must not return into code that uses them.
    pub fn close_all_raw(&self) {
        for channel in &self.channels {
            unsafe {
                libc::close(channel.read.as_raw_fd());
                libc::close(channel.write.as_raw_fd());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::{Read, Write};

    #[test]
    fn one_stage_needs_no_channels() {
        let set = ChannelSet::for_stages(1).unwrap();
        assert_eq!(set.channel_count(), 0);
        assert!(set.read_end(0).is_none());
        assert!(set.write_end(0).is_none());
    }

    #[test]
    fn ends_follow_the_stage_index() {
        let set = ChannelSet::for_stages(3).unwrap();
        assert_eq!(set.channel_count(), 2);
        assert!(set.read_end(0).is_none());
        assert!(set.write_end(0).is_some());
        assert!(set.read_end(1).is_some());
        assert!(set.write_end(1).is_some());
        assert!(set.read_end(2).is_some());
        assert!(set.write_end(2).is_none());
    }

    #[test]
    fn write_end_feeds_the_next_stage_read_end() {
        let set = ChannelSet::for_stages(2).unwrap();
        let mut writer = File::from(set.write_end(0).unwrap().try_clone().unwrap());
        writer.write_all(b"ping").unwrap();
        drop(writer);

        let mut reader = File::from(set.read_end(1).unwrap().try_clone().unwrap());
        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");
    }

    #[test]
    fn both_ends_are_close_on_exec() {
        let set = ChannelSet::for_stages(2).unwrap();
        for fd in [
            set.read_end(1).unwrap().as_raw_fd(),
            set.write_end(0).unwrap().as_raw_fd(),
        ] {
            let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
            assert_ne!(flags, -1);
            assert_ne!(flags & libc::FD_CLOEXEC, 0, "fd {fd} would survive exec");
        }
    }

    #[cfg(target_os = "linux")]
    fn open_fd_count() -> usize {
        std::fs::read_dir("/proc/self/fd").unwrap().count()
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn repeated_allocation_releases_every_descriptor() {
        let before = open_fd_count();
        for _ in 0..2 {
            let set = ChannelSet::for_stages(5).unwrap();
            assert_eq!(set.channel_count(), 4);
            drop(set);
        }
        // Sibling tests open descriptors of their own; sample briefly
        // instead of demanding a quiescent process.
        for _ in 0..100 {
            if open_fd_count() == before {
                return;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert_eq!(open_fd_count(), before);
    }
}
