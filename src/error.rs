use std::ffi::NulError;

use nix::errno::Errno;
use thiserror::Error;

use crate::parser::ParseError;

/// Errors that abort a pipeline request on the host side.
///
/// A stage's own failure to redirect or exec is not represented here: the
/// child reports it on stderr and it comes back as that stage's
/// termination status.
#[derive(Debug, Error)]
pub enum JshError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("unable to create pipe: {0}")]
    ChannelAlloc(Errno),

    #[error("unable to fork: {0}")]
    Fork(Errno),

    #[error("unable to wait for child: {0}")]
    Wait(Errno),

    #[error("argument holds an interior NUL byte: {0}")]
    Nul(#[from] NulError),
}
