//! Parent-attached fork and session setup of the forked child
//!
//! This module uses `unsafe` for the raw `clone(2)` call, which duplicates
//! the process the way `fork(2)` does but hands the child to our parent.

#![allow(unsafe_code)]

use nix::errno::Errno;
use nix::unistd::{Pid, setsid};
use std::os::fd::RawFd;
use tracing::debug;

use crate::error::{EnterError, Result};

/// Which side of [`clone_parent`] we are on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForkResult {
    /// The caller; `child` is the new process
    Parent {
        /// Pid of the new process
        child: Pid,
    },
    /// The new process
    Child,
}

/// Duplicate the calling process with `CLONE_PARENT | SIGCHLD`
///
/// The child continues from this call exactly as after `fork(2)`, on a copy
/// of the caller's stack. Its parent is the caller's parent, so the caller
/// never waits for it and never forwards it signals.
///
/// # Safety
/// The process must be single-threaded. No locks may be held across the
/// call, since the child gets a snapshot of them.
pub unsafe fn clone_parent() -> nix::Result<ForkResult> {
    let flags = (libc::CLONE_PARENT | libc::SIGCHLD) as libc::c_ulong;

    // A null stack gives fork semantics. The remaining arguments (tid
    // pointers, tls) are unused without the matching flags.
    // SAFETY: no new stack and no CLONE_VM, so the child owns a private
    // copy of the address space.
    let null: libc::c_ulong = 0;
    #[cfg(target_arch = "s390x")]
    let ret = unsafe { libc::syscall(libc::SYS_clone, null, flags, null, null, null) };
    #[cfg(not(target_arch = "s390x"))]
    let ret = unsafe { libc::syscall(libc::SYS_clone, flags, null, null, null, null) };

    match Errno::result(ret)? {
        0 => Ok(ForkResult::Child),
        #[allow(clippy::cast_possible_truncation)]
        child => Ok(ForkResult::Parent {
            child: Pid::from_raw(child as libc::pid_t),
        }),
    }
}

/// Finish the forked child's session
///
/// Starts a new session so no stale controlling terminal crosses the
/// namespace boundary. With a console, it becomes the controlling terminal
/// and stdin, stdout and stderr.
///
/// # Errors
/// Returns error on the first failing syscall.
pub fn finalize_session(console: Option<RawFd>) -> Result<()> {
    setsid().map_err(|errno| EnterError::Setsid { errno })?;

    let Some(console) = console else {
        return Ok(());
    };

    debug!(fd = console, "installing console as controlling terminal");
    set_controlling_terminal(console)?;
    redirect_stdio(console)
}

fn set_controlling_terminal(fd: RawFd) -> Result<()> {
    // SAFETY: TIOCSCTTY takes an integer argument; an invalid fd is
    // reported through errno.
    Errno::result(unsafe { libc::ioctl(fd, libc::TIOCSCTTY, 0) })
        .map(drop)
        .map_err(|errno| EnterError::ControllingTerminal { errno })
}

fn redirect_stdio(fd: RawFd) -> Result<()> {
    for target in [libc::STDIN_FILENO, libc::STDOUT_FILENO, libc::STDERR_FILENO] {
        // SAFETY: dup2 only manipulates the descriptor table.
        let ret = Errno::result(unsafe { libc::dup2(fd, target) })
            .map_err(|errno| EnterError::Redirect { fd: target, errno })?;
        if ret != target {
            return Err(EnterError::Redirect {
                fd: target,
                errno: Errno::EBADF,
            });
        }
    }
    Ok(())
}
