//! Process bootstrap: join the target's namespaces and fork into them
//!
//! [`nsenter`] must be the first thing `main` does. It has to run while the
//! process has exactly one thread, so no async runtime, thread pool or
//! signal-handling thread may exist yet.

#![allow(unsafe_code)]

use nix::errno::Errno;
use tracing::debug;

use crate::backend::ProcfsBackend;
use crate::config::EnterConfig;
use crate::error::{EnterError, Result};
use crate::fork::{ForkResult, clone_parent, finalize_session};
use crate::join::{JoinReport, join_namespaces};

/// Where the process stands after the bootstrap returned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// No target was requested; nothing happened
    Inactive,
    /// This is the forked child, running inside the target's namespaces
    Joined(JoinReport),
}

impl Phase {
    /// Whether the namespaces of a target were entered
    #[must_use]
    pub const fn is_joined(&self) -> bool {
        matches!(self, Self::Joined(_))
    }
}

/// Enter the requested namespaces, or do nothing if none were requested
///
/// Returns [`Phase::Inactive`] when the trigger variable is unset. Otherwise
/// the namespaces are joined and the process forks: the original process
/// exits with the child's pid as its status and only the child returns,
/// with [`Phase::Joined`]. Every failure prints a single `nsenter:` line to
/// stderr and exits with status 1.
#[must_use]
pub fn nsenter() -> Phase {
    match enter() {
        Ok(phase) => phase,
        Err(err) => err.abort(),
    }
}

/// Fallible core of [`nsenter`]
///
/// On success this only returns in the child; the parent exits here.
///
/// # Errors
/// Returns the first failure of configuration, join, fork or session setup.
pub fn enter() -> Result<Phase> {
    let Some(config) = EnterConfig::from_env()? else {
        return Ok(Phase::Inactive);
    };

    ensure_single_threaded()?;

    debug!(pid = %config.target, kinds = ?config.kinds, "entering namespaces");
    let report = join_namespaces(&mut ProcfsBackend::new(), &config)?;

    // SAFETY: the process was verified to be single-threaded above and the
    // bootstrap holds no locks.
    match unsafe { clone_parent() }.map_err(|errno| EnterError::Fork { errno })? {
        ForkResult::Child => {
            finalize_session(config.console)?;
            Ok(Phase::Joined(report))
        }
        ForkResult::Parent { child } => {
            debug!(child = %child, "forked into target namespaces, exiting");
            std::process::exit(child.as_raw())
        }
    }
}

/// Fail unless the calling process has exactly one thread
///
/// # Errors
/// Returns error if `/proc/self/task` is unreadable or lists more than one
/// thread.
pub fn ensure_single_threaded() -> Result<()> {
    let threads = std::fs::read_dir("/proc/self/task")
        .map_err(|e| EnterError::ThreadCount {
            errno: Errno::from_raw(e.raw_os_error().unwrap_or(libc::EIO)),
        })?
        .count();

    if threads != 1 {
        return Err(EnterError::MultiThreaded { threads });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::join::Outcome;
    use crate::kind::NamespaceKind;
    use tinyjail_core::ProcessId;

    #[test]
    fn test_phase_inactive() {
        assert!(!Phase::Inactive.is_joined());
    }

    #[test]
    fn test_multi_threaded_rejected() {
        // The test harness keeps the main thread alive next to this one.
        let handle = std::thread::spawn(ensure_single_threaded);
        let err = handle.join().unwrap().unwrap_err();
        assert!(matches!(err, EnterError::MultiThreaded { threads } if threads >= 2));
    }

    #[test]
    fn test_join_against_self_is_all_shared() {
        let pid = ProcessId::current();
        let config = EnterConfig::new(pid);

        let report = join_namespaces(&mut ProcfsBackend::new(), &config).unwrap();

        for kind in [
            NamespaceKind::Ipc,
            NamespaceKind::Uts,
            NamespaceKind::Pid,
            NamespaceKind::Mnt,
        ] {
            assert_eq!(report.outcome(kind), Some(Outcome::Shared));
        }
        assert!(Phase::Joined(report).is_joined());
    }
}
