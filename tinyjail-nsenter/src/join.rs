//! The namespace join loop

use nix::errno::Errno;
use tinyjail_core::ProcessId;
use tracing::debug;

use crate::backend::NamespaceBackend;
use crate::config::EnterConfig;
use crate::error::{EnterError, Result};
use crate::kind::NamespaceKind;

/// Namespace directory of the calling process
pub const SELF_NS_DIR: &str = "/proc/self/ns";

/// What happened to one namespace kind during the join
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// `setns` moved us into the target's namespace
    Joined,
    /// The target has no entry for this kind
    Absent,
    /// We already share the target's namespace
    Shared,
}

/// Per-kind outcomes of a completed join, in join order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinReport {
    target: ProcessId,
    outcomes: Vec<(NamespaceKind, Outcome)>,
}

impl JoinReport {
    fn new(target: ProcessId) -> Self {
        Self {
            target,
            outcomes: Vec::new(),
        }
    }

    fn record(&mut self, kind: NamespaceKind, outcome: Outcome) {
        self.outcomes.push((kind, outcome));
    }

    /// Process whose namespaces were joined
    #[must_use]
    pub const fn target(&self) -> ProcessId {
        self.target
    }

    /// All outcomes, in join order
    #[must_use]
    pub fn outcomes(&self) -> &[(NamespaceKind, Outcome)] {
        &self.outcomes
    }

    /// Outcome for a single kind, if it was processed
    #[must_use]
    pub fn outcome(&self, kind: NamespaceKind) -> Option<Outcome> {
        self.outcomes
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, outcome)| *outcome)
    }

    /// Kinds that were actually switched
    pub fn joined(&self) -> impl Iterator<Item = NamespaceKind> + '_ {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| *outcome == Outcome::Joined)
            .map(|(kind, _)| *kind)
    }
}

/// Join every configured namespace of the target, in order
///
/// Entries the target lacks are skipped, as are namespaces we already share
/// (same inode). Everything else is opened, joined and closed before moving
/// to the next kind. The first failure is returned as-is; kinds joined
/// before it stay joined.
///
/// # Errors
/// Returns error if either namespace directory cannot be opened, or an
/// entry cannot be opened or joined.
pub fn join_namespaces<B: NamespaceBackend>(
    backend: &mut B,
    config: &EnterConfig,
) -> Result<JoinReport> {
    let target_dir = config.target_ns_dir();

    let target = backend
        .open_dir(&target_dir)
        .map_err(|errno| EnterError::OpenTarget {
            path: target_dir.clone(),
            errno,
        })?;
    let own = backend
        .open_dir(SELF_NS_DIR)
        .map_err(|errno| EnterError::OpenSelf { errno })?;

    let mut report = JoinReport::new(config.target);

    for &kind in &config.kinds {
        let name = kind.proc_name();

        // Entries of a dead target still stat but cannot be opened; only a
        // missing entry means the kind does not exist.
        let identity = match backend.stat_entry(&target, name) {
            Ok(identity) => Some(identity),
            Err(Errno::ENOENT) => {
                debug!(namespace = %kind, "target has no such namespace, skipping");
                report.record(kind, Outcome::Absent);
                continue;
            }
            Err(errno) => {
                debug!(namespace = %kind, error = %errno, "stat of target namespace failed");
                None
            }
        };

        let own_identity = backend.stat_entry(&own, name).ok();
        if identity.is_some() && identity == own_identity {
            debug!(namespace = %kind, "already a member, skipping");
            report.record(kind, Outcome::Shared);
            continue;
        }

        let fd = backend
            .open_entry(&target, name)
            .map_err(|errno| EnterError::OpenNamespace {
                path: target_dir.clone(),
                kind,
                errno,
            })?;

        backend
            .setns(&fd)
            .map_err(|errno| EnterError::Join { kind, errno })?;
        drop(fd);

        debug!(namespace = %kind, pid = %config.target, "joined namespace");
        report.record(kind, Outcome::Joined);
    }

    drop(own);
    drop(target);

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockBackend, MockCall};
    use crate::kind::JOIN_ORDER;

    const TARGET: &str = "/proc/42/ns";

    fn config() -> EnterConfig {
        EnterConfig::new(ProcessId::from_raw(42))
    }

    /// Target and self with every kind present and distinct
    fn distinct() -> MockBackend {
        let mut backend = MockBackend::new();
        for (i, kind) in JOIN_ORDER.iter().enumerate() {
            let inode = i as u64;
            backend = backend
                .with_entry(TARGET, kind.proc_name(), 100 + inode)
                .with_entry(SELF_NS_DIR, kind.proc_name(), 200 + inode);
        }
        backend
    }

    #[test]
    fn test_joins_all_in_order() {
        let mut backend = distinct();
        let report = join_namespaces(&mut backend, &config()).unwrap();

        assert_eq!(
            backend.setns_calls(),
            vec![
                "/proc/42/ns/ipc",
                "/proc/42/ns/uts",
                "/proc/42/ns/pid",
                "/proc/42/ns/mnt",
            ]
        );
        assert_eq!(report.joined().collect::<Vec<_>>(), JOIN_ORDER.to_vec());
        assert_eq!(report.target(), ProcessId::from_raw(42));
    }

    #[test]
    fn test_descriptors_do_not_accumulate() {
        let mut backend = distinct();
        join_namespaces(&mut backend, &config()).unwrap();

        assert_eq!(backend.peak_entry_handles(), 1);
        assert_eq!(backend.live_handles(), 0);

        // each entry is closed right after its setns
        let calls = backend.calls();
        let setns = calls
            .iter()
            .position(|c| *c == MockCall::Setns("/proc/42/ns/ipc".to_string()))
            .unwrap();
        assert_eq!(
            calls[setns + 1],
            MockCall::Close("/proc/42/ns/ipc".to_string())
        );
    }

    #[test]
    fn test_directories_closed_after_loop() {
        let mut backend = distinct();
        join_namespaces(&mut backend, &config()).unwrap();

        let calls = backend.calls();
        let tail = &calls[calls.len() - 2..];
        assert_eq!(
            tail,
            [
                MockCall::Close(SELF_NS_DIR.to_string()),
                MockCall::Close(TARGET.to_string()),
            ]
        );
    }

    #[test]
    fn test_missing_target_dir() {
        let mut backend = MockBackend::new().with_dir(SELF_NS_DIR);
        let err = join_namespaces(&mut backend, &config()).unwrap_err();

        assert_eq!(
            err,
            EnterError::OpenTarget {
                path: TARGET.to_string(),
                errno: Errno::ENOENT,
            }
        );
        assert!(backend.setns_calls().is_empty());
    }

    #[test]
    fn test_missing_self_dir() {
        let mut backend = MockBackend::new().with_dir(TARGET);
        let err = join_namespaces(&mut backend, &config()).unwrap_err();
        assert_eq!(err, EnterError::OpenSelf { errno: Errno::ENOENT });
    }

    #[test]
    fn test_absent_kind_is_skipped() {
        let mut backend = MockBackend::new()
            .with_dir(SELF_NS_DIR)
            .with_entry(TARGET, "ipc", 1)
            .with_entry(TARGET, "mnt", 4);

        let report = join_namespaces(&mut backend, &config()).unwrap();

        assert_eq!(
            backend.setns_calls(),
            vec!["/proc/42/ns/ipc", "/proc/42/ns/mnt"]
        );
        assert_eq!(report.outcome(NamespaceKind::Uts), Some(Outcome::Absent));
        assert_eq!(report.outcome(NamespaceKind::Pid), Some(Outcome::Absent));
        assert_eq!(report.outcome(NamespaceKind::Mnt), Some(Outcome::Joined));
    }

    #[test]
    fn test_shared_kind_never_joined() {
        let mut backend = distinct()
            .with_entry(TARGET, "pid", 7)
            .with_entry(SELF_NS_DIR, "pid", 7);

        let report = join_namespaces(&mut backend, &config()).unwrap();

        assert!(!backend.setns_calls().contains(&"/proc/42/ns/pid".to_string()));
        assert!(
            !backend
                .calls()
                .contains(&MockCall::Open("/proc/42/ns/pid".to_string()))
        );
        assert_eq!(report.outcome(NamespaceKind::Pid), Some(Outcome::Shared));
        assert_eq!(report.joined().count(), 3);
    }

    #[test]
    fn test_all_shared_joins_nothing() {
        let mut backend = MockBackend::new();
        for kind in JOIN_ORDER {
            backend = backend
                .with_entry(TARGET, kind.proc_name(), 9)
                .with_entry(SELF_NS_DIR, kind.proc_name(), 9);
        }

        let report = join_namespaces(&mut backend, &config()).unwrap();

        assert!(backend.setns_calls().is_empty());
        assert!(
            report
                .outcomes()
                .iter()
                .all(|(_, outcome)| *outcome == Outcome::Shared)
        );
    }

    #[test]
    fn test_self_stat_failure_does_not_skip() {
        let mut backend = distinct().with_stat_error(SELF_NS_DIR, "uts", Errno::EACCES);
        let report = join_namespaces(&mut backend, &config()).unwrap();
        assert_eq!(report.outcome(NamespaceKind::Uts), Some(Outcome::Joined));
    }

    #[test]
    fn test_target_stat_error_other_than_enoent_falls_through() {
        // Same inode on both sides, but the target stat fails with EACCES:
        // the kind is still opened and joined.
        let mut backend = distinct()
            .with_entry(TARGET, "uts", 5)
            .with_entry(SELF_NS_DIR, "uts", 5)
            .with_stat_error(TARGET, "uts", Errno::EACCES);

        let report = join_namespaces(&mut backend, &config()).unwrap();

        assert!(backend.setns_calls().contains(&"/proc/42/ns/uts".to_string()));
        assert_eq!(report.outcome(NamespaceKind::Uts), Some(Outcome::Joined));
    }

    #[test]
    fn test_open_failure_is_fatal() {
        let mut backend = distinct().with_open_error(TARGET, "pid", Errno::EACCES);
        let err = join_namespaces(&mut backend, &config()).unwrap_err();

        assert_eq!(
            err,
            EnterError::OpenNamespace {
                path: TARGET.to_string(),
                kind: NamespaceKind::Pid,
                errno: Errno::EACCES,
            }
        );
        // ipc and uts were joined before the failure and are not undone
        assert_eq!(
            backend.setns_calls(),
            vec!["/proc/42/ns/ipc", "/proc/42/ns/uts"]
        );
    }

    #[test]
    fn test_setns_failure_stops_the_loop() {
        let mut backend = distinct().with_setns_error(TARGET, "uts", Errno::EPERM);
        let err = join_namespaces(&mut backend, &config()).unwrap_err();

        assert_eq!(
            err,
            EnterError::Join {
                kind: NamespaceKind::Uts,
                errno: Errno::EPERM,
            }
        );
        assert_eq!(
            backend.setns_calls(),
            vec!["/proc/42/ns/ipc", "/proc/42/ns/uts"]
        );
    }

    #[test]
    fn test_custom_kind_list() {
        let mut backend = distinct();
        let config = config().with_kinds([NamespaceKind::Mnt]);

        let report = join_namespaces(&mut backend, &config).unwrap();

        assert_eq!(backend.setns_calls(), vec!["/proc/42/ns/mnt"]);
        assert_eq!(report.outcomes().len(), 1);
    }
}
