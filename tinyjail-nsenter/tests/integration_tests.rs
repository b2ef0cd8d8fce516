use nix::errno::Errno;
use tinyjail_core::ProcessId;
use tinyjail_nsenter::*;

fn lookup(pid: Option<&'static str>) -> impl Fn(&str) -> Option<String> {
    move |name| (name == INIT_PID_ENV).then_some(pid).flatten().map(String::from)
}

#[test]
fn test_config_inactive_without_variable() {
    let config = EnterConfig::from_lookup(lookup(None)).unwrap();
    assert!(config.is_none());
}

#[test]
fn test_config_rejects_malformed_pids() {
    for value in ["abc", "-1", "1234x", "99999999999"] {
        let err = EnterConfig::from_lookup(lookup(Some(value))).unwrap_err();
        assert!(err.diagnostic().starts_with("nsenter: Unable to parse"));
        assert_eq!(EnterError::EXIT_STATUS, 1);
    }
}

#[test]
fn test_config_default_kinds() {
    let config = EnterConfig::from_lookup(lookup(Some("1234")))
        .unwrap()
        .unwrap();

    assert_eq!(config.target, ProcessId::from_raw(1234));
    assert_eq!(
        config.kinds,
        vec![
            NamespaceKind::Ipc,
            NamespaceKind::Uts,
            NamespaceKind::Pid,
            NamespaceKind::Mnt,
        ]
    );
}

#[test]
fn test_mock_join_skips_absent_and_shared() {
    let mut backend = MockBackend::new()
        .with_entry("/proc/1234/ns", "ipc", 1)
        .with_entry("/proc/self/ns", "ipc", 1)
        .with_entry("/proc/1234/ns", "pid", 2)
        .with_entry("/proc/self/ns", "pid", 3)
        .with_entry("/proc/1234/ns", "mnt", 4)
        .with_entry("/proc/self/ns", "mnt", 5);

    let config = EnterConfig::new(ProcessId::from_raw(1234));
    let report = join_namespaces(&mut backend, &config).unwrap();

    assert_eq!(report.outcome(NamespaceKind::Ipc), Some(Outcome::Shared));
    assert_eq!(report.outcome(NamespaceKind::Uts), Some(Outcome::Absent));
    assert_eq!(report.outcome(NamespaceKind::Pid), Some(Outcome::Joined));
    assert_eq!(report.outcome(NamespaceKind::Mnt), Some(Outcome::Joined));
    assert_eq!(
        backend.setns_calls(),
        vec!["/proc/1234/ns/pid", "/proc/1234/ns/mnt"]
    );
    assert_eq!(backend.live_handles(), 0);
}

#[test]
fn test_mock_join_missing_process() {
    let mut backend = MockBackend::new().with_dir("/proc/self/ns");
    let config = EnterConfig::new(ProcessId::from_raw(1234));

    let err = join_namespaces(&mut backend, &config).unwrap_err();

    assert_eq!(
        err.diagnostic(),
        "nsenter: Failed to open \"/proc/1234/ns\": No such file or directory"
    );
}

#[test]
fn test_mock_join_failure_is_not_rolled_back() {
    let mut backend = MockBackend::new()
        .with_entry("/proc/7/ns", "ipc", 1)
        .with_entry("/proc/7/ns", "uts", 2)
        .with_dir("/proc/self/ns")
        .with_setns_error("/proc/7/ns", "uts", Errno::EINVAL);

    let config = EnterConfig::new(ProcessId::from_raw(7));
    let err = join_namespaces(&mut backend, &config).unwrap_err();

    assert_eq!(
        err,
        EnterError::Join {
            kind: NamespaceKind::Uts,
            errno: Errno::EINVAL,
        }
    );
    // no setns back into our own namespaces
    assert_eq!(backend.setns_calls(), vec!["/proc/7/ns/ipc", "/proc/7/ns/uts"]);
}

#[test]
fn test_procfs_join_missing_process() {
    let config = EnterConfig::new(ProcessId::from_raw(i32::MAX));
    let err = join_namespaces(&mut ProcfsBackend::new(), &config).unwrap_err();

    assert_eq!(
        err,
        EnterError::OpenTarget {
            path: format!("/proc/{}/ns", i32::MAX),
            errno: Errno::ENOENT,
        }
    );
}

#[test]
fn test_procfs_join_self_issues_no_setns() {
    // Every kind is shared with ourselves, so nothing is switched and no
    // privileges are needed.
    let config = EnterConfig::new(ProcessId::current());
    let report = join_namespaces(&mut ProcfsBackend::new(), &config).unwrap();

    assert_eq!(report.joined().count(), 0);
    assert_eq!(report.outcomes().len(), 4);
}

#[test]
fn test_current_namespaces_readable() {
    let info = current_namespaces().unwrap();
    for kind in JOIN_ORDER {
        assert!(info.get(kind).is_some(), "{kind} should be readable");
    }
}
