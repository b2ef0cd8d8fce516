//! Namespace backend trait for pluggable implementations
//!
//! The join loop only needs four primitives: open a `/proc/<pid>/ns`
//! directory, stat an entry in it, open an entry, and `setns(2)` on the
//! result. Handles close when dropped.

#![allow(unsafe_code)]

use nix::errno::Errno;
use nix::sched::{CloneFlags, setns};
use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::CString;
use std::mem::MaybeUninit;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::rc::Rc;

/// Kernel identity of a namespace: the inode of its `nsfs` entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NsIdentity(pub u64);

/// Trait for namespace backends
///
/// This allows for different implementations:
/// - [`ProcfsBackend`] - Production, real syscalls against `/proc`
/// - [`MockBackend`] - Testing without privileges or a live target
pub trait NamespaceBackend {
    /// Open handle; closing happens on drop
    type Handle;

    /// Open a namespace directory such as `/proc/1234/ns`
    ///
    /// # Errors
    /// Returns the errno of the failed open
    fn open_dir(&mut self, path: &str) -> nix::Result<Self::Handle>;

    /// Stat an entry of an open namespace directory, following the link
    ///
    /// # Errors
    /// Returns the errno of the failed stat
    fn stat_entry(&mut self, dir: &Self::Handle, name: &str) -> nix::Result<NsIdentity>;

    /// Open an entry of an open namespace directory read-only
    ///
    /// # Errors
    /// Returns the errno of the failed open
    fn open_entry(&mut self, dir: &Self::Handle, name: &str) -> nix::Result<Self::Handle>;

    /// Move the calling process into the namespace behind `ns`
    ///
    /// # Errors
    /// Returns the errno of the failed `setns(2)`
    fn setns(&mut self, ns: &Self::Handle) -> nix::Result<()>;
}

/// Production backend issuing real syscalls
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcfsBackend;

impl ProcfsBackend {
    /// Create a new procfs backend
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn c_path(path: &str) -> nix::Result<CString> {
    CString::new(path).map_err(|_| Errno::EINVAL)
}

impl NamespaceBackend for ProcfsBackend {
    type Handle = OwnedFd;

    fn open_dir(&mut self, path: &str) -> nix::Result<OwnedFd> {
        let path = c_path(path)?;
        // SAFETY: path is a valid NUL-terminated string.
        let fd = Errno::result(unsafe {
            libc::open(
                path.as_ptr(),
                libc::O_DIRECTORY | libc::O_RDONLY | libc::O_CLOEXEC,
            )
        })?;
        // SAFETY: fd was just returned by open(2) and is owned by nobody else.
        Ok(unsafe { OwnedFd::from_raw_fd(fd) })
    }

    fn stat_entry(&mut self, dir: &OwnedFd, name: &str) -> nix::Result<NsIdentity> {
        let name = c_path(name)?;
        let mut st = MaybeUninit::<libc::stat>::zeroed();
        // SAFETY: dir is an open directory, name is NUL-terminated and st is
        // large enough for the kernel to fill.
        Errno::result(unsafe {
            libc::fstatat(dir.as_raw_fd(), name.as_ptr(), st.as_mut_ptr(), 0)
        })?;
        // SAFETY: fstatat succeeded, so st is initialised.
        let st = unsafe { st.assume_init() };
        Ok(NsIdentity(u64::from(st.st_ino)))
    }

    fn open_entry(&mut self, dir: &OwnedFd, name: &str) -> nix::Result<OwnedFd> {
        let name = c_path(name)?;
        // SAFETY: dir is an open directory and name is NUL-terminated.
        let fd = Errno::result(unsafe {
            libc::openat(dir.as_raw_fd(), name.as_ptr(), libc::O_RDONLY | libc::O_CLOEXEC)
        })?;
        // SAFETY: fd was just returned by openat(2) and is owned by nobody else.
        Ok(unsafe { OwnedFd::from_raw_fd(fd) })
    }

    fn setns(&mut self, ns: &OwnedFd) -> nix::Result<()> {
        // nstype 0: accept whatever kind the descriptor refers to
        setns(ns, CloneFlags::empty())
    }
}

/// A syscall observed by [`MockBackend`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    /// Directory opened
    OpenDir(String),
    /// Entry stat'ed, as `dir/name`
    Stat(String),
    /// Entry opened, as `dir/name`
    Open(String),
    /// `setns` on an entry, as `dir/name`
    Setns(String),
    /// Handle dropped
    Close(String),
}

#[derive(Debug, Clone, Copy)]
struct MockEntry {
    stat: Result<NsIdentity, Errno>,
    open: Result<(), Errno>,
    setns: Result<(), Errno>,
}

#[derive(Debug, Default)]
struct MockState {
    dirs: HashMap<String, HashMap<String, MockEntry>>,
    calls: Vec<MockCall>,
    live: usize,
    peak_entries: usize,
    live_entries: usize,
}

/// Mock backend for testing (never touches the kernel)
///
/// # Example
/// ```
/// use tinyjail_nsenter::{EnterConfig, MockBackend, join_namespaces};
/// use tinyjail_core::ProcessId;
///
/// let mut backend = MockBackend::new()
///     .with_dir("/proc/self/ns")
///     .with_dir("/proc/42/ns")
///     .with_entry("/proc/42/ns", "uts", 7)
///     .with_entry("/proc/self/ns", "uts", 8);
///
/// let config = EnterConfig::new(ProcessId::from_raw(42));
/// let report = join_namespaces(&mut backend, &config).unwrap();
///
/// assert_eq!(backend.setns_calls(), vec!["/proc/42/ns/uts".to_string()]);
/// assert_eq!(report.joined().count(), 1);
/// assert_eq!(backend.live_handles(), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Rc<RefCell<MockState>>,
}

/// Handle handed out by [`MockBackend`]
#[derive(Debug)]
pub struct MockHandle {
    path: String,
    entry: bool,
    state: Rc<RefCell<MockState>>,
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        let mut state = self.state.borrow_mut();
        state.live -= 1;
        if self.entry {
            state.live_entries -= 1;
        }
        state.calls.push(MockCall::Close(self.path.clone()));
    }
}

impl MockBackend {
    /// Create a new mock backend with no directories
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an openable namespace directory
    #[must_use]
    pub fn with_dir(self, dir: &str) -> Self {
        self.state
            .borrow_mut()
            .dirs
            .entry(dir.to_string())
            .or_default();
        self
    }

    /// Register an entry that stats to `inode`, opens and joins cleanly
    #[must_use]
    pub fn with_entry(self, dir: &str, name: &str, inode: u64) -> Self {
        self.set_entry(
            dir,
            name,
            MockEntry {
                stat: Ok(NsIdentity(inode)),
                open: Ok(()),
                setns: Ok(()),
            },
        )
    }

    /// Make stat of an entry fail while still letting it be opened
    #[must_use]
    pub fn with_stat_error(self, dir: &str, name: &str, errno: Errno) -> Self {
        self.update_entry(dir, name, |entry| entry.stat = Err(errno))
    }

    /// Make opening an entry fail
    #[must_use]
    pub fn with_open_error(self, dir: &str, name: &str, errno: Errno) -> Self {
        self.update_entry(dir, name, |entry| entry.open = Err(errno))
    }

    /// Make `setns` on an entry fail
    #[must_use]
    pub fn with_setns_error(self, dir: &str, name: &str, errno: Errno) -> Self {
        self.update_entry(dir, name, |entry| entry.setns = Err(errno))
    }

    fn set_entry(self, dir: &str, name: &str, entry: MockEntry) -> Self {
        self.state
            .borrow_mut()
            .dirs
            .entry(dir.to_string())
            .or_default()
            .insert(name.to_string(), entry);
        self
    }

    fn update_entry(self, dir: &str, name: &str, f: impl FnOnce(&mut MockEntry)) -> Self {
        {
            let mut state = self.state.borrow_mut();
            let entry = state
                .dirs
                .entry(dir.to_string())
                .or_default()
                .entry(name.to_string())
                .or_insert(MockEntry {
                    stat: Ok(NsIdentity(0)),
                    open: Ok(()),
                    setns: Ok(()),
                });
            f(entry);
        }
        self
    }

    /// Every call made so far, in order
    #[must_use]
    pub fn calls(&self) -> Vec<MockCall> {
        self.state.borrow().calls.clone()
    }

    /// Entries `setns` was invoked on, in order
    #[must_use]
    pub fn setns_calls(&self) -> Vec<String> {
        self.state
            .borrow()
            .calls
            .iter()
            .filter_map(|call| match call {
                MockCall::Setns(path) => Some(path.clone()),
                _ => None,
            })
            .collect()
    }

    /// Handles currently open
    #[must_use]
    pub fn live_handles(&self) -> usize {
        self.state.borrow().live
    }

    /// Most entry handles that were ever open at the same time
    #[must_use]
    pub fn peak_entry_handles(&self) -> usize {
        self.state.borrow().peak_entries
    }

    fn handle(&self, path: String, entry: bool) -> MockHandle {
        let mut state = self.state.borrow_mut();
        state.live += 1;
        if entry {
            state.live_entries += 1;
            state.peak_entries = state.peak_entries.max(state.live_entries);
        }
        MockHandle {
            path,
            entry,
            state: Rc::clone(&self.state),
        }
    }

    fn lookup(&self, dir: &MockHandle, name: &str) -> Option<MockEntry> {
        self.state
            .borrow()
            .dirs
            .get(&dir.path)
            .and_then(|entries| entries.get(name))
            .copied()
    }
}

impl NamespaceBackend for MockBackend {
    type Handle = MockHandle;

    fn open_dir(&mut self, path: &str) -> nix::Result<MockHandle> {
        let exists = {
            let mut state = self.state.borrow_mut();
            state.calls.push(MockCall::OpenDir(path.to_string()));
            state.dirs.contains_key(path)
        };
        if !exists {
            return Err(Errno::ENOENT);
        }
        Ok(self.handle(path.to_string(), false))
    }

    fn stat_entry(&mut self, dir: &MockHandle, name: &str) -> nix::Result<NsIdentity> {
        let path = format!("{}/{name}", dir.path);
        self.state.borrow_mut().calls.push(MockCall::Stat(path));
        self.lookup(dir, name).ok_or(Errno::ENOENT)?.stat
    }

    fn open_entry(&mut self, dir: &MockHandle, name: &str) -> nix::Result<MockHandle> {
        let path = format!("{}/{name}", dir.path);
        self.state.borrow_mut().calls.push(MockCall::Open(path.clone()));
        self.lookup(dir, name).ok_or(Errno::ENOENT)?.open?;
        Ok(self.handle(path, true))
    }

    fn setns(&mut self, ns: &MockHandle) -> nix::Result<()> {
        self.state
            .borrow_mut()
            .calls
            .push(MockCall::Setns(ns.path.clone()));

        let (dir, name) = ns.path.rsplit_once('/').ok_or(Errno::EINVAL)?;
        self.state
            .borrow()
            .dirs
            .get(dir)
            .and_then(|entries| entries.get(name))
            .map_or(Err(Errno::EINVAL), |entry| entry.setns)
    }
}
