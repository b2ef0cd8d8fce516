//! Namespace kinds and the order in which they are joined

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kinds that the bootstrap joins, in join order
///
/// `pid` precedes `mnt` so that the mount namespace, which changes how every
/// later path resolves, is always the last switch.
pub const JOIN_ORDER: [NamespaceKind; 4] = [
    NamespaceKind::Ipc,
    NamespaceKind::Uts,
    NamespaceKind::Pid,
    NamespaceKind::Mnt,
];

/// A kind of Linux namespace, named after its `/proc/<pid>/ns` entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamespaceKind {
    /// System V IPC and POSIX message queues
    Ipc,
    /// Hostname and NIS domain name
    Uts,
    /// Process ids
    Pid,
    /// Mount table
    Mnt,
    /// Network stack
    Net,
    /// User and group ids
    User,
    /// Cgroup root
    Cgroup,
}

impl NamespaceKind {
    /// Every kind that can be inspected under `/proc/<pid>/ns`
    pub const ALL: [Self; 7] = [
        Self::Ipc,
        Self::Uts,
        Self::Pid,
        Self::Mnt,
        Self::Net,
        Self::User,
        Self::Cgroup,
    ];

    /// Entry name under `/proc/<pid>/ns`
    #[must_use]
    pub const fn proc_name(self) -> &'static str {
        match self {
            Self::Ipc => "ipc",
            Self::Uts => "uts",
            Self::Pid => "pid",
            Self::Mnt => "mnt",
            Self::Net => "net",
            Self::User => "user",
            Self::Cgroup => "cgroup",
        }
    }
}

impl fmt::Display for NamespaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.proc_name())
    }
}
