//! Read-only views of `/proc`: namespace identities and process parentage

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use tinyjail_core::{Error, ProcessId, Result};

use crate::kind::NamespaceKind;

/// Namespace identities of one process
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamespaceInfo {
    /// Process that was inspected
    pub pid: ProcessId,
    /// Link text of every readable entry, e.g. `pid:[4026531836]`
    pub namespaces: BTreeMap<NamespaceKind, String>,
}

impl NamespaceInfo {
    /// Identity of one kind, if readable
    #[must_use]
    pub fn get(&self, kind: NamespaceKind) -> Option<&str> {
        self.namespaces.get(&kind).map(String::as_str)
    }

    /// Kinds whose identity differs from (or is missing in) `other`
    #[must_use]
    pub fn differs_from(&self, other: &Self) -> Vec<NamespaceKind> {
        NamespaceKind::ALL
            .into_iter()
            .filter(|kind| self.get(*kind) != other.get(*kind))
            .collect()
    }

    /// Check if in different pid, net or mount namespace than init (PID 1)
    ///
    /// # Errors
    /// Returns error if the namespaces of PID 1 cannot be read
    pub fn is_isolated(&self) -> Result<bool> {
        let init = namespaces_for_pid(ProcessId::from_raw(1))?;

        Ok([NamespaceKind::Pid, NamespaceKind::Net, NamespaceKind::Mnt]
            .into_iter()
            .any(|kind| self.get(kind) != init.get(kind)))
    }
}

impl fmt::Display for NamespaceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Namespace Info:")?;
        for (kind, link) in &self.namespaces {
            let label = format!("{}:", kind.proc_name().to_uppercase());
            writeln!(f, "  {label:<8}{link}")?;
        }
        Ok(())
    }
}

/// Namespaces of the calling process
///
/// # Errors
/// Returns error if `/proc/self/ns` cannot be read
pub fn current_namespaces() -> Result<NamespaceInfo> {
    namespaces_for_pid(ProcessId::current())
}

/// Namespaces of an arbitrary process
///
/// Entries that cannot be read (permissions, kinds unsupported by the
/// kernel) are left out.
///
/// # Errors
/// Returns [`Error::ProcessNotFound`] if the process has no `/proc` entry
pub fn namespaces_for_pid(pid: ProcessId) -> Result<NamespaceInfo> {
    let base_path = format!("/proc/{pid}/ns");

    match fs::metadata(&base_path) {
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(Error::ProcessNotFound { pid: pid.as_raw() });
        }
        Err(e) => return Err(e.into()),
    }

    let namespaces = NamespaceKind::ALL
        .into_iter()
        .filter_map(|kind| {
            let path = format!("{base_path}/{}", kind.proc_name());
            fs::read_link(path)
                .ok()
                .map(|link| (kind, link.to_string_lossy().into_owned()))
        })
        .collect();

    Ok(NamespaceInfo { pid, namespaces })
}

/// Live (or zombie) children of `parent`, by scanning `/proc/*/stat`
///
/// # Errors
/// Returns error if `/proc` cannot be listed
pub fn children_of(parent: ProcessId) -> Result<Vec<ProcessId>> {
    let mut children = Vec::new();

    for entry in fs::read_dir("/proc")? {
        let entry = entry?;
        let Some(pid) = entry
            .file_name()
            .to_str()
            .and_then(|name| ProcessId::parse_canonical(name).ok())
        else {
            continue;
        };

        // Processes may vanish between listing and reading.
        let Ok(stat) = fs::read_to_string(entry.path().join("stat")) else {
            continue;
        };

        if parse_stat_ppid(&stat) == Some(parent) {
            children.push(pid);
        }
    }

    children.sort_by_key(|pid| pid.as_raw());
    Ok(children)
}

/// Parent pid from the contents of `/proc/<pid>/stat`
///
/// The command name is parenthesised and may itself contain spaces and
/// parentheses, so fields are counted from the last `)`.
#[must_use]
pub fn parse_stat_ppid(stat: &str) -> Option<ProcessId> {
    let (_, rest) = stat.rsplit_once(')')?;
    let mut fields = rest.split_whitespace();
    let _state = fields.next()?;
    fields.next()?.parse().ok().map(ProcessId::from_raw)
}
