//! Bootstrap configuration read from the environment

use std::os::fd::RawFd;

use tinyjail_core::ProcessId;

use crate::error::{EnterError, Result};
use crate::kind::{JOIN_ORDER, NamespaceKind};

/// Pid of the process whose namespaces are joined. Its presence is the
/// only thing that activates the bootstrap.
pub const INIT_PID_ENV: &str = "__TINYJAIL_INIT_PID__";

/// Optional descriptor to install as controlling terminal and stdio
pub const CONSOLE_FD_ENV: &str = "__TINYJAIL_CONSOLE_FD__";

/// What to join and how to finish the forked child's session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnterConfig {
    /// Process whose namespaces are joined
    pub target: ProcessId,

    /// Descriptor that becomes the controlling terminal of the child
    pub console: Option<RawFd>,

    /// Kinds to join, in order
    pub kinds: Vec<NamespaceKind>,
}

impl EnterConfig {
    /// Create a configuration joining the default kinds of `target`
    #[must_use]
    pub fn new(target: ProcessId) -> Self {
        Self {
            target,
            console: None,
            kinds: JOIN_ORDER.to_vec(),
        }
    }

    /// Set the console descriptor
    #[must_use]
    pub const fn with_console(mut self, fd: RawFd) -> Self {
        self.console = Some(fd);
        self
    }

    /// Replace the list of kinds to join
    #[must_use]
    pub fn with_kinds(mut self, kinds: impl Into<Vec<NamespaceKind>>) -> Self {
        self.kinds = kinds.into();
        self
    }

    /// Read the configuration from the process environment
    ///
    /// Returns `Ok(None)` when [`INIT_PID_ENV`] is unset.
    pub fn from_env() -> Result<Option<Self>> {
        Self::from_lookup(|name| {
            std::env::var_os(name).map(|value| value.to_string_lossy().into_owned())
        })
    }

    /// Read the configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Option<Self>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(value) = lookup(INIT_PID_ENV) else {
            return Ok(None);
        };

        let target =
            ProcessId::parse_canonical(&value).map_err(|_| EnterError::InvalidTarget {
                var: INIT_PID_ENV,
                value: value.clone(),
            })?;

        let mut config = Self::new(target);

        if let Some(console) = lookup(CONSOLE_FD_ENV) {
            config = config.with_console(parse_fd(&console)?);
        }

        Ok(Some(config))
    }

    /// `/proc/<pid>/ns` of the target
    #[must_use]
    pub fn target_ns_dir(&self) -> String {
        format!("/proc/{}/ns", self.target)
    }
}

fn parse_fd(value: &str) -> Result<RawFd> {
    let invalid = || EnterError::InvalidConsole {
        var: CONSOLE_FD_ENV,
        value: value.to_string(),
    };

    let fd: RawFd = value.parse().map_err(|_| invalid())?;
    if fd < 0 || fd.to_string() != value {
        return Err(invalid());
    }

    Ok(fd)
}
