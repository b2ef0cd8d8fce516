//! Core type definitions with strong typing and validation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Process identifier
///
/// Parsing from text is strict: the string must be the canonical decimal
/// rendering of a positive pid, so `"0042"`, `"+42"`, `" 42"` and `"42\n"`
/// are all rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct ProcessId(i32);

impl ProcessId {
    /// Create from raw PID
    #[must_use]
    pub const fn from_raw(pid: i32) -> Self {
        Self(pid)
    }

    /// Get the current process ID
    #[must_use]
    pub fn current() -> Self {
        #[allow(clippy::cast_possible_wrap)]
        Self(std::process::id() as i32)
    }

    /// Parse a pid from its canonical decimal form
    ///
    /// # Errors
    /// Returns error if the value does not parse, is not positive, or does
    /// not render back to exactly the same text.
    pub fn parse_canonical(value: &str) -> Result<Self> {
        let invalid = || Error::InvalidConfig {
            message: format!("invalid process id {value:?}"),
        };

        let pid: i32 = value.parse().map_err(|_| invalid())?;
        if pid <= 0 || pid.to_string() != value {
            return Err(invalid());
        }

        Ok(Self(pid))
    }

    /// Convert to `nix::unistd::Pid`
    #[must_use]
    pub const fn as_nix_pid(self) -> nix::unistd::Pid {
        nix::unistd::Pid::from_raw(self.0)
    }

    /// Get raw PID value
    #[must_use]
    pub const fn as_raw(self) -> i32 {
        self.0
    }

    /// The value a parent observes when this pid is used as an exit status
    ///
    /// `exit(2)` only keeps the low eight bits.
    #[must_use]
    pub const fn as_exit_status(self) -> i32 {
        self.0 & 0xff
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProcessId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_canonical(s)
    }
}

impl From<nix::unistd::Pid> for ProcessId {
    fn from(pid: nix::unistd::Pid) -> Self {
        Self(pid.as_raw())
    }
}

impl From<ProcessId> for nix::unistd::Pid {
    fn from(pid: ProcessId) -> Self {
        Self::from_raw(pid.0)
    }
}
