//! Bootstrap failures and the single place they terminate the process

use nix::errno::Errno;
use std::borrow::Borrow;
use thiserror::Error;

use crate::kind::NamespaceKind;

/// Everything that can go wrong while entering a target's namespaces
///
/// None of these are recoverable: a half-joined process is never allowed to
/// continue. The `Display` form is the text printed after `nsenter: `.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnterError {
    /// The pid variable is not a canonical positive decimal
    #[error("Unable to parse {var}: {value:?} is not a process id")]
    InvalidTarget {
        /// Environment variable that carried the value
        var: &'static str,
        /// Offending value
        value: String,
    },

    /// The console variable is not a canonical descriptor number
    #[error("Unable to parse {var}: {value:?} is not a file descriptor")]
    InvalidConsole {
        /// Environment variable that carried the value
        var: &'static str,
        /// Offending value
        value: String,
    },

    /// Namespaces can only be switched by the sole thread of a process
    #[error("Refusing to setns from a process with {threads} threads")]
    MultiThreaded {
        /// Threads found in `/proc/self/task`
        threads: usize,
    },

    /// `/proc/self/task` could not be listed
    #[error("Failed to inspect /proc/self/task: {}", strerror(.errno))]
    ThreadCount {
        /// Underlying error
        errno: Errno,
    },

    /// The target's namespace directory could not be opened
    #[error("Failed to open \"{path}\": {}", strerror(.errno))]
    OpenTarget {
        /// Directory that was opened
        path: String,
        /// Underlying error
        errno: Errno,
    },

    /// Our own namespace directory could not be opened
    #[error("Failed to open /proc/self/ns: {}", strerror(.errno))]
    OpenSelf {
        /// Underlying error
        errno: Errno,
    },

    /// A namespace entry exists but could not be opened
    #[error("Failed to open ns file {path} for ns {kind}: {}", strerror(.errno))]
    OpenNamespace {
        /// Directory the entry lives in
        path: String,
        /// Kind being joined
        kind: NamespaceKind,
        /// Underlying error
        errno: Errno,
    },

    /// `setns(2)` rejected the descriptor
    #[error("Failed to setns for {kind}: {}", strerror(.errno))]
    Join {
        /// Kind being joined
        kind: NamespaceKind,
        /// Underlying error
        errno: Errno,
    },

    /// The child process could not be created
    #[error("Unable to fork: {}", strerror(.errno))]
    Fork {
        /// Underlying error
        errno: Errno,
    },

    /// `setsid(2)` failed in the child
    #[error("setsid failed: {}", strerror(.errno))]
    Setsid {
        /// Underlying error
        errno: Errno,
    },

    /// `TIOCSCTTY` failed on the console descriptor
    #[error("ioctl TIOCSCTTY failed: {}", strerror(.errno))]
    ControllingTerminal {
        /// Underlying error
        errno: Errno,
    },

    /// A standard descriptor could not be pointed at the console
    #[error("Failed to dup {fd}: {}", strerror(.errno))]
    Redirect {
        /// Standard descriptor being replaced
        fd: i32,
        /// Underlying error
        errno: Errno,
    },
}

/// OS description of `errno`, as `strerror(3)` renders it
///
/// Not `Errno::desc()`: nix keeps its own table, which differs from libc.
fn strerror(errno: impl Borrow<Errno>) -> String {
    let errno = *errno.borrow();
    let text = std::io::Error::from_raw_os_error(errno as i32).to_string();
    match text.rsplit_once(" (os error ") {
        Some((desc, _)) => desc.to_string(),
        None => text,
    }
}

/// Result type alias for bootstrap operations
pub type Result<T> = std::result::Result<T, EnterError>;

impl EnterError {
    /// Status every bootstrap failure exits with
    pub const EXIT_STATUS: i32 = 1;

    /// The single diagnostic line written before exiting
    #[must_use]
    pub fn diagnostic(&self) -> String {
        format!("nsenter: {self}")
    }

    /// Print the diagnostic and terminate the process
    ///
    /// Only called from the bootstrap phase, before any other thread or
    /// runtime exists, so skipping destructors is harmless.
    #[allow(clippy::print_stderr)]
    pub fn abort(&self) -> ! {
        tracing::error!(error = %self, "namespace bootstrap failed");
        eprintln!("{}", self.diagnostic());
        std::process::exit(Self::EXIT_STATUS)
    }
}
