//! Namespace entry for re-executed helper processes
//!
//! This crate joins the namespaces of an already running process before the
//! rest of the program starts:
//! - IPC namespace - System V IPC objects
//! - UTS namespace - Hostname
//! - PID namespace - Process ids (takes effect through the fork)
//! - Mount namespace - Filesystem view, always joined last
//!
//! Call [`nsenter`] first thing in `main`, before any runtime or thread is
//! started.

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod backend;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod fork;
pub mod inspect;
pub mod join;
pub mod kind;

pub use backend::{MockBackend, MockCall, NamespaceBackend, NsIdentity, ProcfsBackend};
pub use bootstrap::{Phase, enter, nsenter};
pub use config::{CONSOLE_FD_ENV, EnterConfig, INIT_PID_ENV};
pub use error::EnterError;
pub use inspect::{NamespaceInfo, children_of, current_namespaces, namespaces_for_pid};
pub use join::{JoinReport, Outcome, join_namespaces};
pub use kind::{JOIN_ORDER, NamespaceKind};
