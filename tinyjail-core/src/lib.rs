//! Tinyjail Core - Foundation types shared across the workspace
//!
//! This crate provides the error type and process identifiers used by the
//! namespace bootstrap and the command-line front end.

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::ProcessId;
