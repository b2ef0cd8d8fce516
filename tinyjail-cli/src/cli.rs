//! CLI argument definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tinyjail_core::ProcessId;

use crate::commands::setns_exec::SETNS_EXEC;

#[derive(Parser)]
#[command(name = "tinyjail")]
#[command(about = "Run commands inside the namespaces of a running container", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a command inside the namespaces of a running process
    Exec {
        /// Process whose namespaces to join
        #[arg(short, long)]
        pid: ProcessId,

        /// Terminal device to make the command's controlling terminal
        #[arg(long)]
        console: Option<PathBuf>,

        /// Command to run
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },

    /// Show namespace information
    Namespaces {
        /// Process ID (default: current process)
        #[arg(short, long)]
        pid: Option<ProcessId>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Exec a command in the namespaces joined at startup
    #[command(name = SETNS_EXEC, hide = true)]
    SetnsExec {
        /// Command to run
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },
}
