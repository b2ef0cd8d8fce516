//! Tinyjail CLI
//!
//! Enters the namespaces of running containers and runs commands there.

use clap::Parser;
use std::process;
use tinyjail_nsenter::nsenter;
use tracing::Level;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    // Join a target's namespaces, if one was requested, while this is still
    // the only thread. The tokio runtime is only built afterwards.
    let phase = nsenter();

    // Parse command-line arguments
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let command = match cli.command {
        Commands::SetnsExec { command } => {
            // Only returns if exec failed
            let err = commands::setns_exec::execute(&phase, &command);
            eprintln!("❌ Error: {err:#}");
            process::exit(127);
        }
        other => other,
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("❌ Error: failed to start runtime: {e}");
            process::exit(1);
        }
    };

    // Execute the command
    match runtime.block_on(commands::dispatch(command)) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("❌ Error: {e:#}");
            process::exit(1);
        }
    }
}
