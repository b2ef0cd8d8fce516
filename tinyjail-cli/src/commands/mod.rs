use crate::cli::Commands;
use anyhow::{Result, bail};

pub mod exec;
pub mod namespaces;
pub mod setns_exec;

/// Dispatch command to appropriate handler, returning the exit code
pub async fn dispatch(command: Commands) -> Result<i32> {
    match command {
        Commands::Exec {
            pid,
            console,
            command,
        } => exec::execute(pid, console.as_deref(), &command).await,

        Commands::Namespaces { pid, json } => {
            namespaces::execute(pid, json)?;
            Ok(0)
        }

        Commands::SetnsExec { .. } => {
            bail!("{} must run before the runtime starts", setns_exec::SETNS_EXEC)
        }
    }
}
