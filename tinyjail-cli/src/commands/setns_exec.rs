//! Hidden command run by the forked child after the bootstrap joined a target

use anyhow::{Context, Result, bail};
use std::convert::Infallible;
use std::ffi::{CString, OsString};
use std::os::unix::ffi::OsStrExt;
use tinyjail_nsenter::{CONSOLE_FD_ENV, INIT_PID_ENV, Phase};
use tracing::debug;

/// Subcommand name the launcher re-executes us with
pub const SETNS_EXEC: &str = "__setns-exec";

/// Replace this process with `command`; only returns on failure
pub fn execute(phase: &Phase, command: &[String]) -> anyhow::Error {
    match exec(phase, command) {
        Ok(never) => match never {},
        Err(e) => e,
    }
}

fn exec(phase: &Phase, command: &[String]) -> Result<Infallible> {
    let Phase::Joined(report) = phase else {
        bail!("{SETNS_EXEC} must be started by `tinyjail exec`");
    };
    let Some(program) = command.first() else {
        bail!("Command cannot be empty");
    };

    debug!(
        pid = %report.target(),
        joined = ?report.joined().collect::<Vec<_>>(),
        "executing inside target namespaces"
    );

    let program_cstring =
        CString::new(program.as_bytes()).with_context(|| format!("Invalid program name: {program}"))?;
    let args = command
        .iter()
        .map(|arg| CString::new(arg.as_bytes()))
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("Invalid argument")?;
    let env = clean_environment(std::env::vars_os());

    // Exec replaces this process with the command
    nix::unistd::execvpe(&program_cstring, &args, &env)
        .with_context(|| format!("Failed to execute {program}"))
}

/// `KEY=VALUE` pairs of the environment minus the bootstrap variables
///
/// The command must not see them, or a nested tinyjail would try to join
/// the target again.
fn clean_environment(vars: impl IntoIterator<Item = (OsString, OsString)>) -> Vec<CString> {
    vars.into_iter()
        .filter(|(key, _)| key != INIT_PID_ENV && key != CONSOLE_FD_ENV)
        .filter_map(|(key, value)| {
            let mut pair = key.as_bytes().to_vec();
            pair.push(b'=');
            pair.extend_from_slice(value.as_bytes());
            CString::new(pair).ok()
        })
        .collect()
}
