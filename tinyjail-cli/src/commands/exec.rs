//! Exec command implementation
//!
//! Re-executes this binary with the bootstrap variables set. That helper
//! joins the target's namespaces and forks; the fork is attached to us, so
//! once the helper has exited we adopt the new process and wait for it.

#![allow(unsafe_code)]

use anyhow::{Context, Result, bail};
use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::sys::wait::{WaitStatus, waitpid};
use std::fs::OpenOptions;
use std::os::fd::{AsRawFd, OwnedFd};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::ExitStatus;
use tinyjail_core::ProcessId;
use tinyjail_nsenter::{CONSOLE_FD_ENV, INIT_PID_ENV, children_of, namespaces_for_pid};
use tokio::process::Command;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{debug, info, warn};

use super::setns_exec::SETNS_EXEC;

pub async fn execute(pid: ProcessId, console: Option<&Path>, command: &[String]) -> Result<i32> {
    namespaces_for_pid(pid).with_context(|| format!("Cannot enter namespaces of PID {pid}"))?;

    let console = console.map(open_console).transpose()?;

    let mut helper = Command::new("/proc/self/exe");
    helper
        .arg(SETNS_EXEC)
        .arg("--")
        .args(command)
        .env(INIT_PID_ENV, pid.to_string());
    if let Some(fd) = &console {
        helper.env(CONSOLE_FD_ENV, fd.as_raw_fd().to_string());
    }

    info!("🚀 Entering PID {}: {}", pid, command.join(" "));

    let status = helper
        .status()
        .await
        .context("Failed to start setns helper")?;
    drop(console);

    let low_byte = decode_helper_status(status)?;
    let children = children_of(ProcessId::current()).context("Failed to list child processes")?;
    let Some(child) = select_adopted(&children, low_byte) else {
        bail!("setns helper exited with {low_byte} but no matching child was found");
    };

    debug!(child = %child, "adopted forked process");
    wait_forwarding_signals(child).await
}

/// Open a terminal so that the helper inherits it
fn open_console(path: &Path) -> Result<OwnedFd> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_NOCTTY)
        .open(path)
        .with_context(|| format!("Failed to open console {}", path.display()))?;
    let fd = OwnedFd::from(file);

    // SAFETY: F_SETFD only changes the descriptor flags of an fd we own.
    Errno::result(unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_SETFD, 0) })
        .context("Failed to make console inheritable")?;

    Ok(fd)
}

/// Turn the helper's exit status into the low byte of the forked pid
fn decode_helper_status(status: ExitStatus) -> Result<i32> {
    match status.code() {
        Some(1) => bail!("setns helper failed"),
        Some(code) => Ok(code),
        None => bail!(
            "setns helper was killed by signal {}",
            status.signal().unwrap_or_default()
        ),
    }
}

/// Pick the child whose pid matches the helper's exit status
///
/// The exit status only carries the low eight bits of the pid; among
/// several matches the newest (highest) pid wins.
fn select_adopted(children: &[ProcessId], low_byte: i32) -> Option<ProcessId> {
    let matching: Vec<_> = children
        .iter()
        .copied()
        .filter(|pid| pid.as_exit_status() == low_byte)
        .collect();

    if matching.len() > 1 {
        warn!(candidates = ?matching, "several children match the helper status");
    }

    matching.into_iter().max_by_key(|pid| pid.as_raw())
}

async fn wait_forwarding_signals(child: ProcessId) -> Result<i32> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let mut wait = tokio::task::spawn_blocking(move || wait_for_exit(child));

    loop {
        tokio::select! {
            result = &mut wait => return result.context("Wait task failed")?,
            _ = sigint.recv() => forward(child, Signal::SIGINT),
            _ = sigterm.recv() => forward(child, Signal::SIGTERM),
        }
    }
}

fn forward(child: ProcessId, signal: Signal) {
    warn!("Received {signal}, forwarding to PID {child}");
    if let Err(e) = kill(child.as_nix_pid(), signal) {
        warn!("Could not forward {signal}: {e}");
    }
}

/// Wait for the adopted process and map its end to an exit code
fn wait_for_exit(child: ProcessId) -> Result<i32> {
    loop {
        match waitpid(child.as_nix_pid(), None) {
            Ok(WaitStatus::Exited(_, exit_code)) => {
                info!("👋 Command exited with code: {}", exit_code);
                return Ok(exit_code);
            }
            Ok(WaitStatus::Signaled(_, signal, _)) => {
                warn!("Command terminated by signal: {:?}", signal);
                // Exit codes for signals: 128 + signal number
                return Ok(128 + signal as i32);
            }
            Ok(status) => {
                debug!("Command status: {:?}", status);
            }
            Err(Errno::EINTR) => {}
            Err(Errno::ECHILD) => {
                bail!("PID {child} is not a child of this process, its exit status is lost");
            }
            Err(e) => {
                return Err(e).context("Wait failed");
            }
        }
    }
}
