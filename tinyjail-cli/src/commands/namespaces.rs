//! Namespaces command implementation

use anyhow::{Context, Result};
use tinyjail_core::ProcessId;
use tinyjail_nsenter::{NamespaceKind, namespaces_for_pid};

pub fn execute(pid: Option<ProcessId>, json: bool) -> Result<()> {
    let target_pid = pid.unwrap_or_else(ProcessId::current);

    let ns_info =
        namespaces_for_pid(target_pid).context("Failed to get namespace information")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&ns_info)?);
        return Ok(());
    }

    println!("\n🔒 Namespace Information for PID {target_pid}");
    println!("{:-<60}", "");

    print!("{ns_info}");

    // Check if isolated
    match ns_info.is_isolated() {
        Ok(true) => println!("\n✅ Process is in isolated namespaces"),
        Ok(false) => println!("\n⚠️  Process is in host namespaces"),
        Err(e) => println!("\n❌ Failed to check isolation: {e}"),
    }

    // Hostname as seen from our own UTS namespace
    if ns_info.get(NamespaceKind::Uts).is_some() && pid.is_none() {
        if let Ok(hostname) = std::fs::read_to_string("/proc/sys/kernel/hostname") {
            println!("Hostname: {}", hostname.trim());
        }
    }

    Ok(())
}
