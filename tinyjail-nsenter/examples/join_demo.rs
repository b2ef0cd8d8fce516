//! Join the namespaces of another process and show where we ended up
//!
//! Run with: cargo run --example join_demo
//! Join a container: sudo __TINYJAIL_INIT_PID__=<pid> cargo run --example join_demo

use tinyjail_nsenter::{Outcome, Phase, current_namespaces, nsenter};

fn main() {
    // Nothing may start a thread before this call.
    let phase = nsenter();

    tracing_subscriber::fmt::init();

    match &phase {
        Phase::Inactive => {
            println!("🔓 Bootstrap inactive (set __TINYJAIL_INIT_PID__ to join a process)\n");
        }
        Phase::Joined(report) => {
            println!("🔒 Joined namespaces of PID {}\n", report.target());
            for (kind, outcome) in report.outcomes() {
                let marker = match outcome {
                    Outcome::Joined => "✅ joined",
                    Outcome::Shared => "➖ already shared",
                    Outcome::Absent => "⚠️  absent",
                };
                println!("  {:<4} {marker}", kind.proc_name());
            }
            println!();
        }
    }

    match current_namespaces() {
        Ok(info) => print!("{info}"),
        Err(e) => println!("❌ Failed to get namespaces: {e}"),
    }
}
