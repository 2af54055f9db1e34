//! agent-bridge CLI: inspect which native engine modules are usable here.
//!
//! Usage:
//!   agent-bridge-cli probe [--config <path>] [--json]   Probe every candidate module
//!   agent-bridge-cli version                            Show version information

use agent_bridge::{AgentBridge, BridgeConfig};
use anyhow::Context;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    match args[1].as_str() {
        "probe" => cmd_probe(&args[2..]).await,
        "version" | "--version" | "-V" => {
            cmd_version();
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!(
        r#"agent-bridge-cli - native engine module inspection

USAGE:
    agent-bridge-cli <COMMAND> [OPTIONS]

COMMANDS:
    probe [--config <path>] [--json]   Probe every candidate module in priority order
    version                            Show version information
    help                               Show this help message

ENVIRONMENT:
    AGENT_BRIDGE_BACKEND               Pin selection to one candidate
    AGENT_BRIDGE_ENVELOPE_CMD          Command line of the envelope process module
    AGENT_BRIDGE_INPROCESS             Set to 0 to disable the in-process module
    RUST_LOG                           Log filter (default: warn)"#
    );
}

fn cmd_version() {
    println!(
        "agent-bridge-cli {} (native ABI {})",
        env!("CARGO_PKG_VERSION"),
        agent_bridge::native::ABI_VERSION,
    );
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

async fn cmd_probe(args: &[String]) -> anyhow::Result<()> {
    let config = match flag_value(args, "--config") {
        Some(path) => BridgeConfig::load(path).with_context(|| format!("loading {path}"))?,
        None => BridgeConfig::from_env(),
    };
    let json = args.iter().any(|a| a == "--json");

    // This binary links no in-process engine; only external modules can load.
    let bridge = AgentBridge::from_config(&config, None);
    let reports = bridge.selector().probe_all().await;

    if json {
        let out: Vec<_> = reports
            .iter()
            .map(|r| {
                serde_json::json!({
                    "name": r.name,
                    "priority": r.priority,
                    "strategy": r.strategy,
                    "available": r.is_available(),
                    "capabilities": r.outcome.as_ref().ok(),
                    "error": r.outcome.as_ref().err(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{:<20} {:>8}  {:<9} STATUS", "CANDIDATE", "PRIORITY", "STRATEGY");
        for r in &reports {
            let strategy = r.strategy.map(|s| s.to_string()).unwrap_or_else(|| "-".into());
            let status = match &r.outcome {
                Ok(caps) => format!(
                    "ok (abi {}, callbacks: {}, streaming: {}, version: {})",
                    caps.abi_version,
                    caps.tool_callbacks,
                    caps.streaming,
                    caps.version.as_deref().unwrap_or("unknown")
                ),
                Err(e) => format!("unavailable: {e}"),
            };
            println!("{:<20} {:>8}  {:<9} {}", r.name, r.priority, strategy, status);
        }
    }

    let usable = match &config.backend {
        Some(pin) => reports.iter().any(|r| &r.name == pin && r.is_available()),
        None => reports.iter().any(|r| r.is_available()),
    };
    if !usable {
        std::process::exit(2);
    }
    Ok(())
}
