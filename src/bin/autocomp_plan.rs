//! AutoComp planner
//!
//! Runs a rule set against a layer manifest on an in-memory graph and prints
//! the resulting graph as JSON, without a compositing application.
//!
//! ## Configuration
//!
//! Environment variables:
//! - `RUST_LOG`: Log level filter (default: autocomp=info)
//! - `LOG_FORMAT`: "json" for structured logs, "pretty" for terminals (default: pretty)
//!
//! Logs go to stderr, the plan goes to stdout.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin autocomp_plan -- lighting.json shot_010_manifest.json > plan.json
//! ```

use std::process::ExitCode;

use serde_json::json;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use autocomp::{graph_fingerprint, InMemoryGraph, LayerManifest, RuleSetConfig};

/// Initialize the tracing subscriber with JSON or pretty format
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "autocomp=info".into());

    if log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .flatten_event(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

fn run(rule_set_path: &str, manifest_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = RuleSetConfig::from_path(rule_set_path)?;
    let manifest = LayerManifest::from_path(manifest_path)?;
    info!(
        rule_set = %config.name,
        layers = manifest.layers.len(),
        root = %manifest.root,
        "Planning"
    );

    let mut graph = InMemoryGraph::new();
    manifest.register_sequences(&mut graph);
    let discovery = manifest.discovery();

    let mut mode = config.into_unpack_mode();
    mode.scan_layers(&discovery, &manifest.root, None);
    let report = mode.unpack(&mut graph, &discovery, &manifest.root)?;

    let plan = json!({
        "mode": mode.name(),
        "report": report,
        "fingerprint": graph_fingerprint(&graph)?,
        "graph": graph.snapshot(),
    });
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

fn main() -> ExitCode {
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [rule_set, manifest] = args.as_slice() else {
        eprintln!("usage: autocomp_plan <ruleset.json> <manifest.json>");
        return ExitCode::from(2);
    };

    match run(rule_set, manifest) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Planning failed");
            ExitCode::FAILURE
        }
    }
}
