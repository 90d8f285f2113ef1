// permgen CLI driver
// Reads extracted host metadata (JSON), runs validation + synthesis, and
// writes the dispatcher descriptions as JSON or a diagnostic listing.

use std::fs;
use std::io::Read;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

use permgen::emit::{CodeEmitter, JsonEmitter};
use permgen::model::PermissionHost;
use permgen::{synthesize_run, SynthConfig};

#[derive(Parser)]
#[command(name = "permgen")]
#[command(about = "Synthesize runtime-permission dispatchers from host metadata")]
#[command(version = "0.1.0")]
struct Args {
    /// Input file with one host description or an array of them
    /// (reads stdin when omitted)
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Pretty-print the emitted JSON
    #[arg(long)]
    pretty: bool,
}

fn read_hosts(input: Option<&PathBuf>) -> Result<Vec<PermissionHost>> {
    let content = match input {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            buf
        }
    };
    // Accept either a single host object or an array of hosts.
    if let Ok(hosts) = serde_json::from_str::<Vec<PermissionHost>>(&content) {
        return Ok(hosts);
    }
    let host: PermissionHost =
        serde_json::from_str(&content).context("input is not a host description")?;
    Ok(vec![host])
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let hosts = read_hosts(args.input.as_ref())?;
    if hosts.is_empty() {
        bail!("no hosts in input");
    }

    let outcomes = synthesize_run(&hosts, &SynthConfig::default());

    let writer: Box<dyn std::io::Write> = match &args.output {
        Some(path) => Box::new(
            fs::File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?,
        ),
        None => Box::new(std::io::stdout()),
    };
    let mut emitter = if args.pretty {
        JsonEmitter::pretty(writer)
    } else {
        JsonEmitter::new(writer)
    };

    let mut failed = 0usize;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(dispatcher) => emitter
                .emit(dispatcher)
                .with_context(|| format!("failed to emit dispatcher for {}", outcome.host))?,
            Err(errors) => {
                failed += 1;
                for error in errors {
                    eprintln!("{}: {}", outcome.host, error);
                }
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} host(s) rejected", outcomes.len());
    }
    Ok(())
}
