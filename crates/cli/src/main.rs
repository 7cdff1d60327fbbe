//! Cache coherence simulator CLI.
//!
//! This binary replays a memory reference trace through a system of private caches on a
//! snooping bus. It performs:
//! 1. **Configuration:** Built-in defaults, optionally a JSON config, then CLI overrides.
//! 2. **Run:** Load the trace, simulate until every processor drains, print statistics.
//! 3. **Report:** Text report (default) or JSON statistics and recorded violations.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cohsim_core::common::SimError;
use cohsim_core::config::{Config, ViolationPolicy};
use cohsim_core::protocol::ProtocolKind;
use cohsim_core::sim::{Simulator, load_trace};
use cohsim_core::stats::SimStats;

#[derive(Parser, Debug)]
#[command(
    name = "cohsim",
    author,
    version,
    about = "Snooping-bus cache coherence simulator",
    long_about = "Replay a memory reference trace through MSI or MESI caches on an atomic bus.\n\nTrace lines are `<cache> <LOAD|STORE> <address>`; `#` starts a comment.\n\nExamples:\n  cohsim run --trace traces/two_readers.trace\n  cohsim run --trace race.trace --protocol msi --caches 2 --check-invariants\n  cohsim run --trace race.trace --config sim.json --json"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a trace to completion and print statistics.
    Run {
        /// Memory reference trace to replay.
        #[arg(short, long)]
        trace: PathBuf,

        /// JSON configuration file; CLI flags override its values.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Coherence protocol.
        #[arg(short, long, value_enum)]
        protocol: Option<ProtocolArg>,

        /// Number of caches.
        #[arg(short, long)]
        caches: Option<usize>,

        /// Record protocol violations and keep running instead of aborting.
        #[arg(long)]
        collect_violations: bool,

        /// Verify the single-writer/multiple-reader invariant after every transaction.
        #[arg(long)]
        check_invariants: bool,

        /// Print statistics as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProtocolArg {
    Msi,
    Mesi,
}

impl From<ProtocolArg> for ProtocolKind {
    fn from(arg: ProtocolArg) -> Self {
        match arg {
            ProtocolArg::Msi => Self::Msi,
            ProtocolArg::Mesi => Self::Mesi,
        }
    }
}

/// JSON report written by `--json`.
#[derive(Serialize)]
struct Report<'a> {
    protocol: String,
    num_caches: usize,
    stats: &'a SimStats,
    violations: Vec<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run {
            trace,
            config,
            protocol,
            caches,
            collect_violations,
            check_invariants,
            json,
        } => cmd_run(
            &trace,
            config.as_deref(),
            Overrides {
                protocol,
                caches,
                collect_violations,
                check_invariants,
            },
            json,
        ),
    };

    if let Err(e) = result {
        eprintln!("[!] {e}");
        process::exit(1);
    }
}

/// Command-line values that take precedence over the configuration file.
struct Overrides {
    protocol: Option<ProtocolArg>,
    caches: Option<usize>,
    collect_violations: bool,
    check_invariants: bool,
}

impl Overrides {
    fn apply(self, config: &mut Config) {
        if let Some(protocol) = self.protocol {
            config.protocol = protocol.into();
        }
        if let Some(caches) = self.caches {
            config.num_caches = caches;
        }
        if self.collect_violations {
            config.violation_policy = ViolationPolicy::Collect;
        }
        if self.check_invariants {
            config.check_invariants = true;
        }
    }
}

/// Loads the configuration and trace, runs the simulation and prints the report.
///
/// # Arguments
///
/// * `trace` - Path to the memory reference trace.
/// * `config_path` - Optional JSON configuration file.
/// * `overrides` - CLI flags applied on top of the configuration.
/// * `json` - Print JSON instead of the text report.
fn cmd_run(
    trace: &Path,
    config_path: Option<&Path>,
    overrides: Overrides,
    json: bool,
) -> Result<(), SimError> {
    let mut config = match config_path {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    overrides.apply(&mut config);

    let mut sim = Simulator::new(&config)?;
    let refs = load_trace(trace, config.num_caches)?;
    info!(path = %trace.display(), refs = refs.len(), "trace loaded");
    sim.load_trace(refs)?;
    let _ = sim.run()?;

    if json {
        let report = Report {
            protocol: config.protocol.to_string(),
            num_caches: config.num_caches,
            stats: sim.stats(),
            violations: sim.violations().iter().map(ToString::to_string).collect(),
        };
        match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{text}"),
            Err(e) => eprintln!("[!] failed to serialize report: {e}"),
        }
    } else {
        println!(
            "Configuration: {} protocol, {} caches, violations {:?}",
            config.protocol, config.num_caches, config.violation_policy
        );
        println!("[*] Trace: {}", trace.display());
        println!();
        sim.stats().print();
        for violation in sim.violations() {
            println!("[!] {violation}");
        }
    }
    Ok(())
}
