//! Waitgraph Simulator CLI
//!
//! Runs scripted deadlock scenarios or a concurrent workload against the
//! allocation manager.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use waitgraph_manager::ManagerConfig;
use waitgraph_simulator::{Scenario, SimulatorConfig, WorkloadSimulator};

#[derive(Parser)]
#[command(name = "waitgraph-sim")]
#[command(about = "Deadlock detection simulator for the allocation manager")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a built-in scenario step by step
    Scenario {
        /// Scenario name (abba, ring, chain)
        name: String,

        /// Population for ring and chain
        #[arg(long, default_value = "4")]
        size: usize,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a concurrent workload with a background deadlock checker
    Run {
        /// TOML config file; flags below override its values
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of worker threads
        #[arg(long)]
        workers: Option<usize>,

        /// Number of shared resources
        #[arg(long)]
        resources: Option<usize>,

        /// Operations per worker
        #[arg(long)]
        ops_per_worker: Option<usize>,

        /// Checker interval in milliseconds
        #[arg(long)]
        check_interval_ms: Option<u64>,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Scenario { name, size, json } => {
            let scenario = Scenario::by_name(&name, size)?;
            let outcome = scenario.run(&ManagerConfig::default())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                outcome.print();
            }
        }

        Commands::Run {
            config,
            workers,
            resources,
            ops_per_worker,
            check_interval_ms,
            seed,
            json,
        } => {
            let mut config = match config {
                Some(path) => SimulatorConfig::load(path)?,
                None => SimulatorConfig::default(),
            };
            if let Some(workers) = workers {
                config.workers = workers;
            }
            if let Some(resources) = resources {
                config.resources = resources;
            }
            if let Some(ops) = ops_per_worker {
                config.ops_per_worker = ops;
            }
            if let Some(interval) = check_interval_ms {
                config.check_interval_ms = interval;
            }
            if let Some(seed) = seed {
                config.seed = seed;
            }

            let report = WorkloadSimulator::new(config).run()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                report.print();
            }
        }
    }

    Ok(())
}
