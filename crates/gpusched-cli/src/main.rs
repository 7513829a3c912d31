//! gpusched CLI
//!
//! Runs memory-aware and FIFO scheduling simulations from the command line.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// gpusched - memory-aware GPU task scheduling simulator
#[derive(Parser, Debug)]
#[command(name = "gpusched")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Workload and cluster overrides shared by every subcommand that simulates
#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Number of tasks
    #[arg(long)]
    tasks: Option<usize>,

    /// Number of submitting users
    #[arg(long)]
    users: Option<u32>,

    /// Workload mix (mixed, llm_heavy, vlm_heavy)
    #[arg(long)]
    mode: Option<String>,

    /// Number of GPUs
    #[arg(long)]
    gpus: Option<u32>,

    /// Memory per GPU (GB)
    #[arg(long)]
    gpu_mem: Option<u64>,

    /// Aging threshold (seconds)
    #[arg(long)]
    aging_threshold: Option<f64>,

    /// Short task threshold (seconds)
    #[arg(long)]
    short_threshold: Option<f64>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Simulate one workload under the selected policies
    Simulate {
        #[command(flatten)]
        run: RunArgs,

        /// Workload seed
        #[arg(long)]
        seed: Option<u64>,

        /// Policy (memory, fifo, both)
        #[arg(long)]
        policy: Option<String>,

        /// Load tasks from a JSON workload file instead of generating them
        #[arg(long)]
        workload: Option<PathBuf>,

        /// Directory for JSONL decision traces
        #[arg(long)]
        trace_dir: Option<PathBuf>,
    },

    /// Compare both policies over several seeds
    Experiment {
        #[command(flatten)]
        run: RunArgs,

        /// Seeds to run
        #[arg(long, value_delimiter = ',', default_value = "7,11,19,23,31")]
        seeds: Vec<u64>,

        /// Write mean metrics per policy as CSV
        #[arg(long)]
        out_csv: Option<PathBuf>,

        /// Write the full report as JSON
        #[arg(long)]
        out_json: Option<PathBuf>,
    },

    /// Sweep short and aging thresholds for the memory-aware policy
    Sweep {
        #[command(flatten)]
        run: RunArgs,

        /// Seeds to average over
        #[arg(long, value_delimiter = ',', default_value = "7,11,19")]
        seeds: Vec<u64>,

        /// Short task thresholds (seconds)
        #[arg(long, value_delimiter = ',', default_value = "30,60,90,120")]
        shorts: Vec<f64>,

        /// Aging thresholds (seconds)
        #[arg(long, value_delimiter = ',', default_value = "60,120,180,240,300")]
        agings: Vec<f64>,

        /// Write one row per grid point as CSV
        #[arg(long)]
        out_csv: Option<PathBuf>,
    },

    /// Generate a synthetic workload and save it as JSON
    Generate {
        /// Output file
        output: PathBuf,

        #[command(flatten)]
        run: RunArgs,

        /// Workload seed
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn parse_level(level: &str) -> anyhow::Result<Level> {
    level
        .parse::<Level>()
        .map_err(|_| anyhow::anyhow!("Invalid log level: {}", level))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = commands::load_config(cli.config.as_deref())?;

    // Initialize logging
    let level = cli
        .log_level
        .as_deref()
        .unwrap_or(config.logging.level.as_str());
    let subscriber = FmtSubscriber::builder()
        .with_max_level(parse_level(level)?)
        .with_target(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    match cli.command {
        Commands::Simulate {
            run,
            seed,
            policy,
            workload,
            trace_dir,
        } => {
            let mut config = commands::apply_overrides(config, &run)?;
            if let Some(seed) = seed {
                config.workload.seed = seed;
            }
            if let Some(policy) = policy {
                config.scheduler.policy = policy.parse()?;
            }
            if workload.is_some() {
                config.workload.file = workload;
            }
            if trace_dir.is_some() {
                config.trace.dir = trace_dir;
            }
            commands::simulate(config).await?;
        }
        Commands::Experiment {
            run,
            seeds,
            out_csv,
            out_json,
        } => {
            let config = commands::apply_overrides(config, &run)?;
            commands::experiment(config, seeds, out_csv, out_json).await?;
        }
        Commands::Sweep {
            run,
            seeds,
            shorts,
            agings,
            out_csv,
        } => {
            let config = commands::apply_overrides(config, &run)?;
            commands::sweep(config, seeds, shorts, agings, out_csv).await?;
        }
        Commands::Generate { output, run, seed } => {
            let mut config = commands::apply_overrides(config, &run)?;
            if let Some(seed) = seed {
                config.workload.seed = seed;
            }
            commands::generate(config, output)?;
        }
    }

    Ok(())
}
