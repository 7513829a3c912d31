//! CLI commands implementation

use anyhow::Result;
use gpusched_core::{PolicyKind, SimConfig};
use gpusched_sim::experiment::write_sweep_csv;
use gpusched_sim::runner;
use gpusched_sim::{
    load_workload, open_jsonl_writer, run_experiment, run_sweep, save_workload, ClusterSpec,
    ExperimentSpec, Metrics, NullSink, WorkloadGenerator,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::RunArgs;

/// Load the configuration file, or defaults when none is given
pub fn load_config(path: Option<&Path>) -> Result<SimConfig> {
    match path {
        Some(path) => Ok(SimConfig::from_file(path)?),
        None => Ok(SimConfig::default()),
    }
}

/// Apply command-line overrides on top of the file configuration
pub fn apply_overrides(mut config: SimConfig, run: &RunArgs) -> Result<SimConfig> {
    if let Some(tasks) = run.tasks {
        config.workload.tasks = tasks;
    }
    if let Some(users) = run.users {
        config.workload.users = users;
    }
    if let Some(mode) = &run.mode {
        config.workload.mode = mode.parse()?;
    }
    if let Some(gpus) = run.gpus {
        config.cluster.gpus = gpus;
    }
    if let Some(gpu_mem) = run.gpu_mem {
        config.cluster.gpu_mem = gpu_mem;
    }
    if let Some(aging) = run.aging_threshold {
        config.scheduler.aging_threshold = aging;
    }
    if let Some(short) = run.short_threshold {
        config.scheduler.short_threshold = short;
    }
    Ok(config)
}

fn cluster(config: &SimConfig) -> ClusterSpec {
    ClusterSpec {
        gpus: config.cluster.gpus,
        gpu_mem: config.cluster.gpu_mem,
    }
}

/// Trace file label: the workload file stem, or the generator seed
fn trace_label(config: &SimConfig) -> String {
    config
        .workload
        .file
        .as_deref()
        .and_then(Path::file_stem)
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("seed{}", config.workload.seed))
}

fn experiment_spec(config: &SimConfig, seeds: Vec<u64>) -> ExperimentSpec {
    ExperimentSpec {
        seeds,
        tasks: config.workload.tasks,
        users: config.workload.users,
        cluster: cluster(config),
        mode: config.workload.mode,
        scheduler: config.scheduler.thresholds(),
        policies: config.scheduler.policy.kinds(),
    }
}

/// Simulate one workload under each selected policy
pub async fn simulate(config: SimConfig) -> Result<()> {
    config.validate()?;

    let tasks = match &config.workload.file {
        Some(path) => load_workload(path)?,
        None => WorkloadGenerator::new(config.workload.seed).generate(
            config.workload.tasks,
            config.workload.users,
            config.workload.mode,
        )?,
    };
    info!(
        tasks = tasks.len(),
        gpus = config.cluster.gpus,
        gpu_mem = config.cluster.gpu_mem,
        "Workload ready"
    );

    let tasks = Arc::new(tasks);
    let cluster = cluster(&config);
    let thresholds = config.scheduler.thresholds();
    let label = trace_label(&config);
    let mut results = Vec::new();

    for policy in config.scheduler.policy.kinds() {
        let tasks = Arc::clone(&tasks);
        let metrics = match config.trace.labeled_trace_path(policy, &label) {
            Some(path) => {
                let (sink, writer) = open_jsonl_writer(&path).await?;
                let output = tokio::task::spawn_blocking(move || {
                    runner::simulate(policy, thresholds, cluster, &tasks, sink)
                })
                .await??;
                drop(output.sink);

                let report = writer.await?;
                if report.failed > 0 || output.summary.sink_errors > 0 {
                    warn!(
                        path = %path.display(),
                        failed = report.failed,
                        sink_errors = output.summary.sink_errors,
                        "Trace is incomplete"
                    );
                }
                println!("Trace written to {} ({} records)", path.display(), report.written);
                output.metrics
            }
            None => {
                tokio::task::spawn_blocking(move || {
                    runner::simulate(policy, thresholds, cluster, &tasks, NullSink)
                })
                .await??
                .metrics
            }
        };
        results.push((policy, metrics));
    }

    print_metrics(&results);
    Ok(())
}

/// Compare policies over several seeds
pub async fn experiment(
    config: SimConfig,
    seeds: Vec<u64>,
    out_csv: Option<PathBuf>,
    out_json: Option<PathBuf>,
) -> Result<()> {
    config.validate()?;
    let spec = experiment_spec(&config, seeds);
    let report = run_experiment(&spec).await?;

    println!(
        "Experiment {} ({} tasks, {} mode, {} x {}GB, seeds {:?})",
        report.id, report.tasks, report.mode, report.gpus, report.gpu_mem, report.seeds
    );
    println!();
    let results: Vec<(PolicyKind, Metrics)> = report
        .policies
        .iter()
        .map(|p| (p.policy, p.mean))
        .collect();
    print_metrics(&results);

    if let Some(path) = out_csv {
        report.write_csv(&path)?;
        println!("\nSaved {}", path.display());
    }
    if let Some(path) = out_json {
        std::fs::write(&path, serde_json::to_string_pretty(&report)?)?;
        println!("Saved {}", path.display());
    }

    Ok(())
}

/// Sweep thresholds for the memory-aware policy
pub async fn sweep(
    config: SimConfig,
    seeds: Vec<u64>,
    shorts: Vec<f64>,
    agings: Vec<f64>,
    out_csv: Option<PathBuf>,
) -> Result<()> {
    config.validate()?;
    if shorts.is_empty() || agings.is_empty() {
        anyhow::bail!("Sweep needs at least one short and one aging threshold");
    }

    let spec = experiment_spec(&config, seeds);
    let rows = run_sweep(&spec, &shorts, &agings).await?;

    println!(
        "{:>8} {:>8} {:>10} {:>10} {:>12} {:>12} {:>10}",
        "SHORT", "AGING", "AVG_WAIT", "P95_WAIT", "THROUGHPUT", "UTILIZATION", "WAIT_STD"
    );
    println!("{}", "-".repeat(76));
    for row in &rows {
        println!(
            "{:>8} {:>8} {:>10.2} {:>10.2} {:>12.4} {:>12.4} {:>10.2}",
            row.short_threshold,
            row.aging_threshold,
            row.metrics.avg_wait_time,
            row.metrics.p95_wait_time,
            row.metrics.throughput,
            row.metrics.utilization,
            row.metrics.fairness_wait_std
        );
    }

    if let Some(path) = out_csv {
        write_sweep_csv(&path, &rows)?;
        println!("\nSaved {}", path.display());
    }

    Ok(())
}

/// Generate a workload and save it
pub fn generate(config: SimConfig, output: PathBuf) -> Result<()> {
    config.validate()?;
    let tasks = WorkloadGenerator::new(config.workload.seed).generate(
        config.workload.tasks,
        config.workload.users,
        config.workload.mode,
    )?;
    save_workload(&output, &tasks)?;

    println!(
        "Generated {} tasks ({} mode, seed {}) to {}",
        tasks.len(),
        config.workload.mode,
        config.workload.seed,
        output.display()
    );
    Ok(())
}

/// Print one column per policy
fn print_metrics(results: &[(PolicyKind, Metrics)]) {
    if results.is_empty() {
        println!("No results");
        return;
    }

    print!("{:<20}", "METRIC");
    for (policy, _) in results {
        print!(" {:>12}", policy.to_string().to_uppercase());
    }
    println!();
    println!("{}", "-".repeat(20 + 13 * results.len()));

    for (i, field) in Metrics::FIELDS.iter().enumerate() {
        print!("{:<20}", field);
        for (_, metrics) in results {
            print!(" {:>12.4}", metrics.values()[i]);
        }
        println!();
    }
}
