//! Multi-seed experiments and parameter sweeps

use chrono::{DateTime, Utc};
use gpusched_core::{
    GpuSchedError, GpuSchedResult, PolicyKind, SchedulerConfig, SimTime, WorkloadMode,
};
use serde::Serialize;
use std::path::Path;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::metrics::Metrics;
use crate::runner::{simulate, ClusterSpec};
use crate::sink::NullSink;
use crate::workload::WorkloadGenerator;

/// Parameters shared by every run of an experiment
#[derive(Debug, Clone)]
pub struct ExperimentSpec {
    pub seeds: Vec<u64>,
    pub tasks: usize,
    pub users: u32,
    pub cluster: ClusterSpec,
    pub mode: WorkloadMode,
    pub scheduler: SchedulerConfig,
    pub policies: Vec<PolicyKind>,
}

impl ExperimentSpec {
    pub fn validate(&self) -> GpuSchedResult<()> {
        if self.seeds.is_empty() {
            return Err(GpuSchedError::Config("at least one seed is required".to_string()));
        }
        if self.policies.is_empty() {
            return Err(GpuSchedError::Config("at least one policy is required".to_string()));
        }
        if self.cluster.gpus == 0 || self.cluster.gpu_mem == 0 {
            return Err(GpuSchedError::Config(
                "cluster needs at least one GPU with memory".to_string(),
            ));
        }
        self.scheduler.validate()
    }
}

/// Metrics for one seed
#[derive(Debug, Clone, Serialize)]
pub struct SeedRun {
    pub seed: u64,
    pub metrics: Metrics,
}

/// Per-policy results, averaged over seeds
#[derive(Debug, Clone, Serialize)]
pub struct PolicySummary {
    pub policy: PolicyKind,
    pub mean: Metrics,
    pub runs: Vec<SeedRun>,
}

/// Result of a multi-seed experiment
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentReport {
    pub id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub mode: WorkloadMode,
    pub tasks: usize,
    pub gpus: u32,
    pub gpu_mem: u64,
    pub seeds: Vec<u64>,
    pub policies: Vec<PolicySummary>,
}

impl ExperimentReport {
    pub fn policy(&self, kind: PolicyKind) -> Option<&PolicySummary> {
        self.policies.iter().find(|p| p.policy == kind)
    }

    /// Write one row of mean metrics per policy
    pub fn write_csv(&self, path: &Path) -> GpuSchedResult<()> {
        let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
        let mut header = vec!["policy"];
        header.extend(Metrics::FIELDS);
        writer.write_record(&header).map_err(csv_error)?;

        for summary in &self.policies {
            let mut record = vec![summary.policy.to_string()];
            record.extend(summary.mean.values().iter().map(|v| v.to_string()));
            writer.write_record(&record).map_err(csv_error)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Generate the seed's workload and simulate it under one policy
pub fn run_seed(spec: &ExperimentSpec, policy: PolicyKind, seed: u64) -> GpuSchedResult<Metrics> {
    let tasks = WorkloadGenerator::new(seed).generate(spec.tasks, spec.users, spec.mode)?;
    let output = simulate(policy, spec.scheduler, spec.cluster, &tasks, NullSink)?;
    debug!(
        policy = %policy,
        seed,
        completed = output.summary.completed,
        "Seed finished"
    );
    Ok(output.metrics)
}

/// Run every (policy, seed) pair on the blocking pool and average per policy
///
/// Results are collected in seed order, so the report does not depend on
/// which run finishes first.
pub async fn run_experiment(spec: &ExperimentSpec) -> GpuSchedResult<ExperimentReport> {
    spec.validate()?;
    info!(
        seeds = ?spec.seeds,
        tasks = spec.tasks,
        mode = %spec.mode,
        "Starting experiment"
    );

    let mut policies = Vec::with_capacity(spec.policies.len());
    for &policy in &spec.policies {
        let handles: Vec<(u64, JoinHandle<GpuSchedResult<Metrics>>)> = spec
            .seeds
            .iter()
            .map(|&seed| {
                let spec = spec.clone();
                (
                    seed,
                    tokio::task::spawn_blocking(move || run_seed(&spec, policy, seed)),
                )
            })
            .collect();

        let mut runs = Vec::with_capacity(handles.len());
        for (seed, handle) in handles {
            let metrics = handle.await.map_err(join_error)??;
            runs.push(SeedRun { seed, metrics });
        }

        let per_seed: Vec<Metrics> = runs.iter().map(|r| r.metrics).collect();
        policies.push(PolicySummary {
            policy,
            mean: Metrics::mean(&per_seed),
            runs,
        });
    }

    Ok(ExperimentReport {
        id: Uuid::new_v4(),
        generated_at: Utc::now(),
        mode: spec.mode,
        tasks: spec.tasks,
        gpus: spec.cluster.gpus,
        gpu_mem: spec.cluster.gpu_mem,
        seeds: spec.seeds.clone(),
        policies,
    })
}

/// Mean metrics for one grid point of a sweep
#[derive(Debug, Clone, Serialize)]
pub struct SweepRow {
    pub short_threshold: SimTime,
    pub aging_threshold: SimTime,
    pub metrics: Metrics,
}

/// Run the memory-aware policy over every (short, aging) threshold pair
///
/// The scheduler settings and policy list in `base` are replaced per grid
/// point; everything else is shared.
pub async fn run_sweep(
    base: &ExperimentSpec,
    short_thresholds: &[SimTime],
    aging_thresholds: &[SimTime],
) -> GpuSchedResult<Vec<SweepRow>> {
    let mut rows = Vec::with_capacity(short_thresholds.len() * aging_thresholds.len());

    for &short_threshold in short_thresholds {
        for &aging_threshold in aging_thresholds {
            let spec = ExperimentSpec {
                scheduler: SchedulerConfig {
                    aging_threshold,
                    short_threshold,
                },
                policies: vec![PolicyKind::MemoryAware],
                ..base.clone()
            };
            let report = run_experiment(&spec).await?;
            let metrics = report
                .policy(PolicyKind::MemoryAware)
                .map(|p| p.mean)
                .unwrap_or_default();

            rows.push(SweepRow {
                short_threshold,
                aging_threshold,
                metrics,
            });
        }
    }

    Ok(rows)
}

/// Write sweep rows as CSV
pub fn write_sweep_csv(path: &Path, rows: &[SweepRow]) -> GpuSchedResult<()> {
    let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
    let mut header = vec!["short_threshold", "aging_threshold"];
    header.extend(Metrics::FIELDS);
    writer.write_record(&header).map_err(csv_error)?;

    for row in rows {
        let mut record = vec![row.short_threshold.to_string(), row.aging_threshold.to_string()];
        record.extend(row.metrics.values().iter().map(|v| v.to_string()));
        writer.write_record(&record).map_err(csv_error)?;
    }
    writer.flush()?;
    Ok(())
}

fn csv_error(err: csv::Error) -> GpuSchedError {
    GpuSchedError::Serialization(err.to_string())
}

fn join_error(err: tokio::task::JoinError) -> GpuSchedError {
    GpuSchedError::Internal(format!("simulation worker failed: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ExperimentSpec {
        ExperimentSpec {
            seeds: vec![7, 11],
            tasks: 40,
            users: 3,
            cluster: ClusterSpec { gpus: 2, gpu_mem: 24 },
            mode: WorkloadMode::Mixed,
            scheduler: SchedulerConfig::default(),
            policies: vec![PolicyKind::MemoryAware, PolicyKind::Fifo],
        }
    }

    #[tokio::test]
    async fn test_run_experiment() {
        let report = run_experiment(&spec()).await.unwrap();
        assert_eq!(report.policies.len(), 2);

        for summary in &report.policies {
            let seeds: Vec<u64> = summary.runs.iter().map(|r| r.seed).collect();
            assert_eq!(seeds, vec![7, 11]);
            // 24 GB GPUs fit every generated task
            assert_eq!(summary.mean.completed_tasks, 40.0);
            assert_eq!(summary.mean.oom_events, 0.0);
        }
    }

    #[tokio::test]
    async fn test_experiment_is_deterministic() {
        let first = run_experiment(&spec()).await.unwrap();
        let second = run_experiment(&spec()).await.unwrap();
        for kind in [PolicyKind::MemoryAware, PolicyKind::Fifo] {
            assert_eq!(
                first.policy(kind).unwrap().mean,
                second.policy(kind).unwrap().mean
            );
        }
    }

    #[tokio::test]
    async fn test_small_gpus_produce_oom_events() {
        let mut spec = spec();
        spec.cluster.gpu_mem = 12;
        spec.policies = vec![PolicyKind::Fifo];

        let report = run_experiment(&spec).await.unwrap();
        let summary = report.policy(PolicyKind::Fifo).unwrap();
        assert!(summary.mean.oom_events > 0.0);
        assert_eq!(
            summary.mean.oom_events + summary.mean.completed_tasks,
            40.0
        );
    }

    #[tokio::test]
    async fn test_invalid_spec() {
        let mut spec = spec();
        spec.seeds.clear();
        assert!(matches!(
            run_experiment(&spec).await,
            Err(GpuSchedError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_sweep_and_csv() {
        let mut base = spec();
        base.seeds = vec![7];
        let rows = run_sweep(&base, &[30.0, 60.0], &[120.0]).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].short_threshold, 60.0);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sweep.csv");
        write_sweep_csv(&path, &rows).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert!(lines
            .next()
            .unwrap()
            .starts_with("short_threshold,aging_threshold,completed_tasks"));
        assert_eq!(lines.count(), 2);
    }

    #[tokio::test]
    async fn test_report_csv() {
        let report = run_experiment(&spec()).await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("experiment.csv");
        report.write_csv(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("memory,"));
        assert!(lines[2].starts_with("fifo,"));
    }
}
