//! One complete simulation of a workload under one policy

use gpusched_core::{build_gpus, GpuSchedResult, PolicyKind, SchedulerConfig, Task, TraceEvent};
use gpusched_scheduler::build_scheduler;

use crate::engine::{Engine, RunSummary};
use crate::metrics::{summarize, Metrics};
use crate::sink::{EventSink, MemorySink};

/// GPU pool description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterSpec {
    pub gpus: u32,
    pub gpu_mem: u64,
}

/// Everything a finished run produced
pub struct RunOutput<S> {
    pub summary: RunSummary,
    pub metrics: Metrics,
    pub trace: Vec<TraceEvent>,
    /// The caller's sink, handed back so it can be closed
    pub sink: S,
}

/// Simulate `tasks` on a fresh cluster, feeding the trace to `sink` as well
pub fn simulate<S: EventSink>(
    policy: PolicyKind,
    config: SchedulerConfig,
    cluster: ClusterSpec,
    tasks: &[Task],
    sink: S,
) -> GpuSchedResult<RunOutput<S>> {
    let gpus = build_gpus(cluster.gpus, cluster.gpu_mem);
    let mut engine = Engine::new(
        gpus.clone(),
        build_scheduler(policy, config),
        (MemorySink::new(), sink),
    );
    engine.submit_all(tasks.iter().cloned())?;

    let summary = engine.run()?;
    let (memory, sink) = engine.into_sink();
    let trace = memory.into_events();
    let metrics = summarize(&trace, tasks, &gpus)?;

    Ok(RunOutput {
        summary,
        metrics,
        trace,
        sink,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::NullSink;
    use gpusched_core::TaskId;

    #[test]
    fn test_simulate_collects_trace_and_metrics() {
        let tasks = vec![
            Task::new(TaskId(0), 1, 0.0, 20, 10.0).unwrap(),
            Task::new(TaskId(1), 1, 1.0, 4, 2.0).unwrap(),
        ];
        let cluster = ClusterSpec { gpus: 1, gpu_mem: 24 };

        let output = simulate(
            PolicyKind::MemoryAware,
            SchedulerConfig::default(),
            cluster,
            &tasks,
            NullSink,
        )
        .unwrap();

        assert_eq!(output.trace.len(), 2);
        assert_eq!(output.summary.completed, 2);
        assert_eq!(output.metrics.completed_tasks, 2.0);
        assert_eq!(output.metrics.avg_wait_time, 0.0);
    }

    #[test]
    fn test_simulate_with_very_large_gpus() {
        let tasks = vec![Task::new(TaskId(0), 1, 0.0, 20, 5.0).unwrap()];
        let cluster = ClusterSpec {
            gpus: 2,
            gpu_mem: u64::MAX,
        };

        let output = simulate(
            PolicyKind::MemoryAware,
            SchedulerConfig::default(),
            cluster,
            &tasks,
            NullSink,
        )
        .unwrap();

        assert_eq!(output.summary.completed, 1);
        assert!(output.metrics.utilization >= 0.0 && output.metrics.utilization <= 1.0);
    }
}
