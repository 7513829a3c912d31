//! Summary metrics derived from a finished trace

use gpusched_core::{GpuSchedError, GpuSchedResult, GpuState, SimTime, Task, TaskId, TraceEvent};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Summary of one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub completed_tasks: f64,
    pub avg_wait_time: f64,
    pub p95_wait_time: f64,
    pub avg_turnaround: f64,
    /// Completed tasks per simulated second
    pub throughput: f64,
    /// Time-averaged share of GPU memory in use
    pub utilization: f64,
    /// Population standard deviation of wait times
    pub fairness_wait_std: f64,
    /// Tasks rejected for exceeding every GPU's capacity
    pub oom_events: f64,
}

impl Metrics {
    /// Column names, in the order of [`Metrics::values`]
    pub const FIELDS: [&'static str; 8] = [
        "completed_tasks",
        "avg_wait_time",
        "p95_wait_time",
        "avg_turnaround",
        "throughput",
        "utilization",
        "fairness_wait_std",
        "oom_events",
    ];

    pub fn values(&self) -> [f64; 8] {
        [
            self.completed_tasks,
            self.avg_wait_time,
            self.p95_wait_time,
            self.avg_turnaround,
            self.throughput,
            self.utilization,
            self.fairness_wait_std,
            self.oom_events,
        ]
    }

    /// Field-wise mean; all zeros for an empty slice
    pub fn mean(runs: &[Metrics]) -> Metrics {
        if runs.is_empty() {
            return Metrics::default();
        }
        let n = runs.len() as f64;
        let avg = |f: fn(&Metrics) -> f64| runs.iter().map(f).sum::<f64>() / n;
        Metrics {
            completed_tasks: avg(|m| m.completed_tasks),
            avg_wait_time: avg(|m| m.avg_wait_time),
            p95_wait_time: avg(|m| m.p95_wait_time),
            avg_turnaround: avg(|m| m.avg_turnaround),
            throughput: avg(|m| m.throughput),
            utilization: avg(|m| m.utilization),
            fairness_wait_std: avg(|m| m.fairness_wait_std),
            oom_events: avg(|m| m.oom_events),
        }
    }
}

/// Compute metrics from a trace, the task table and the GPU capacities
///
/// Every dispatched task is assumed to run for its full duration, which holds
/// for any trace the engine produces from a drained run.
pub fn summarize(
    trace: &[TraceEvent],
    tasks: &[Task],
    gpus: &[GpuState],
) -> GpuSchedResult<Metrics> {
    let by_id: HashMap<TaskId, &Task> = tasks.iter().map(|t| (t.id, t)).collect();
    let lookup = |id: TaskId| {
        by_id
            .get(&id)
            .copied()
            .ok_or_else(|| GpuSchedError::UnknownTask(id.to_string()))
    };

    let mut waits = Vec::new();
    let mut turnaround_sum = 0.0;
    let mut busy_memory_time = 0.0;
    let mut latest_end: SimTime = 0.0;
    let mut oom_events = 0usize;

    for event in trace {
        match event {
            TraceEvent::Dispatch {
                task_id,
                timestamp,
                wait_time,
                ..
            } => {
                let task = lookup(*task_id)?;
                let end = timestamp + task.duration;
                waits.push(*wait_time);
                turnaround_sum += end - task.arrival_time;
                busy_memory_time += task.estimated_memory as f64 * task.duration;
                latest_end = latest_end.max(end);
            }
            TraceEvent::Reject { .. } => oom_events += 1,
            TraceEvent::Defer { .. } => {}
        }
    }

    if waits.is_empty() {
        return Ok(Metrics {
            oom_events: oom_events as f64,
            ..Metrics::default()
        });
    }

    let completed = waits.len() as f64;
    let avg_wait = waits.iter().sum::<f64>() / completed;
    let variance = waits.iter().map(|w| (w - avg_wait).powi(2)).sum::<f64>() / completed;

    let first_arrival = tasks
        .iter()
        .map(|t| t.arrival_time)
        .fold(SimTime::INFINITY, SimTime::min);
    let makespan = latest_end - first_arrival;
    // Summed as f64: total capacity can exceed u64::MAX
    let capacity: f64 = gpus.iter().map(|g| g.total_memory() as f64).sum();

    let (throughput, utilization) = if makespan > 0.0 {
        let utilization = if capacity > 0.0 {
            busy_memory_time / (capacity * makespan)
        } else {
            0.0
        };
        (completed / makespan, utilization)
    } else {
        (0.0, 0.0)
    };

    Ok(Metrics {
        completed_tasks: completed,
        avg_wait_time: avg_wait,
        p95_wait_time: percentile(&mut waits, 0.95),
        avg_turnaround: turnaround_sum / completed,
        throughput,
        utilization,
        fairness_wait_std: variance.sqrt(),
        oom_events: oom_events as f64,
    })
}

/// Nearest-rank percentile; sorts `values` in place
fn percentile(values: &mut [f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f64::total_cmp);
    let rank = (q * values.len() as f64).ceil() as usize;
    values[rank.clamp(1, values.len()) - 1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpusched_core::{build_gpus, GpuId, RejectReason};

    fn task(id: u64, arrival: f64, mem: u64, duration: f64) -> Task {
        Task::new(TaskId(id), 1, arrival, mem, duration).unwrap()
    }

    fn dispatch(id: u64, at: f64, wait: f64) -> TraceEvent {
        TraceEvent::Dispatch {
            task_id: TaskId(id),
            timestamp: at,
            gpu_id: GpuId(0),
            wait_time: wait,
        }
    }

    #[test]
    fn test_percentile_nearest_rank() {
        let mut values: Vec<f64> = (1..=20).map(f64::from).collect();
        assert_eq!(percentile(&mut values, 0.95), 19.0);
        assert_eq!(percentile(&mut [5.0], 0.95), 5.0);
        assert_eq!(percentile(&mut [], 0.95), 0.0);
    }

    #[test]
    fn test_summarize() {
        let tasks = vec![task(0, 0.0, 12, 10.0), task(1, 0.0, 12, 10.0), task(2, 0.0, 48, 1.0)];
        let trace = vec![
            TraceEvent::Reject {
                task_id: TaskId(2),
                timestamp: 0.0,
                reason: RejectReason::ExceedsGpuCapacity,
            },
            dispatch(0, 0.0, 0.0),
            TraceEvent::Defer {
                task_id: TaskId(1),
                timestamp: 0.0,
                wait_time: 0.0,
            },
            dispatch(1, 10.0, 10.0),
        ];
        let gpus = build_gpus(1, 24);

        let metrics = summarize(&trace, &tasks, &gpus).unwrap();
        assert_eq!(metrics.completed_tasks, 2.0);
        assert_eq!(metrics.avg_wait_time, 5.0);
        assert_eq!(metrics.p95_wait_time, 10.0);
        assert_eq!(metrics.avg_turnaround, 15.0);
        assert_eq!(metrics.throughput, 0.1);
        assert_eq!(metrics.utilization, 0.5);
        assert_eq!(metrics.fairness_wait_std, 5.0);
        assert_eq!(metrics.oom_events, 1.0);
    }

    #[test]
    fn test_summarize_huge_gpus() {
        let tasks = vec![task(0, 0.0, 20, 5.0)];
        let gpus = build_gpus(2, u64::MAX);

        let metrics = summarize(&[dispatch(0, 0.0, 0.0)], &tasks, &gpus).unwrap();
        assert_eq!(metrics.completed_tasks, 1.0);
        assert!(metrics.utilization > 0.0 && metrics.utilization < 1e-15);
    }

    #[test]
    fn test_summarize_empty() {
        let metrics = summarize(&[], &[], &build_gpus(2, 24)).unwrap();
        assert_eq!(metrics, Metrics::default());
    }

    #[test]
    fn test_unknown_task_in_trace() {
        let result = summarize(&[dispatch(9, 0.0, 0.0)], &[], &build_gpus(1, 24));
        assert!(matches!(result, Err(GpuSchedError::UnknownTask(_))));
    }

    #[test]
    fn test_mean() {
        let a = Metrics {
            completed_tasks: 2.0,
            oom_events: 1.0,
            ..Metrics::default()
        };
        let b = Metrics {
            completed_tasks: 4.0,
            ..Metrics::default()
        };
        let mean = Metrics::mean(&[a, b]);
        assert_eq!(mean.completed_tasks, 3.0);
        assert_eq!(mean.oom_events, 0.5);
        assert_eq!(Metrics::mean(&[]), Metrics::default());
    }
}
