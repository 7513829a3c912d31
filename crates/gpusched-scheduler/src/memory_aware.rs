//! Memory-aware policy with short-task preference and aging

use gpusched_core::{
    DurationClass, GpuSchedResult, GpuState, SchedulerConfig, SimTime, Task,
};
use std::cmp::Ordering;
use tracing::debug;

use crate::decision::Decision;
use crate::ledger::MemoryLedger;
use crate::placement::{BestFit, PlacementStrategy};
use crate::scheduler::{admit, Scheduler};

/// Ranking bucket, lower is considered first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PriorityTier {
    /// Waited longer than the aging threshold
    Aged,
    /// Short duration class
    Short,
    /// Long duration class
    Long,
}

/// Examines every pending task each cycle
///
/// Tasks are ranked by tier (aged, then short, then long) and by arrival
/// within a tier, then placed best-fit. A task that does not fit is deferred
/// and the walk continues, so smaller tasks behind it can still start.
pub struct MemoryAwareScheduler {
    config: SchedulerConfig,
    placement: BestFit,
}

impl MemoryAwareScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            placement: BestFit,
        }
    }

    /// Tier of a pending task at time `now`
    ///
    /// A task is aged once its wait strictly exceeds the threshold; aged
    /// tasks outrank every non-aged task regardless of duration class.
    pub fn tier(&self, task: &Task, now: SimTime) -> PriorityTier {
        if task.wait_time(now) > self.config.aging_threshold {
            return PriorityTier::Aged;
        }
        match task.duration_class(self.config.short_threshold) {
            DurationClass::Short => PriorityTier::Short,
            DurationClass::Long => PriorityTier::Long,
        }
    }

    fn compare(&self, a: &Task, b: &Task, now: SimTime) -> Ordering {
        self.tier(a, now)
            .cmp(&self.tier(b, now))
            .then_with(|| a.arrival_time.total_cmp(&b.arrival_time))
            .then_with(|| a.id.cmp(&b.id))
    }
}

impl Scheduler for MemoryAwareScheduler {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn decide(
        &self,
        pending: &[Task],
        gpus: &[GpuState],
        now: SimTime,
    ) -> GpuSchedResult<Vec<Decision>> {
        let (mut decisions, mut ranked) = admit(pending, gpus)?;
        ranked.sort_by(|a, b| self.compare(a, b, now));

        let mut ledger = MemoryLedger::new(gpus);

        for task in ranked {
            match self.placement.place(task.estimated_memory, &ledger) {
                Some(gpu_id) => {
                    ledger.allocate(gpu_id, task.estimated_memory)?;
                    decisions.push(Decision::dispatch(task.id, gpu_id));
                }
                None => {
                    debug!(
                        task = %task.id,
                        memory = task.estimated_memory,
                        tier = ?self.tier(task, now),
                        "No GPU fits, deferring"
                    );
                    decisions.push(Decision::defer(task.id));
                }
            }
        }

        Ok(decisions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpusched_core::{build_gpus, GpuId, RejectReason, TaskId};

    fn config() -> SchedulerConfig {
        SchedulerConfig {
            aging_threshold: 100.0,
            short_threshold: 60.0,
        }
    }

    fn task(id: u64, arrival: f64, mem: u64, duration: f64) -> Task {
        Task::new(TaskId(id), 1, arrival, mem, duration).unwrap()
    }

    #[test]
    fn test_tiers() {
        let scheduler = MemoryAwareScheduler::new(config());
        let short = task(0, 0.0, 8, 30.0);
        let long = task(1, 0.0, 8, 300.0);

        assert_eq!(scheduler.tier(&short, 10.0), PriorityTier::Short);
        assert_eq!(scheduler.tier(&long, 10.0), PriorityTier::Long);
        assert_eq!(scheduler.tier(&long, 100.0), PriorityTier::Long);
        assert_eq!(scheduler.tier(&long, 100.5), PriorityTier::Aged);
    }

    #[test]
    fn test_short_tasks_go_first() {
        let gpus = build_gpus(1, 24);
        let pending = vec![task(0, 0.0, 16, 300.0), task(1, 5.0, 16, 30.0)];

        let decisions = MemoryAwareScheduler::new(config())
            .decide(&pending, &gpus, 5.0)
            .unwrap();
        assert_eq!(
            decisions,
            vec![
                Decision::dispatch(TaskId(1), GpuId(0)),
                Decision::defer(TaskId(0)),
            ]
        );
    }

    #[test]
    fn test_aged_task_outranks_fresh_short_task() {
        let gpus = build_gpus(1, 24);
        let pending = vec![task(0, 0.0, 16, 300.0), task(1, 150.0, 16, 30.0)];

        let decisions = MemoryAwareScheduler::new(config())
            .decide(&pending, &gpus, 150.0)
            .unwrap();
        assert_eq!(decisions[0], Decision::dispatch(TaskId(0), GpuId(0)));
        assert_eq!(decisions[1], Decision::defer(TaskId(1)));
    }

    #[test]
    fn test_blocked_task_does_not_block_smaller_ones() {
        let mut gpus = build_gpus(1, 24);
        gpus[0].reserve(TaskId(9), 20).unwrap();
        let pending = vec![task(0, 0.0, 8, 30.0), task(1, 1.0, 4, 30.0)];

        let decisions = MemoryAwareScheduler::new(config())
            .decide(&pending, &gpus, 1.0)
            .unwrap();
        assert_eq!(
            decisions,
            vec![
                Decision::defer(TaskId(0)),
                Decision::dispatch(TaskId(1), GpuId(0)),
            ]
        );
    }

    #[test]
    fn test_best_fit_placement() {
        let mut gpus = build_gpus(2, 24);
        gpus[0].reserve(TaskId(9), 12).unwrap();

        let decisions = MemoryAwareScheduler::new(config())
            .decide(&[task(0, 0.0, 10, 30.0)], &gpus, 0.0)
            .unwrap();
        assert_eq!(decisions, vec![Decision::dispatch(TaskId(0), GpuId(0))]);
    }

    #[test]
    fn test_rejects_before_ranking() {
        let gpus = build_gpus(2, 24);
        let pending = vec![
            task(0, 0.0, 20, 5.0),
            task(1, 0.0, 4, 2.0),
            task(2, 0.0, 30, 1.0),
        ];

        let decisions = MemoryAwareScheduler::new(config())
            .decide(&pending, &gpus, 0.0)
            .unwrap();
        assert_eq!(
            decisions,
            vec![
                Decision::reject(TaskId(2), RejectReason::ExceedsGpuCapacity),
                Decision::dispatch(TaskId(0), GpuId(0)),
                // Exactly 4 left on gpu0, which is the tightest fit
                Decision::dispatch(TaskId(1), GpuId(0)),
            ]
        );
    }

    #[test]
    fn test_arrival_breaks_ties_within_tier() {
        let gpus = build_gpus(1, 24);
        let pending = vec![task(5, 2.0, 16, 30.0), task(4, 1.0, 16, 30.0)];

        let decisions = MemoryAwareScheduler::new(config())
            .decide(&pending, &gpus, 2.0)
            .unwrap();
        assert_eq!(decisions[0], Decision::dispatch(TaskId(4), GpuId(0)));
    }

    #[test]
    fn test_decide_is_pure() {
        let gpus = build_gpus(1, 24);
        let pending = vec![task(0, 0.0, 8, 30.0), task(1, 0.0, 20, 300.0)];
        let scheduler = MemoryAwareScheduler::new(config());

        let first = scheduler.decide(&pending, &gpus, 3.0).unwrap();
        let second = scheduler.decide(&pending, &gpus, 3.0).unwrap();
        assert_eq!(first, second);
        assert_eq!(gpus[0].used_memory(), 0);
    }
}
