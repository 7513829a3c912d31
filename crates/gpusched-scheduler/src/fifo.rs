//! Strict arrival-order baseline

use gpusched_core::{GpuSchedResult, GpuState, SimTime, Task};
use tracing::debug;

use crate::decision::Decision;
use crate::ledger::MemoryLedger;
use crate::placement::{FirstFit, PlacementStrategy};
use crate::scheduler::{admit, Scheduler};

/// First-come first-served with head-of-line blocking
///
/// Tasks are walked in arrival order and placed first-fit. The first task
/// that does not fit stops the walk: it and everything behind it is
/// deferred, even if a later task would fit.
pub struct FifoScheduler {
    placement: FirstFit,
}

impl FifoScheduler {
    pub fn new() -> Self {
        Self { placement: FirstFit }
    }
}

impl Default for FifoScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for FifoScheduler {
    fn name(&self) -> &'static str {
        "fifo"
    }

    fn decide(
        &self,
        pending: &[Task],
        gpus: &[GpuState],
        now: SimTime,
    ) -> GpuSchedResult<Vec<Decision>> {
        let (mut decisions, mut queue) = admit(pending, gpus)?;
        queue.sort_by(|a, b| {
            a.arrival_time
                .total_cmp(&b.arrival_time)
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut ledger = MemoryLedger::new(gpus);
        let mut blocked = false;

        for task in queue {
            if !blocked {
                if let Some(gpu_id) = self.placement.place(task.estimated_memory, &ledger) {
                    ledger.allocate(gpu_id, task.estimated_memory)?;
                    decisions.push(Decision::dispatch(task.id, gpu_id));
                    continue;
                }
                debug!(task = %task.id, now, "Head of queue does not fit, blocking");
                blocked = true;
            }
            decisions.push(Decision::defer(task.id));
        }

        Ok(decisions)
    }
}
