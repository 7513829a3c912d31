//! Scheduler contract and shared admission control

use gpusched_core::{
    max_capacity, GpuSchedError, GpuSchedResult, GpuState, PolicyKind, RejectReason,
    SchedulerConfig, SimTime, Task,
};

use crate::decision::Decision;
use crate::fifo::FifoScheduler;
use crate::memory_aware::MemoryAwareScheduler;

/// An admission and ordering policy
///
/// `decide` sees a snapshot of the pending set and the GPUs and returns
/// exactly one [`Decision`] per pending task: rejections first, then the
/// remaining tasks in the order the policy examined them. It never mutates
/// its inputs; the caller applies the decisions.
pub trait Scheduler: Send + Sync {
    /// Short policy name used in traces and reports
    fn name(&self) -> &'static str;

    /// Decide what to do with every pending task at time `now`
    fn decide(
        &self,
        pending: &[Task],
        gpus: &[GpuState],
        now: SimTime,
    ) -> GpuSchedResult<Vec<Decision>>;
}

/// Build the scheduler for a policy
pub fn build_scheduler(kind: PolicyKind, config: SchedulerConfig) -> Box<dyn Scheduler> {
    match kind {
        PolicyKind::Fifo => Box::new(FifoScheduler::new()),
        PolicyKind::MemoryAware => Box::new(MemoryAwareScheduler::new(config)),
    }
}

/// Split off tasks that can never fit on any GPU
///
/// Returns the reject decisions (in pending order) and the tasks that are
/// still admissible. Zero-memory tasks are a validation error.
pub(crate) fn admit<'a>(
    pending: &'a [Task],
    gpus: &[GpuState],
) -> GpuSchedResult<(Vec<Decision>, Vec<&'a Task>)> {
    let capacity = max_capacity(gpus);
    let mut rejected = Vec::new();
    let mut admissible = Vec::with_capacity(pending.len());

    for task in pending {
        if task.estimated_memory == 0 {
            return Err(GpuSchedError::InvalidTask {
                task: task.id.to_string(),
                reason: "estimated memory must be positive".to_string(),
            });
        }
        if task.estimated_memory > capacity {
            rejected.push(Decision::reject(task.id, RejectReason::ExceedsGpuCapacity));
        } else {
            admissible.push(task);
        }
    }

    Ok((rejected, admissible))
}
