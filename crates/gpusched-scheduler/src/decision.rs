//! Per-task scheduling outcomes

use gpusched_core::{GpuId, RejectReason, SimTime, Task, TaskId, TraceEvent};

/// What to do with one pending task this cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Start now on the given GPU
    Dispatch { gpu_id: GpuId },
    /// Leave pending and reconsider next cycle
    Defer,
    /// Terminal; the task can never run
    Reject { reason: RejectReason },
}

/// A decision for a single task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub task_id: TaskId,
    pub action: Action,
}

impl Decision {
    pub fn dispatch(task_id: TaskId, gpu_id: GpuId) -> Self {
        Self {
            task_id,
            action: Action::Dispatch { gpu_id },
        }
    }

    pub fn defer(task_id: TaskId) -> Self {
        Self {
            task_id,
            action: Action::Defer,
        }
    }

    pub fn reject(task_id: TaskId, reason: RejectReason) -> Self {
        Self {
            task_id,
            action: Action::Reject { reason },
        }
    }

    /// Trace record for this decision, given the task it applies to
    pub fn to_trace_event(&self, task: &Task, now: SimTime) -> TraceEvent {
        match self.action {
            Action::Dispatch { gpu_id } => TraceEvent::Dispatch {
                task_id: self.task_id,
                timestamp: now,
                gpu_id,
                wait_time: task.wait_time(now),
            },
            Action::Defer => TraceEvent::Defer {
                task_id: self.task_id,
                timestamp: now,
                wait_time: task.wait_time(now),
            },
            Action::Reject { reason } => TraceEvent::Reject {
                task_id: self.task_id,
                timestamp: now,
                reason,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_to_trace_event() {
        let task = Task::new(TaskId(3), 1, 2.0, 8, 10.0).unwrap();

        let event = Decision::dispatch(TaskId(3), GpuId(1)).to_trace_event(&task, 5.0);
        assert_eq!(
            event,
            TraceEvent::Dispatch {
                task_id: TaskId(3),
                timestamp: 5.0,
                gpu_id: GpuId(1),
                wait_time: 3.0,
            }
        );

        let event = Decision::defer(TaskId(3)).to_trace_event(&task, 4.0);
        assert!(matches!(event, TraceEvent::Defer { wait_time, .. } if wait_time == 2.0));

        let event = Decision::reject(TaskId(3), RejectReason::ExceedsGpuCapacity)
            .to_trace_event(&task, 2.0);
        assert_eq!(event.kind(), "reject");
    }
}
