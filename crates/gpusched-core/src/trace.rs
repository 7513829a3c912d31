//! Trace records emitted by the engine, one per scheduling decision

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::gpu::GpuId;
use crate::task::{SimTime, TaskId};

/// Why a task was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Declared memory exceeds every GPU's total capacity
    ExceedsGpuCapacity,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::ExceedsGpuCapacity => write!(f, "exceeds_gpu_capacity"),
        }
    }
}

/// A trace record
///
/// Serialized with a `type` tag; the remaining fields depend on the tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TraceEvent {
    Dispatch {
        task_id: TaskId,
        timestamp: SimTime,
        gpu_id: GpuId,
        wait_time: SimTime,
    },
    Defer {
        task_id: TaskId,
        timestamp: SimTime,
        wait_time: SimTime,
    },
    Reject {
        task_id: TaskId,
        timestamp: SimTime,
        reason: RejectReason,
    },
}

impl TraceEvent {
    pub fn task_id(&self) -> TaskId {
        match self {
            TraceEvent::Dispatch { task_id, .. }
            | TraceEvent::Defer { task_id, .. }
            | TraceEvent::Reject { task_id, .. } => *task_id,
        }
    }

    pub fn timestamp(&self) -> SimTime {
        match self {
            TraceEvent::Dispatch { timestamp, .. }
            | TraceEvent::Defer { timestamp, .. }
            | TraceEvent::Reject { timestamp, .. } => *timestamp,
        }
    }

    /// Short name of the record type
    pub fn kind(&self) -> &'static str {
        match self {
            TraceEvent::Dispatch { .. } => "dispatch",
            TraceEvent::Defer { .. } => "defer",
            TraceEvent::Reject { .. } => "reject",
        }
    }
}
