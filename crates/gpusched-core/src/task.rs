//! Task type definitions

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{GpuSchedError, GpuSchedResult};
use crate::gpu::GpuId;

/// Simulated clock value, in seconds
pub type SimTime = f64;

/// Task identifier, rendered as `t<N>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = GpuSchedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix('t')
            .and_then(|n| n.parse().ok())
            .map(TaskId)
            .ok_or_else(|| GpuSchedError::Serialization(format!("Invalid task id: {}", s)))
    }
}

impl Serialize for TaskId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Coarse runtime bucket used for ranking
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationClass {
    Short,
    Long,
}

impl DurationClass {
    /// Short when the duration does not exceed the threshold
    pub fn classify(duration: SimTime, short_threshold: SimTime) -> Self {
        if duration <= short_threshold {
            DurationClass::Short
        } else {
            DurationClass::Long
        }
    }
}

impl fmt::Display for DurationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DurationClass::Short => write!(f, "short"),
            DurationClass::Long => write!(f, "long"),
        }
    }
}

/// Task lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Waiting in the pending set
    #[default]
    Pending,
    /// Dispatched onto a GPU
    Running,
    /// Finished and released its memory
    Completed,
    /// Can never be satisfied
    Rejected,
}

impl TaskStatus {
    /// Whether the task has reached a final state
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Rejected)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "Pending"),
            TaskStatus::Running => write!(f, "Running"),
            TaskStatus::Completed => write!(f, "Completed"),
            TaskStatus::Rejected => write!(f, "Rejected"),
        }
    }
}

/// A unit of GPU-bound work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier
    pub id: TaskId,
    /// Submitting user
    pub user_id: u32,
    /// Clock value when the task arrived
    pub arrival_time: SimTime,
    /// Declared GPU memory, held for the whole run
    pub estimated_memory: u64,
    /// Simulated run length
    pub duration: SimTime,
    /// Current status
    #[serde(default)]
    pub status: TaskStatus,
    /// Time the task was dispatched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatch_time: Option<SimTime>,
    /// GPU the task runs on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu_id: Option<GpuId>,
}

impl Task {
    /// Create a validated pending task
    pub fn new(
        id: TaskId,
        user_id: u32,
        arrival_time: SimTime,
        estimated_memory: u64,
        duration: SimTime,
    ) -> GpuSchedResult<Self> {
        let task = Self {
            id,
            user_id,
            arrival_time,
            estimated_memory,
            duration,
            status: TaskStatus::Pending,
            dispatch_time: None,
            gpu_id: None,
        };
        task.validate()?;
        Ok(task)
    }

    /// Check the declared attributes
    pub fn validate(&self) -> GpuSchedResult<()> {
        if self.estimated_memory == 0 {
            return Err(GpuSchedError::invalid_task(
                self.id,
                "estimated memory must be positive",
            ));
        }
        if !self.duration.is_finite() || self.duration <= 0.0 {
            return Err(GpuSchedError::invalid_task(
                self.id,
                format!("duration must be positive, got {}", self.duration),
            ));
        }
        if !self.arrival_time.is_finite() || self.arrival_time < 0.0 {
            return Err(GpuSchedError::invalid_task(
                self.id,
                format!("arrival time must be non-negative, got {}", self.arrival_time),
            ));
        }
        Ok(())
    }

    /// Duration bucket for the given threshold
    pub fn duration_class(&self, short_threshold: SimTime) -> DurationClass {
        DurationClass::classify(self.duration, short_threshold)
    }

    /// Time spent waiting: up to dispatch once dispatched, else up to `now`
    pub fn wait_time(&self, now: SimTime) -> SimTime {
        let until = self.dispatch_time.unwrap_or(now);
        (until - self.arrival_time).max(0.0)
    }

    /// Completion time for a dispatched task
    pub fn end_time(&self) -> Option<SimTime> {
        self.dispatch_time.map(|t| t + self.duration)
    }

    /// Pending -> Running
    pub fn mark_running(&mut self, gpu_id: GpuId, now: SimTime) -> GpuSchedResult<()> {
        self.transition(TaskStatus::Pending, TaskStatus::Running)?;
        self.dispatch_time = Some(now);
        self.gpu_id = Some(gpu_id);
        Ok(())
    }

    /// Running -> Completed
    pub fn mark_completed(&mut self) -> GpuSchedResult<()> {
        self.transition(TaskStatus::Running, TaskStatus::Completed)
    }

    /// Pending -> Rejected
    pub fn mark_rejected(&mut self) -> GpuSchedResult<()> {
        self.transition(TaskStatus::Pending, TaskStatus::Rejected)
    }

    fn transition(&mut self, expected: TaskStatus, next: TaskStatus) -> GpuSchedResult<()> {
        if self.status != expected {
            return Err(GpuSchedError::InvalidTransition {
                task: self.id.to_string(),
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }
}
