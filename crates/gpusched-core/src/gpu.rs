//! Simulated GPU devices and their memory accounting

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{GpuSchedError, GpuSchedResult};
use crate::task::TaskId;

/// GPU identifier, rendered as `gpu<N>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GpuId(pub u32);

impl fmt::Display for GpuId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gpu{}", self.0)
    }
}

impl FromStr for GpuId {
    type Err = GpuSchedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix("gpu")
            .and_then(|n| n.parse().ok())
            .map(GpuId)
            .ok_or_else(|| GpuSchedError::Serialization(format!("Invalid GPU id: {}", s)))
    }
}

impl Serialize for GpuId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for GpuId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A GPU with a fixed memory budget
///
/// `used_memory` only grows through [`GpuState::reserve`] and only shrinks
/// through [`GpuState::release`] of the same task, so it always equals the
/// sum of the live reservations and never exceeds `total_memory`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpuState {
    /// Device identifier
    pub id: GpuId,
    /// Capacity, fixed at creation
    total_memory: u64,
    /// Memory held by running tasks
    used_memory: u64,
    /// Live reservations by task
    running: BTreeMap<TaskId, u64>,
}

impl GpuState {
    /// Create an idle GPU
    pub fn new(id: GpuId, total_memory: u64) -> Self {
        Self {
            id,
            total_memory,
            used_memory: 0,
            running: BTreeMap::new(),
        }
    }

    pub fn total_memory(&self) -> u64 {
        self.total_memory
    }

    pub fn used_memory(&self) -> u64 {
        self.used_memory
    }

    pub fn free_memory(&self) -> u64 {
        self.total_memory - self.used_memory
    }

    /// Tasks currently holding memory on this GPU
    pub fn running_tasks(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.running.keys().copied()
    }

    /// Sum of live reservations
    pub fn reserved_total(&self) -> u64 {
        self.running.values().sum()
    }

    /// Reserve memory for a dispatched task
    pub fn reserve(&mut self, task_id: TaskId, memory: u64) -> GpuSchedResult<()> {
        if self.running.contains_key(&task_id) {
            return Err(GpuSchedError::DuplicateReservation {
                gpu: self.id.to_string(),
                task: task_id.to_string(),
            });
        }
        if memory > self.free_memory() {
            return Err(GpuSchedError::InsufficientMemory {
                gpu: self.id.to_string(),
                requested: memory,
                free: self.free_memory(),
            });
        }
        self.running.insert(task_id, memory);
        self.used_memory += memory;
        Ok(())
    }

    /// Release the reservation held by a completed task
    ///
    /// Returns the amount freed, which is exactly what was reserved.
    pub fn release(&mut self, task_id: TaskId) -> GpuSchedResult<u64> {
        let memory = self
            .running
            .remove(&task_id)
            .ok_or_else(|| GpuSchedError::UnknownReservation {
                gpu: self.id.to_string(),
                task: task_id.to_string(),
            })?;
        self.used_memory -= memory;
        Ok(memory)
    }
}

/// Build `count` identical GPUs named `gpu0..`
pub fn build_gpus(count: u32, memory: u64) -> Vec<GpuState> {
    (0..count).map(|i| GpuState::new(GpuId(i), memory)).collect()
}

/// Largest capacity across the given GPUs, zero when there are none
pub fn max_capacity(gpus: &[GpuState]) -> u64 {
    gpus.iter().map(GpuState::total_memory).max().unwrap_or(0)
}
