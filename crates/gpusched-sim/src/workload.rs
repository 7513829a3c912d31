//! Seeded synthetic workloads and workload files

use gpusched_core::{GpuSchedError, GpuSchedResult, SimTime, Task, TaskId, WorkloadMode};
use rand::prelude::*;
use rand_distr::Exp;
use rand_pcg::Pcg64;
use std::path::Path;
use tracing::debug;

/// Mean time between arrivals (seconds)
pub const MEAN_INTER_ARRIVAL: SimTime = 8.0;

const LONG_DURATION: (SimTime, SimTime) = (120.0, 900.0);
const LONG_MEMORY: [u64; 4] = [14, 16, 20, 24];
const SHORT_DURATION: (SimTime, SimTime) = (10.0, 80.0);
const SHORT_MEMORY: [u64; 4] = [6, 8, 10, 12];

/// Generator of synthetic task sequences
///
/// All randomness comes from the generator's own seeded stream, so the same
/// seed always yields the same workload.
pub struct WorkloadGenerator {
    rand: Pcg64,
}

impl WorkloadGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rand: Pcg64::seed_from_u64(seed),
        }
    }

    /// Generate `count` tasks with exponential inter-arrival times
    pub fn generate(
        &mut self,
        count: usize,
        users: u32,
        mode: WorkloadMode,
    ) -> GpuSchedResult<Vec<Task>> {
        if users == 0 {
            return Err(GpuSchedError::Config("users must be positive".to_string()));
        }
        let inter_arrival = Exp::new(1.0 / MEAN_INTER_ARRIVAL)
            .map_err(|e| GpuSchedError::Config(format!("Invalid arrival rate: {}", e)))?;
        let long_probability = mode.long_probability();

        let mut now = 0.0;
        let mut tasks = Vec::with_capacity(count);
        for i in 0..count {
            now += inter_arrival.sample(&mut self.rand);

            let (duration, memory) = if self.rand.gen_bool(long_probability) {
                (
                    self.rand.gen_range(LONG_DURATION.0..LONG_DURATION.1),
                    LONG_MEMORY[self.rand.gen_range(0..LONG_MEMORY.len())],
                )
            } else {
                (
                    self.rand.gen_range(SHORT_DURATION.0..SHORT_DURATION.1),
                    SHORT_MEMORY[self.rand.gen_range(0..SHORT_MEMORY.len())],
                )
            };
            let user_id = self.rand.gen_range(1..=users);

            tasks.push(Task::new(TaskId(i as u64), user_id, now, memory, duration)?);
        }

        debug!(count, users, mode = %mode, "Generated workload");
        Ok(tasks)
    }
}

/// Write tasks as a JSON array
pub fn save_workload(path: &Path, tasks: &[Task]) -> GpuSchedResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let content = serde_json::to_string_pretty(tasks)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Read tasks from a JSON array, validating each one
///
/// Only the declared attributes are kept; any runtime state in the file is
/// discarded and every task starts pending.
pub fn load_workload(path: &Path) -> GpuSchedResult<Vec<Task>> {
    let content = std::fs::read_to_string(path)?;
    let raw: Vec<Task> = serde_json::from_str(&content)?;
    raw.into_iter()
        .map(|t| Task::new(t.id, t.user_id, t.arrival_time, t.estimated_memory, t.duration))
        .collect()
}
