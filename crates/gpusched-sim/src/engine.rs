//! Discrete-event simulation engine
//!
//! The engine owns simulated time, the event queue, the task table and the
//! GPU states. Each step drains every event at the earliest timestamp,
//! then asks the scheduler once for decisions on the whole pending set and
//! applies them, emitting one trace record per decision.

use gpusched_core::{GpuId, GpuSchedError, GpuSchedResult, GpuState, SimTime, Task, TaskId, TaskStatus};
use gpusched_scheduler::{Action, Decision, Scheduler};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::event_queue::{EventQueue, SimEvent};
use crate::sink::EventSink;

/// Lifecycle of one simulation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    /// Accepting tasks, no time has passed
    Initializing,
    /// Processing events
    Running,
    /// Event queue and pending set are both empty
    Drained,
}

/// Totals for a finished run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// Policy that made the decisions
    pub policy: String,
    /// Time of the last processed event
    pub final_time: SimTime,
    /// Tasks submitted
    pub tasks: usize,
    /// Tasks that ran to completion
    pub completed: usize,
    /// Tasks rejected as infeasible
    pub rejected: usize,
    /// Scheduler invocations
    pub cycles: u64,
    /// Trace records the sink failed to accept
    pub sink_errors: u64,
}

/// Simulation engine driving a [`Scheduler`] over simulated time
pub struct Engine<S: EventSink> {
    now: SimTime,
    state: EngineState,
    queue: EventQueue,
    tasks: BTreeMap<TaskId, Task>,
    /// Pending task ids in arrival-processing order
    pending: Vec<TaskId>,
    gpus: Vec<GpuState>,
    scheduler: Box<dyn Scheduler>,
    sink: S,
    cycles: u64,
    sink_errors: u64,
}

impl<S: EventSink> Engine<S> {
    /// Create an engine over the given GPUs
    pub fn new(gpus: Vec<GpuState>, scheduler: Box<dyn Scheduler>, sink: S) -> Self {
        Self {
            now: 0.0,
            state: EngineState::Initializing,
            queue: EventQueue::new(),
            tasks: BTreeMap::new(),
            pending: Vec::new(),
            gpus,
            scheduler,
            sink,
            cycles: 0,
            sink_errors: 0,
        }
    }

    /// Register a task and schedule its arrival
    pub fn submit(&mut self, task: Task) -> GpuSchedResult<()> {
        if self.state != EngineState::Initializing {
            return Err(GpuSchedError::InvalidState(format!(
                "cannot submit {} while {:?}",
                task.id, self.state
            )));
        }
        task.validate()?;
        if task.status != TaskStatus::Pending {
            return Err(GpuSchedError::InvalidTask {
                task: task.id.to_string(),
                reason: format!("submitted with status {}", task.status),
            });
        }
        if self.tasks.contains_key(&task.id) {
            return Err(GpuSchedError::InvalidTask {
                task: task.id.to_string(),
                reason: "duplicate task id".to_string(),
            });
        }

        self.queue.push(
            task.arrival_time,
            SimEvent::Arrival { task_id: task.id },
        );
        self.tasks.insert(task.id, task);
        Ok(())
    }

    /// Register a batch of tasks
    pub fn submit_all(&mut self, tasks: impl IntoIterator<Item = Task>) -> GpuSchedResult<()> {
        for task in tasks {
            self.submit(task)?;
        }
        Ok(())
    }

    /// Process every event at the next timestamp and run one scheduling cycle
    ///
    /// Returns the processed timestamp, or `None` once the run is drained.
    pub fn step(&mut self) -> GpuSchedResult<Option<SimTime>> {
        match self.state {
            EngineState::Drained => return Ok(None),
            EngineState::Initializing => {
                info!(
                    policy = self.scheduler.name(),
                    tasks = self.tasks.len(),
                    gpus = self.gpus.len(),
                    "Simulation started"
                );
                self.state = EngineState::Running;
            }
            EngineState::Running => {}
        }

        let Some((time, batch)) = self.queue.pop_batch() else {
            return self.finish_if_idle().map(|_| None);
        };
        self.now = time;

        for event in batch {
            self.apply_event(event)?;
        }

        if !self.pending.is_empty() {
            self.schedule()?;
        }

        self.check_conservation();
        self.finish_if_idle()?;
        Ok(Some(time))
    }

    /// Run until drained
    pub fn run(&mut self) -> GpuSchedResult<RunSummary> {
        while self.step()?.is_some() {}

        let summary = self.summary();
        info!(
            policy = %summary.policy,
            final_time = summary.final_time,
            completed = summary.completed,
            rejected = summary.rejected,
            cycles = summary.cycles,
            "Simulation drained"
        );
        Ok(summary)
    }

    /// Totals so far
    pub fn summary(&self) -> RunSummary {
        let count = |status: TaskStatus| self.tasks.values().filter(|t| t.status == status).count();
        RunSummary {
            policy: self.scheduler.name().to_string(),
            final_time: self.now,
            tasks: self.tasks.len(),
            completed: count(TaskStatus::Completed),
            rejected: count(TaskStatus::Rejected),
            cycles: self.cycles,
            sink_errors: self.sink_errors,
        }
    }

    pub fn now(&self) -> SimTime {
        self.now
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn gpus(&self) -> &[GpuState] {
        &self.gpus
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id)
    }

    /// Ids of pending tasks, in the order they arrived
    pub fn pending(&self) -> &[TaskId] {
        &self.pending
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn apply_event(&mut self, event: SimEvent) -> GpuSchedResult<()> {
        match event {
            SimEvent::Arrival { task_id } => {
                debug!(task = %task_id, now = self.now, "Task arrived");
                self.pending.push(task_id);
            }
            SimEvent::Completion { task_id, gpu_id } => {
                let freed = self.gpu_mut(gpu_id)?.release(task_id)?;
                self.task_mut(task_id)?.mark_completed()?;
                debug!(task = %task_id, gpu = %gpu_id, freed, now = self.now, "Task completed");
            }
        }
        Ok(())
    }

    fn schedule(&mut self) -> GpuSchedResult<()> {
        let snapshot: Vec<Task> = self
            .pending
            .iter()
            .filter_map(|id| self.tasks.get(id).cloned())
            .collect();

        let decisions = self.scheduler.decide(&snapshot, &self.gpus, self.now)?;
        self.cycles += 1;

        for decision in decisions {
            self.apply_decision(decision)?;
        }

        let tasks = &self.tasks;
        self.pending
            .retain(|id| tasks.get(id).is_some_and(|t| t.status == TaskStatus::Pending));
        Ok(())
    }

    fn apply_decision(&mut self, decision: Decision) -> GpuSchedResult<()> {
        let now = self.now;
        let task = self
            .tasks
            .get(&decision.task_id)
            .ok_or_else(|| GpuSchedError::UnknownTask(decision.task_id.to_string()))?;
        if task.status != TaskStatus::Pending {
            return Err(GpuSchedError::InvalidState(format!(
                "decision for {} which is {}",
                task.id, task.status
            )));
        }
        let (memory, duration) = (task.estimated_memory, task.duration);

        match decision.action {
            Action::Dispatch { gpu_id } => {
                self.gpu_mut(gpu_id)?.reserve(decision.task_id, memory)?;
                self.task_mut(decision.task_id)?.mark_running(gpu_id, now)?;
                self.queue.push(
                    now + duration,
                    SimEvent::Completion {
                        task_id: decision.task_id,
                        gpu_id,
                    },
                );
                debug!(task = %decision.task_id, gpu = %gpu_id, memory, now, "Task dispatched");
            }
            Action::Reject { reason } => {
                self.task_mut(decision.task_id)?.mark_rejected()?;
                debug!(task = %decision.task_id, %reason, memory, "Task rejected");
            }
            Action::Defer => {}
        }

        let task = self.task_mut(decision.task_id)?;
        let event = decision.to_trace_event(task, now);
        if let Err(e) = self.sink.record(&event) {
            self.sink_errors += 1;
            warn!(task = %decision.task_id, error = %e, "Failed to record trace event");
        }
        Ok(())
    }

    fn finish_if_idle(&mut self) -> GpuSchedResult<()> {
        if !self.queue.is_empty() {
            return Ok(());
        }
        if !self.pending.is_empty() {
            return Err(GpuSchedError::Stalled {
                time: self.now,
                pending: self.pending.len(),
            });
        }
        self.state = EngineState::Drained;
        Ok(())
    }

    fn check_conservation(&self) {
        for gpu in &self.gpus {
            debug_assert!(gpu.used_memory() <= gpu.total_memory());
            debug_assert_eq!(gpu.used_memory(), gpu.reserved_total());
        }
    }

    fn gpu_mut(&mut self, id: GpuId) -> GpuSchedResult<&mut GpuState> {
        self.gpus
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or_else(|| GpuSchedError::InvalidState(format!("unknown GPU {}", id)))
    }

    fn task_mut(&mut self, id: TaskId) -> GpuSchedResult<&mut Task> {
        self.tasks
            .get_mut(&id)
            .ok_or_else(|| GpuSchedError::UnknownTask(id.to_string()))
    }
}
