//! Time-ordered queue of arrival and completion events

use gpusched_core::{GpuId, SimTime, TaskId};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Internal simulation events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEvent {
    /// A task enters the pending set
    Arrival { task_id: TaskId },
    /// A running task finishes and frees its GPU memory
    Completion { task_id: TaskId, gpu_id: GpuId },
}

#[derive(Debug, Clone)]
struct TimedEvent {
    time: SimTime,
    sequence: u64,
    event: SimEvent,
}

impl PartialEq for TimedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.sequence == other.sequence
    }
}

impl Eq for TimedEvent {}

impl PartialOrd for TimedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimedEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; earliest time, then insertion order, wins
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Min-heap of events keyed by (time, insertion sequence)
#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<TimedEvent>,
    next_sequence: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, time: SimTime, event: SimEvent) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(TimedEvent {
            time,
            sequence,
            event,
        });
    }

    /// Earliest scheduled time
    pub fn peek_time(&self) -> Option<SimTime> {
        self.heap.peek().map(|e| e.time)
    }

    /// Remove every event at the earliest timestamp, in insertion order
    pub fn pop_batch(&mut self) -> Option<(SimTime, Vec<SimEvent>)> {
        let first = self.heap.pop()?;
        let time = first.time;
        let mut batch = vec![first.event];
        while self.heap.peek().is_some_and(|e| e.time == time) {
            if let Some(next) = self.heap.pop() {
                batch.push(next.event);
            }
        }
        Some((time, batch))
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
