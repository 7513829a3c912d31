//! gpusched-scheduler: admission and ordering policies
//!
//! This crate decides, for a snapshot of pending tasks and GPU states,
//! which tasks start now, which wait, and which can never run:
//! - FIFO baseline with head-of-line blocking
//! - Memory-aware policy with short-task preference and aging
//! - First-fit and best-fit GPU placement

pub mod decision;
pub mod fifo;
pub mod ledger;
pub mod memory_aware;
pub mod placement;
pub mod scheduler;

pub use decision::{Action, Decision};
pub use fifo::FifoScheduler;
pub use ledger::MemoryLedger;
pub use memory_aware::{MemoryAwareScheduler, PriorityTier};
pub use placement::{BestFit, FirstFit, PlacementStrategy};
pub use scheduler::{build_scheduler, Scheduler};
