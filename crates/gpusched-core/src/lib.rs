//! gpusched-core: Core types for the gpusched simulator
//!
//! This crate provides the fundamental types shared by the scheduler and the engine:
//! - Tasks, their lifecycle and duration classes
//! - Simulated GPUs and their memory accounting
//! - Trace records emitted per scheduling decision
//! - Configuration types
//! - Error handling

pub mod config;
pub mod error;
pub mod gpu;
pub mod task;
pub mod trace;

pub use config::*;
pub use error::*;
pub use gpu::*;
pub use task::*;
pub use trace::*;
