//! gpusched-sim: Discrete-event simulation of GPU task admission
//!
//! This crate drives a scheduler forward in simulated time:
//! - Event queue and engine state machine
//! - Trace sinks (in-memory, JSONL file writer)
//! - Seeded synthetic workloads
//! - Metrics, multi-seed experiments and parameter sweeps

pub mod engine;
pub mod event_queue;
pub mod experiment;
pub mod metrics;
pub mod runner;
pub mod sink;
pub mod workload;

pub use engine::{Engine, EngineState, RunSummary};
pub use experiment::{run_experiment, run_sweep, ExperimentReport, ExperimentSpec, SweepRow};
pub use metrics::{summarize, Metrics};
pub use runner::{simulate, ClusterSpec, RunOutput};
pub use sink::{open_jsonl_writer, ChannelSink, EventSink, MemorySink, NullSink, WriterReport};
pub use workload::{load_workload, save_workload, WorkloadGenerator};
