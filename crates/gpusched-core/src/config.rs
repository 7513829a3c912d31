//! Configuration types for gpusched

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{GpuSchedError, GpuSchedResult};
use crate::task::SimTime;

/// Top-level simulation configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Synthetic workload settings
    pub workload: WorkloadConfig,
    /// GPU pool settings
    pub cluster: ClusterConfig,
    /// Policy settings
    pub scheduler: SchedulerSection,
    /// Trace output settings
    pub trace: TraceConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl SimConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> GpuSchedResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GpuSchedError::Config(format!("Failed to read config file: {}", e))
        })?;
        toml::from_str(&content)
            .map_err(|e| GpuSchedError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Reject settings that cannot produce a meaningful run
    pub fn validate(&self) -> GpuSchedResult<()> {
        if self.workload.tasks == 0 {
            return Err(GpuSchedError::Config("tasks must be positive".to_string()));
        }
        if self.workload.users == 0 {
            return Err(GpuSchedError::Config("users must be positive".to_string()));
        }
        if self.cluster.gpus == 0 {
            return Err(GpuSchedError::Config("at least one GPU is required".to_string()));
        }
        if self.cluster.gpu_mem == 0 {
            return Err(GpuSchedError::Config("GPU memory must be positive".to_string()));
        }
        self.scheduler.thresholds().validate()
    }
}

/// Workload generation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    /// Number of tasks to generate
    pub tasks: usize,
    /// Number of distinct submitting users
    pub users: u32,
    /// Seed for the workload generator
    pub seed: u64,
    /// Task mix
    pub mode: WorkloadMode,
    /// Load tasks from this JSON file instead of generating them
    pub file: Option<PathBuf>,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            tasks: 100,
            users: 5,
            seed: 7,
            mode: WorkloadMode::Mixed,
            file: None,
        }
    }
}

/// Mix of short and long tasks in a synthetic workload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadMode {
    #[default]
    Mixed,
    LlmHeavy,
    VlmHeavy,
}

impl WorkloadMode {
    /// Probability that a generated task is long
    pub fn long_probability(&self) -> f64 {
        match self {
            WorkloadMode::Mixed => 0.4,
            WorkloadMode::LlmHeavy => 0.2,
            WorkloadMode::VlmHeavy => 0.8,
        }
    }
}

impl fmt::Display for WorkloadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkloadMode::Mixed => write!(f, "mixed"),
            WorkloadMode::LlmHeavy => write!(f, "llm_heavy"),
            WorkloadMode::VlmHeavy => write!(f, "vlm_heavy"),
        }
    }
}

impl FromStr for WorkloadMode {
    type Err = GpuSchedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mixed" => Ok(WorkloadMode::Mixed),
            "llm_heavy" => Ok(WorkloadMode::LlmHeavy),
            "vlm_heavy" => Ok(WorkloadMode::VlmHeavy),
            other => Err(GpuSchedError::Config(format!("Unknown workload mode: {}", other))),
        }
    }
}

/// GPU pool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Number of GPUs
    pub gpus: u32,
    /// Memory per GPU (GB)
    pub gpu_mem: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            gpus: 2,
            gpu_mem: 24,
        }
    }
}

/// A single admission policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PolicyKind {
    #[serde(rename = "fifo")]
    Fifo,
    #[serde(rename = "memory")]
    MemoryAware,
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyKind::Fifo => write!(f, "fifo"),
            PolicyKind::MemoryAware => write!(f, "memory"),
        }
    }
}

/// Which policies a run should execute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicySelection {
    Memory,
    Fifo,
    #[default]
    Both,
}

impl PolicySelection {
    /// Policies to run, memory-aware first
    pub fn kinds(&self) -> Vec<PolicyKind> {
        match self {
            PolicySelection::Memory => vec![PolicyKind::MemoryAware],
            PolicySelection::Fifo => vec![PolicyKind::Fifo],
            PolicySelection::Both => vec![PolicyKind::MemoryAware, PolicyKind::Fifo],
        }
    }
}

impl FromStr for PolicySelection {
    type Err = GpuSchedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(PolicySelection::Memory),
            "fifo" => Ok(PolicySelection::Fifo),
            "both" => Ok(PolicySelection::Both),
            other => Err(GpuSchedError::Config(format!("Unknown policy: {}", other))),
        }
    }
}

/// Policy section of the configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSection {
    /// Policy selector
    pub policy: PolicySelection,
    /// Wait time after which a task is promoted (seconds)
    pub aging_threshold: SimTime,
    /// Durations up to this value count as short (seconds)
    pub short_threshold: SimTime,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        let thresholds = SchedulerConfig::default();
        Self {
            policy: PolicySelection::Both,
            aging_threshold: thresholds.aging_threshold,
            short_threshold: thresholds.short_threshold,
        }
    }
}

impl SchedulerSection {
    pub fn thresholds(&self) -> SchedulerConfig {
        SchedulerConfig {
            aging_threshold: self.aging_threshold,
            short_threshold: self.short_threshold,
        }
    }
}

/// Tunables shared by the policies
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Wait time after which a task outranks every non-aged task
    pub aging_threshold: SimTime,
    /// Durations up to this value count as short
    pub short_threshold: SimTime,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            aging_threshold: 180.0,
            short_threshold: 60.0,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> GpuSchedResult<()> {
        if !self.aging_threshold.is_finite() || self.aging_threshold <= 0.0 {
            return Err(GpuSchedError::Config(format!(
                "aging threshold must be positive, got {}",
                self.aging_threshold
            )));
        }
        if !self.short_threshold.is_finite() || self.short_threshold <= 0.0 {
            return Err(GpuSchedError::Config(format!(
                "short threshold must be positive, got {}",
                self.short_threshold
            )));
        }
        Ok(())
    }
}

/// Trace output settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Directory for JSONL traces; no traces are written when unset
    pub dir: Option<PathBuf>,
}

impl TraceConfig {
    /// Trace file for one policy run over a generated workload
    pub fn trace_path(&self, policy: PolicyKind, seed: u64) -> Option<PathBuf> {
        self.labeled_trace_path(policy, &format!("seed{}", seed))
    }

    /// Trace file named `<policy>_<label>.jsonl`
    pub fn labeled_trace_path(&self, policy: PolicyKind, label: &str) -> Option<PathBuf> {
        self.dir
            .as_ref()
            .map(|dir| dir.join(format!("{}_{}.jsonl", policy, label)))
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
