//! Error types for gpusched

use thiserror::Error;

/// Main error type for gpusched
#[derive(Error, Debug)]
pub enum GpuSchedError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Task attributes failed validation
    #[error("Invalid task {task}: {reason}")]
    InvalidTask { task: String, reason: String },

    /// Task status moved backwards or skipped a state
    #[error("Invalid transition for task {task}: {from} -> {to}")]
    InvalidTransition {
        task: String,
        from: String,
        to: String,
    },

    /// Reservation would exceed GPU capacity
    #[error("Insufficient memory on {gpu}: requested {requested}, free {free}")]
    InsufficientMemory { gpu: String, requested: u64, free: u64 },

    /// Release of memory that was never reserved
    #[error("No reservation for task {task} on {gpu}")]
    UnknownReservation { gpu: String, task: String },

    /// Second reservation for the same task
    #[error("Task {task} already holds a reservation on {gpu}")]
    DuplicateReservation { gpu: String, task: String },

    /// Task not found
    #[error("Task not found: {0}")]
    UnknownTask(String),

    /// Operation not allowed in the current engine state
    #[error("Invalid engine state: {0}")]
    InvalidState(String),

    /// Event queue drained while tasks were still pending
    #[error("Simulation stalled at t={time} with {pending} pending tasks")]
    Stalled { time: f64, pending: usize },

    /// Event sink failure
    #[error("Sink error: {0}")]
    Sink(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for gpusched operations
pub type GpuSchedResult<T> = Result<T, GpuSchedError>;

impl GpuSchedError {
    pub(crate) fn invalid_task(task: impl ToString, reason: impl Into<String>) -> Self {
        GpuSchedError::InvalidTask {
            task: task.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for GpuSchedError {
    fn from(err: serde_json::Error) -> Self {
        GpuSchedError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for GpuSchedError {
    fn from(err: toml::de::Error) -> Self {
        GpuSchedError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GpuSchedError::Config("zero GPUs".to_string());
        assert_eq!(err.to_string(), "Configuration error: zero GPUs");

        let err = GpuSchedError::InsufficientMemory {
            gpu: "gpu0".to_string(),
            requested: 20,
            free: 4,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient memory on gpu0: requested 20, free 4"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: GpuSchedError = io_err.into();
        assert!(matches!(err, GpuSchedError::Io(_)));
    }
}
