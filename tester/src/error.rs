//! Harness error types

use shared::SharedError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Timed out after {waited:?} waiting for {condition} ({attempts} attempts)")]
    TimedOut {
        condition: String,
        waited: Duration,
        attempts: u32,
    },

    #[error("Invalid poll condition '{condition}': {reason}")]
    InvalidPoll { condition: String, reason: String },

    #[error("Failed to spawn `{command}`: {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited during startup with {status}")]
    ServiceExited { command: String, status: String },

    #[error("Binary '{name}' not found on PATH")]
    BinaryNotFound { name: String },

    #[error("Workspace error on {path}: {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Storage operation {operation} failed on {path}: {source}")]
    Storage {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Object store {operation} failed for {target}: {message}")]
    ObjectStore {
        operation: &'static str,
        target: String,
        message: String,
    },

    #[error("Invalid storage location '{location}': {reason}")]
    InvalidLocation { location: String, reason: String },

    #[error("Container runtime error: {message}")]
    ContainerRuntime { message: String },

    #[error("Suite is {state}, cannot {action}")]
    SuiteState { state: String, action: String },

    #[error("Suite interrupted by {signal}")]
    Interrupted { signal: String },

    #[error("Scenario '{name}' failed: {reason}")]
    ScenarioFailed { name: String, reason: String },

    #[error("Shared component error: {0}")]
    Shared(#[from] SharedError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl HarnessError {
    pub fn object_store(operation: &'static str, target: impl Into<String>, err: impl std::fmt::Display) -> Self {
        HarnessError::ObjectStore {
            operation,
            target: target.into(),
            message: err.to_string(),
        }
    }

    pub fn invalid_location(location: impl ToString, reason: impl Into<String>) -> Self {
        HarnessError::InvalidLocation {
            location: location.to_string(),
            reason: reason.into(),
        }
    }

    /// True for the error the poll evaluator raises on an exhausted budget
    pub fn is_timeout(&self) -> bool {
        matches!(self, HarnessError::TimedOut { .. })
    }
}

pub type HarnessResult<T> = Result<T, HarnessError>;
