// ABOUTME: Worker error type and the tagged outcome of a flow run
// ABOUTME: Decides which failures the queue layer may retry

use flowbox_builder::BuildError;
use flowbox_core::ExecutionOutputStatus;
use flowbox_sandbox::PoolError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::collaborators::{CollaboratorError, EngineError};
use crate::lock::LockError;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Build failed: {0}")]
    Build(#[from] BuildError),

    #[error("Build lock error: {0}")]
    LockTimeout(#[from] LockError),

    #[error("Flow execution timed out after {0:?}")]
    ExecutionTimeout(Duration),

    #[error("Execution output is too large ({size} bytes), maximum size is {max} bytes")]
    OutputTooLarge {
        size: usize,
        max: usize,
        tasks: u32,
        tags: Vec<String>,
    },

    #[error("Sandbox error: {0}")]
    Sandbox(#[from] PoolError),

    #[error("Engine error: {0}")]
    Engine(EngineError),

    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<EngineError> for WorkerError {
    fn from(error: EngineError) -> Self {
        match error {
            EngineError::Timeout(timeout) => Self::ExecutionTimeout(timeout),
            other => Self::Engine(other),
        }
    }
}

impl WorkerError {
    /// Whether re-dispatching the job can succeed
    pub fn is_retriable(&self) -> bool {
        !matches!(
            self,
            Self::Validation(_)
                | Self::OutputTooLarge { .. }
                | Self::Build(BuildError::UnsafePath(_))
        )
    }
}

pub type Result<T> = std::result::Result<T, WorkerError>;

/// How a flow run ended, when the worker handled it without re-raising
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    Finished {
        status: ExecutionOutputStatus,
        tasks: u32,
    },
    Paused,
    TimedOut,
    OutputRejected,
}
