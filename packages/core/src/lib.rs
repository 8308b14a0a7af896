// ABOUTME: Core types, traits, and utilities for Flowbox
// ABOUTME: Foundational package describing flows, steps, runs and execution output

pub mod constants;
pub mod execution;
pub mod types;
pub mod utils;

// Re-export main types
pub use types::{
    CodeActionSettings, FileId, FlowId, FlowRunId, FlowStep, FlowVersion, FlowVersionId,
    FlowVersionState, PieceActionSettings, PieceRef, ProjectId, StepSettings, TriggerSettings,
    TriggerSource,
};

pub use execution::{
    ExecuteFlowOperation, ExecutionMode, ExecutionOutput, ExecutionOutputStatus, ExecutionState,
    ExecutionType, File, FlowRun, JobData, PauseMetadata, PauseType, StepOutput, StepOutputStatus,
};

// Re-export constants
pub use constants::{CODES_DIR, ID_LENGTH, MAX_LOG_SIZE};

// Re-export utilities
pub use utils::generate_id;
