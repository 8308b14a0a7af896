// ABOUTME: Execution-side domain types: run output, pause metadata, flow runs and job data
// ABOUTME: Also defines the input handed to the engine for BEGIN and RESUME executions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{FileId, FlowRunId, FlowVersion, FlowVersionId, ProjectId};

/// Status reported by the engine and recorded on the flow run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionOutputStatus {
    Running,
    Succeeded,
    Failed,
    Paused,
    Stopped,
    Timeout,
    InternalError,
}

impl ExecutionOutputStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Paused => "PAUSED",
            Self::Stopped => "STOPPED",
            Self::Timeout => "TIMEOUT",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for ExecutionOutputStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionState {
    #[serde(default)]
    pub steps: Map<String, Value>,
    #[serde(default)]
    pub last_step_state: Map<String, Value>,
}

impl ExecutionState {
    pub fn clear_last_step_state(&mut self) {
        self.last_step_state.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PauseType {
    Delay,
    Webhook,
    UserResponse,
}

/// Saved when a run suspends; required to resume it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PauseMetadata {
    #[serde(rename = "type")]
    pub pause_type: PauseType,
    #[serde(default)]
    pub resume_step_metadata: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_date_time: Option<DateTime<Utc>>,
    /// Prompt shown when waiting for a user response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutput {
    pub status: ExecutionOutputStatus,
    #[serde(default)]
    pub tasks: u32,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub execution_state: ExecutionState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pause_metadata: Option<PauseMetadata>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ExecutionOutput {
    pub fn is_paused(&self) -> bool {
        self.status == ExecutionOutputStatus::Paused
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionType {
    Begin,
    Resume,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepOutputStatus {
    Running,
    Succeeded,
    Failed,
    Paused,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutput {
    pub duration_ms: u64,
    pub input: Value,
    pub output: Value,
    pub status: StepOutputStatus,
}

impl StepOutput {
    /// Output of the trigger step wrapping the job payload
    pub fn trigger(payload: Value) -> Self {
        Self {
            duration_ms: 0,
            input: Value::Object(Map::new()),
            output: payload,
            status: StepOutputStatus::Succeeded,
        }
    }
}

/// How the engine should enter the flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "execution_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionMode {
    Begin,
    Resume {
        execution_state: ExecutionState,
        resume_step_metadata: Value,
        resume_payload: Value,
    },
}

/// Input handed to the engine runner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteFlowOperation {
    pub flow_version: FlowVersion,
    pub flow_run_id: FlowRunId,
    pub project_id: ProjectId,
    pub server_url: String,
    pub trigger_payload: StepOutput,
    pub mode: ExecutionMode,
}

impl ExecuteFlowOperation {
    pub fn execution_type(&self) -> ExecutionType {
        match self.mode {
            ExecutionMode::Begin => ExecutionType::Begin,
            ExecutionMode::Resume { .. } => ExecutionType::Resume,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRun {
    pub id: FlowRunId,
    pub project_id: ProjectId,
    pub flow_version_id: FlowVersionId,
    pub status: ExecutionOutputStatus,
    #[serde(default)]
    pub tasks: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs_file_id: Option<FileId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pause_metadata: Option<PauseMetadata>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct File {
    pub id: FileId,
    pub project_id: ProjectId,
    pub data: Vec<u8>,
}

/// A queued unit of work: one BEGIN or RESUME of a flow run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobData {
    pub project_id: ProjectId,
    pub flow_version_id: FlowVersionId,
    pub run_id: FlowRunId,
    pub execution_type: ExecutionType,
    #[serde(default)]
    pub payload: Value,
}
