// ABOUTME: Interfaces to the services a flow worker depends on
// ABOUTME: Flow versions, flow runs, files, piece installation and the execution engine

use async_trait::async_trait;
use flowbox_core::{
    ExecuteFlowOperation, ExecutionOutput, ExecutionOutputStatus, File, FileId, FlowRun,
    FlowRunId, FlowVersion, PauseMetadata, PieceRef,
};
use flowbox_sandbox::SandboxLease;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("{0}")]
    Failed(String),
}

impl CollaboratorError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Flow execution timed out after {0:?}")]
    Timeout(Duration),

    #[error("Engine failed: {0}")]
    Failed(String),

    #[error("Engine returned invalid output: {0}")]
    InvalidOutput(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinishRunRequest {
    pub flow_run_id: FlowRunId,
    pub status: ExecutionOutputStatus,
    pub tasks: u32,
    pub logs_file_id: Option<FileId>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PauseRunRequest {
    pub flow_run_id: FlowRunId,
    pub logs_file_id: FileId,
    pub pause_metadata: PauseMetadata,
}

#[async_trait]
pub trait FlowVersionService: Send + Sync {
    async fn get_flow_version(&self, id: &str) -> Result<FlowVersion, CollaboratorError>;

    /// Pin every piece referenced by the version to an exact version
    async fn lock_piece_versions(
        &self,
        project_id: &str,
        version: FlowVersion,
    ) -> Result<FlowVersion, CollaboratorError>;
}

#[async_trait]
pub trait FlowRunService: Send + Sync {
    async fn get_flow_run(&self, id: &str, project_id: &str) -> Result<FlowRun, CollaboratorError>;

    async fn finish_run(&self, request: FinishRunRequest) -> Result<(), CollaboratorError>;

    async fn pause_run(&self, request: PauseRunRequest) -> Result<(), CollaboratorError>;
}

#[async_trait]
pub trait FileService: Send + Sync {
    async fn get_file(&self, file_id: &str, project_id: &str) -> Result<File, CollaboratorError>;

    /// Create a file, or overwrite `file_id` when given
    async fn save_file(
        &self,
        file_id: Option<&str>,
        project_id: &str,
        data: Vec<u8>,
    ) -> Result<File, CollaboratorError>;
}

#[async_trait]
pub trait PieceInstaller: Send + Sync {
    async fn install(&self, path: &Path, pieces: &[PieceRef]) -> Result<(), CollaboratorError>;
}

/// Runs a prepared flow inside a sandbox.
///
/// Each built code step lives in `codes/<source_id>/index.js` and exports
/// `code(params)`, taking the step's JSON input and returning JSON output.
#[async_trait]
pub trait EngineRunner: Send + Sync {
    async fn execute_flow(
        &self,
        sandbox: &SandboxLease,
        input: &ExecuteFlowOperation,
    ) -> Result<ExecutionOutput, EngineError>;
}

/// The external services a worker talks to
#[derive(Clone)]
pub struct Collaborators {
    pub flow_versions: Arc<dyn FlowVersionService>,
    pub flow_runs: Arc<dyn FlowRunService>,
    pub files: Arc<dyn FileService>,
    pub pieces: Arc<dyn PieceInstaller>,
    pub engine: Arc<dyn EngineRunner>,
}
