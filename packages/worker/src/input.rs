// ABOUTME: Builds the engine input for BEGIN and RESUME executions
// ABOUTME: RESUME reloads the paused run's saved output and reuses its log file

use flowbox_core::{
    ExecuteFlowOperation, ExecutionMode, ExecutionOutput, ExecutionType, FileId, FlowVersion,
    JobData, StepOutput,
};
use tracing::debug;

use crate::collaborators::{FileService, FlowRunService};
use crate::error::{Result, WorkerError};

#[derive(Debug, Clone, PartialEq)]
pub struct PreparedInput {
    pub input: ExecuteFlowOperation,
    /// Log file to overwrite when persisting; None creates a new one
    pub log_file_id: Option<FileId>,
}

pub async fn load_input(
    flow_version: &FlowVersion,
    job: &JobData,
    server_url: &str,
    flow_runs: &dyn FlowRunService,
    files: &dyn FileService,
) -> Result<PreparedInput> {
    let base = |mode: ExecutionMode| ExecuteFlowOperation {
        flow_version: flow_version.clone(),
        flow_run_id: job.run_id.clone(),
        project_id: job.project_id.clone(),
        server_url: server_url.to_string(),
        trigger_payload: StepOutput::trigger(job.payload.clone()),
        mode,
    };

    if job.execution_type == ExecutionType::Begin {
        return Ok(PreparedInput {
            input: base(ExecutionMode::Begin),
            log_file_id: None,
        });
    }

    let flow_run = flow_runs.get_flow_run(&job.run_id, &job.project_id).await?;
    let (pause_metadata, logs_file_id) = match (flow_run.pause_metadata, flow_run.logs_file_id) {
        (Some(pause_metadata), Some(logs_file_id)) => (pause_metadata, logs_file_id),
        _ => {
            return Err(WorkerError::Validation(format!(
                "Flow run {} cannot be resumed without pause metadata and a log file",
                flow_run.id
            )))
        }
    };

    let log_file = files.get_file(&logs_file_id, &job.project_id).await?;
    let saved: ExecutionOutput = serde_json::from_slice(&log_file.data)?;
    debug!(
        "Resuming flow run {} from log file {} ({} steps)",
        job.run_id,
        log_file.id,
        saved.execution_state.steps.len()
    );

    Ok(PreparedInput {
        input: base(ExecutionMode::Resume {
            execution_state: saved.execution_state,
            resume_step_metadata: pause_metadata.resume_step_metadata,
            resume_payload: job.payload.clone(),
        }),
        log_file_id: Some(log_file.id),
    })
}
