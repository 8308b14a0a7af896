// ABOUTME: Persists execution output as a run's log file
// ABOUTME: Enforces the size cap and strips last_step_state for non-paused runs

use flowbox_core::{ExecutionOutput, File};
use tracing::{debug, warn};

use crate::collaborators::FileService;
use crate::error::{Result, WorkerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogFileOptions {
    pub max_log_size: usize,
    pub strip_last_step_state: bool,
}

/// Serialize `output` for storage, rejecting anything above `max_log_size` bytes
pub fn encode_output(output: &mut ExecutionOutput, options: LogFileOptions) -> Result<Vec<u8>> {
    // last_step_state is only read back when resuming
    if options.strip_last_step_state && !output.is_paused() {
        output.execution_state.clear_last_step_state();
    }

    let data = serde_json::to_vec(output)?;
    if data.len() > options.max_log_size {
        warn!(
            "Execution output is too large: {} bytes, maximum size is {}",
            data.len(),
            options.max_log_size
        );
        return Err(WorkerError::OutputTooLarge {
            size: data.len(),
            max: options.max_log_size,
            tasks: output.tasks,
            tags: output.tags.clone(),
        });
    }

    Ok(data)
}

pub async fn save_log_file(
    files: &dyn FileService,
    file_id: Option<&str>,
    project_id: &str,
    output: &mut ExecutionOutput,
    options: LogFileOptions,
) -> Result<File> {
    let data = encode_output(output, options)?;
    let size = data.len();
    let file = files.save_file(file_id, project_id, data).await?;
    debug!("Saved log file {} ({} bytes)", file.id, size);
    Ok(file)
}
