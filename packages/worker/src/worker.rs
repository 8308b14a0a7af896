// ABOUTME: Flow-run orchestrator driving a job from version lookup to finalization
// ABOUTME: Prepares or reuses a sandbox, runs the engine, persists output and classifies failures

use flowbox_builder::{CodeBuilder, CodeStep, PnpmInstaller};
use flowbox_config::WorkerConfig;
use flowbox_core::{ExecutionOutput, ExecutionOutputStatus, FlowVersion, JobData, CODES_DIR};
use flowbox_sandbox::{CacheKey, PoolConfig, SandboxLease, SandboxPool};
use futures::future::try_join_all;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::collaborators::{Collaborators, FinishRunRequest, PauseRunRequest};
use crate::error::{Result, RunOutcome, WorkerError};
use crate::input::{load_input, PreparedInput};
use crate::lock::BuildLockRegistry;
use crate::log_file::{save_log_file, LogFileOptions};

/// Stages a job passes through, logged at each transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Resolving,
    AcquiringSandbox,
    Building,
    Cleaning,
    LoadingInput,
    Executing,
    Persisting,
    Finalizing,
    Released,
}

impl RunState {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Resolving => "resolving",
            Self::AcquiringSandbox => "acquiring_sandbox",
            Self::Building => "building",
            Self::Cleaning => "cleaning",
            Self::LoadingInput => "loading_input",
            Self::Executing => "executing",
            Self::Persisting => "persisting",
            Self::Finalizing => "finalizing",
            Self::Released => "released",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerSettings {
    pub server_url: String,
    pub build_lock_timeout: Duration,
    pub max_log_size: usize,
    pub strip_last_step_state: bool,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self::from(&WorkerConfig::default())
    }
}

impl From<&WorkerConfig> for WorkerSettings {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            server_url: config.server_url.clone(),
            build_lock_timeout: config.build_lock_timeout,
            max_log_size: config.max_log_size,
            strip_last_step_state: config.strip_last_step_state,
        }
    }
}

impl WorkerSettings {
    fn log_file_options(&self) -> LogFileOptions {
        LogFileOptions {
            max_log_size: self.max_log_size,
            strip_last_step_state: self.strip_last_step_state,
        }
    }
}

pub struct FlowWorker {
    pool: Arc<SandboxPool>,
    locks: Arc<BuildLockRegistry>,
    builder: CodeBuilder,
    collaborators: Collaborators,
    settings: WorkerSettings,
}

impl FlowWorker {
    pub fn new(
        pool: Arc<SandboxPool>,
        locks: Arc<BuildLockRegistry>,
        builder: CodeBuilder,
        collaborators: Collaborators,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            pool,
            locks,
            builder,
            collaborators,
            settings,
        }
    }

    /// Wire a worker from configuration with the pnpm-backed installer
    pub fn from_config(config: &WorkerConfig, collaborators: Collaborators) -> Self {
        let mut pool_config = PoolConfig::new(&config.sandbox_root, config.sandbox_capacity);
        pool_config.acquire_timeout = config.acquire_timeout;

        let installer = Arc::new(PnpmInstaller::new(config.package_manager.clone()));
        Self::new(
            Arc::new(SandboxPool::new(pool_config)),
            Arc::new(BuildLockRegistry::new()),
            CodeBuilder::new(installer),
            collaborators,
            WorkerSettings::from(config),
        )
    }

    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }

    pub fn pool(&self) -> &Arc<SandboxPool> {
        &self.pool
    }

    /// Run one BEGIN or RESUME job.
    ///
    /// Timeouts and oversized output are recorded on the run and reported as
    /// `Ok`. Any other failure after a sandbox was acquired marks the run
    /// `InternalError`, invalidates the sandbox and is returned so the queue can
    /// retry. Failures before acquisition leave the run untouched.
    pub async fn execute_flow(&self, job: &JobData) -> Result<RunOutcome> {
        let start = Instant::now();
        info!(
            "Executing flow run {} ({:?})",
            job.run_id, job.execution_type
        );

        self.transition(job, RunState::Resolving);
        let flow_version = self
            .collaborators
            .flow_versions
            .get_flow_version(&job.flow_version_id)
            .await?;
        let flow_version = self
            .collaborators
            .flow_versions
            .lock_piece_versions(&job.project_id, flow_version)
            .await?;

        self.transition(job, RunState::AcquiringSandbox);
        let lease = self
            .pool
            .acquire(CacheKey::for_flow_version(&flow_version))
            .await?;
        info!(
            "[{}] Executing flow {} in sandbox {}",
            job.run_id,
            flow_version.id,
            lease.box_id()
        );

        let result = match self.run_in_sandbox(job, &flow_version, &lease, start).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => self.handle_failure(job, &lease, e).await,
        };

        drop(lease);
        self.transition(job, RunState::Released);
        result
    }

    async fn run_in_sandbox(
        &self,
        job: &JobData,
        flow_version: &FlowVersion,
        lease: &SandboxLease,
        start: Instant,
    ) -> Result<RunOutcome> {
        if lease.is_cached() {
            self.transition(job, RunState::Cleaning);
            lease.clean().await?;
            info!(
                "[{}] Reusing sandbox {} took {}ms",
                job.run_id,
                lease.box_id(),
                start.elapsed().as_millis()
            );
        } else {
            self.transition(job, RunState::Building);
            lease.recreate().await?;
            self.build_code_steps(job, flow_version, lease.folder_path())
                .await?;
            self.collaborators
                .pieces
                .install(lease.folder_path(), &flow_version.referenced_pieces())
                .await?;
            lease.mark_ready();
            info!(
                "[{}] Preparing sandbox {} took {}ms",
                job.run_id,
                lease.box_id(),
                start.elapsed().as_millis()
            );
        }

        self.transition(job, RunState::LoadingInput);
        let PreparedInput {
            input,
            log_file_id,
        } = load_input(
            flow_version,
            job,
            &self.settings.server_url,
            self.collaborators.flow_runs.as_ref(),
            self.collaborators.files.as_ref(),
        )
        .await?;

        self.transition(job, RunState::Executing);
        let mut output = self.collaborators.engine.execute_flow(lease, &input).await?;

        self.transition(job, RunState::Persisting);
        let log_file = save_log_file(
            self.collaborators.files.as_ref(),
            log_file_id.as_deref(),
            &job.project_id,
            &mut output,
            self.settings.log_file_options(),
        )
        .await?;

        self.transition(job, RunState::Finalizing);
        let status = output.status;
        let outcome = self.finalize(job, log_file.id, output).await?;

        info!(
            "Flow run {} finished with {} in sandbox {} ({} ms)",
            job.run_id,
            status,
            lease.box_id(),
            start.elapsed().as_millis()
        );
        Ok(outcome)
    }

    /// Fetch and build every code step; drafts build under the flow-version lock
    async fn build_code_steps(
        &self,
        job: &JobData,
        flow_version: &FlowVersion,
        build_root: &Path,
    ) -> Result<()> {
        tokio::fs::create_dir_all(build_root.join(CODES_DIR)).await?;

        if flow_version.is_draft() {
            let _guard = self
                .locks
                .acquire(&flow_version.id, self.settings.build_lock_timeout)
                .await?;
            self.fetch_and_build(job, flow_version, build_root).await
        } else {
            self.fetch_and_build(job, flow_version, build_root).await
        }
    }

    async fn fetch_and_build(
        &self,
        job: &JobData,
        flow_version: &FlowVersion,
        build_root: &Path,
    ) -> Result<()> {
        let mut source_ids = Vec::new();
        for step in flow_version.code_steps() {
            let source_id = step
                .code_settings()
                .and_then(|settings| settings.artifact_source_id.clone())
                .ok_or_else(|| {
                    WorkerError::Validation(format!(
                        "Missing artifact_source_id for code step {} in flow version {}",
                        step.name, flow_version.id
                    ))
                })?;
            source_ids.push(source_id);
        }

        if source_ids.is_empty() {
            return Ok(());
        }

        let files = self.collaborators.files.as_ref();
        let sources = try_join_all(
            source_ids
                .iter()
                .map(|source_id| files.get_file(source_id, &job.project_id)),
        )
        .await?;

        let steps: Vec<CodeStep> = source_ids
            .into_iter()
            .zip(sources)
            .map(|(source_id, file)| CodeStep {
                source_id,
                zip_file: file.data,
            })
            .collect();

        debug!(
            "[{}] Building {} code steps for flow version {}",
            job.run_id,
            steps.len(),
            flow_version.id
        );
        try_join_all(
            steps
                .iter()
                .map(|step| self.builder.build_code_step(build_root, step)),
        )
        .await?;

        Ok(())
    }

    async fn finalize(
        &self,
        job: &JobData,
        logs_file_id: String,
        output: ExecutionOutput,
    ) -> Result<RunOutcome> {
        if output.is_paused() {
            let pause_metadata = output.pause_metadata.ok_or_else(|| {
                WorkerError::Validation(format!(
                    "Flow run {} paused without pause metadata",
                    job.run_id
                ))
            })?;
            self.collaborators
                .flow_runs
                .pause_run(PauseRunRequest {
                    flow_run_id: job.run_id.clone(),
                    logs_file_id,
                    pause_metadata,
                })
                .await?;
            return Ok(RunOutcome::Paused);
        }

        let status = output.status;
        let tasks = output.tasks;
        self.collaborators
            .flow_runs
            .finish_run(FinishRunRequest {
                flow_run_id: job.run_id.clone(),
                status,
                tasks,
                logs_file_id: Some(logs_file_id),
                tags: output.tags,
            })
            .await?;
        Ok(RunOutcome::Finished { status, tasks })
    }

    async fn handle_failure(
        &self,
        job: &JobData,
        lease: &SandboxLease,
        failure: WorkerError,
    ) -> Result<RunOutcome> {
        match failure {
            WorkerError::ExecutionTimeout(timeout) => {
                warn!(
                    "Flow run {} timed out after {:?} in sandbox {}",
                    job.run_id,
                    timeout,
                    lease.box_id()
                );
                self.finish_without_log(job, ExecutionOutputStatus::Timeout, 1, Vec::new())
                    .await?;
                Ok(RunOutcome::TimedOut)
            }
            WorkerError::OutputTooLarge {
                size,
                max,
                tasks,
                tags,
            } => {
                warn!(
                    "Flow run {} output rejected: {} bytes exceeds {} bytes",
                    job.run_id, size, max
                );
                self.finish_without_log(job, ExecutionOutputStatus::Failed, tasks, tags)
                    .await?;
                Ok(RunOutcome::OutputRejected)
            }
            other => {
                error!(
                    "Error executing flow run {} in sandbox {}: {}",
                    job.run_id,
                    lease.box_id(),
                    other
                );
                if let Err(e) = self
                    .finish_without_log(job, ExecutionOutputStatus::InternalError, 0, Vec::new())
                    .await
                {
                    error!(
                        "Failed to record internal error for flow run {}: {}",
                        job.run_id, e
                    );
                }
                if let Err(e) = self.pool.invalidate(lease.box_id()) {
                    warn!("Failed to invalidate sandbox {}: {}", lease.box_id(), e);
                }
                Err(other)
            }
        }
    }

    async fn finish_without_log(
        &self,
        job: &JobData,
        status: ExecutionOutputStatus,
        tasks: u32,
        tags: Vec<String>,
    ) -> Result<()> {
        self.collaborators
            .flow_runs
            .finish_run(FinishRunRequest {
                flow_run_id: job.run_id.clone(),
                status,
                tasks,
                logs_file_id: None,
                tags,
            })
            .await?;
        Ok(())
    }

    fn transition(&self, job: &JobData, state: RunState) {
        debug!("[{}] state -> {}", job.run_id, state.as_str());
    }
}
