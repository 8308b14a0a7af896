// ABOUTME: In-memory collaborators and fixtures shared by flow worker integration tests
// ABOUTME: Fakes record every call so tests can assert on run finalization and builds

#![allow(dead_code)]

use async_trait::async_trait;
use flowbox_builder::archive::compress;
use flowbox_builder::{
    ArchiveFile, CodeBuilder, CommandOutput, Dependencies, DependencyInstaller, InstallError,
    LocalTool,
};
use flowbox_core::{
    CodeActionSettings, ExecuteFlowOperation, ExecutionOutput, ExecutionOutputStatus,
    ExecutionState, ExecutionType, File, FlowRun, FlowStep, FlowVersion, FlowVersionState,
    JobData, PieceActionSettings, PieceRef, StepSettings, TriggerSettings, TriggerSource,
};
use flowbox_sandbox::{PoolConfig, SandboxLease, SandboxPool};
use flowbox_worker::{
    BuildLockRegistry, CollaboratorError, Collaborators, EngineError, EngineRunner, FileService,
    FinishRunRequest, FlowRunService, FlowVersionService, FlowWorker, PauseRunRequest,
    PieceInstaller, WorkerSettings,
};
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const PROJECT_ID: &str = "project-1";

#[derive(Default)]
pub struct InMemoryFlowVersions {
    pub versions: Mutex<HashMap<String, FlowVersion>>,
    pub lock_calls: AtomicUsize,
}

#[async_trait]
impl FlowVersionService for InMemoryFlowVersions {
    async fn get_flow_version(&self, id: &str) -> Result<FlowVersion, CollaboratorError> {
        self.versions
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| CollaboratorError::not_found("Flow version", id))
    }

    async fn lock_piece_versions(
        &self,
        _project_id: &str,
        version: FlowVersion,
    ) -> Result<FlowVersion, CollaboratorError> {
        self.lock_calls.fetch_add(1, Ordering::SeqCst);
        Ok(version)
    }
}

/// Stores runs and applies pause/finish requests to them
#[derive(Default)]
pub struct InMemoryFlowRuns {
    pub runs: Mutex<HashMap<String, FlowRun>>,
    pub finished: Mutex<Vec<FinishRunRequest>>,
    pub paused: Mutex<Vec<PauseRunRequest>>,
}

impl InMemoryFlowRuns {
    pub fn insert(&self, run: FlowRun) {
        self.runs.lock().unwrap().insert(run.id.clone(), run);
    }

    pub fn finished(&self) -> Vec<FinishRunRequest> {
        self.finished.lock().unwrap().clone()
    }

    pub fn paused(&self) -> Vec<PauseRunRequest> {
        self.paused.lock().unwrap().clone()
    }
}

#[async_trait]
impl FlowRunService for InMemoryFlowRuns {
    async fn get_flow_run(&self, id: &str, _project_id: &str) -> Result<FlowRun, CollaboratorError> {
        self.runs
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| CollaboratorError::not_found("Flow run", id))
    }

    async fn finish_run(&self, request: FinishRunRequest) -> Result<(), CollaboratorError> {
        if let Some(run) = self.runs.lock().unwrap().get_mut(&request.flow_run_id) {
            run.status = request.status;
            run.tasks = request.tasks;
            run.logs_file_id = request.logs_file_id.clone();
            run.tags = request.tags.clone();
        }
        self.finished.lock().unwrap().push(request);
        Ok(())
    }

    async fn pause_run(&self, request: PauseRunRequest) -> Result<(), CollaboratorError> {
        if let Some(run) = self.runs.lock().unwrap().get_mut(&request.flow_run_id) {
            run.status = ExecutionOutputStatus::Paused;
            run.logs_file_id = Some(request.logs_file_id.clone());
            run.pause_metadata = Some(request.pause_metadata.clone());
        }
        self.paused.lock().unwrap().push(request);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryFiles {
    pub files: Mutex<HashMap<String, File>>,
    pub saves: AtomicUsize,
    next_id: AtomicUsize,
}

impl InMemoryFiles {
    pub fn insert(&self, id: &str, data: Vec<u8>) {
        self.files.lock().unwrap().insert(
            id.to_string(),
            File {
                id: id.to_string(),
                project_id: PROJECT_ID.to_string(),
                data,
            },
        );
    }

    pub fn get(&self, id: &str) -> Option<File> {
        self.files.lock().unwrap().get(id).cloned()
    }
}

#[async_trait]
impl FileService for InMemoryFiles {
    async fn get_file(&self, file_id: &str, _project_id: &str) -> Result<File, CollaboratorError> {
        self.get(file_id)
            .ok_or_else(|| CollaboratorError::not_found("File", file_id))
    }

    async fn save_file(
        &self,
        file_id: Option<&str>,
        project_id: &str,
        data: Vec<u8>,
    ) -> Result<File, CollaboratorError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        let id = match file_id {
            Some(id) => id.to_string(),
            None => format!("log-{}", self.next_id.fetch_add(1, Ordering::SeqCst)),
        };
        let file = File {
            id: id.clone(),
            project_id: project_id.to_string(),
            data,
        };
        self.files.lock().unwrap().insert(id, file.clone());
        Ok(file)
    }
}

#[derive(Default)]
pub struct RecordingPieceInstaller {
    pub calls: Mutex<Vec<(PathBuf, Vec<PieceRef>)>>,
}

#[async_trait]
impl PieceInstaller for RecordingPieceInstaller {
    async fn install(&self, path: &Path, pieces: &[PieceRef]) -> Result<(), CollaboratorError> {
        self.calls
            .lock()
            .unwrap()
            .push((path.to_path_buf(), pieces.to_vec()));
        Ok(())
    }
}

/// Engine returning queued responses, then succeeding by default
#[derive(Default)]
pub struct ScriptedEngine {
    pub responses: Mutex<VecDeque<Result<ExecutionOutput, EngineError>>>,
    pub inputs: Mutex<Vec<ExecuteFlowOperation>>,
    pub sandboxes: Mutex<Vec<u32>>,
}

impl ScriptedEngine {
    pub fn push(&self, response: Result<ExecutionOutput, EngineError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn inputs(&self) -> Vec<ExecuteFlowOperation> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl EngineRunner for ScriptedEngine {
    async fn execute_flow(
        &self,
        sandbox: &SandboxLease,
        input: &ExecuteFlowOperation,
    ) -> Result<ExecutionOutput, EngineError> {
        self.inputs.lock().unwrap().push(input.clone());
        self.sandboxes.lock().unwrap().push(sandbox.box_id());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(succeeded_output(1)))
    }
}

/// Installer that "compiles" by copying index.ts to index.js and tracks overlapping builds
#[derive(Default)]
pub struct FakeInstaller {
    pub compiles: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub compile_delay: Option<Duration>,
}

impl FakeInstaller {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            compile_delay: Some(delay),
            ..Default::default()
        }
    }
}

#[async_trait]
impl DependencyInstaller for FakeInstaller {
    async fn add_dependencies(
        &self,
        _dir: &Path,
        _dependencies: &Dependencies,
    ) -> Result<CommandOutput, InstallError> {
        Ok(CommandOutput::default())
    }

    async fn init_project(&self, _dir: &Path) -> Result<CommandOutput, InstallError> {
        Ok(CommandOutput::default())
    }

    async fn run_local_tool(
        &self,
        dir: &Path,
        _tool: LocalTool,
    ) -> Result<CommandOutput, InstallError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.compile_delay {
            tokio::time::sleep(delay).await;
        }
        let source = tokio::fs::read(dir.join("index.ts")).await.unwrap_or_default();
        tokio::fs::write(dir.join("index.js"), source).await.unwrap();
        self.compiles.fetch_add(1, Ordering::SeqCst);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(CommandOutput::default())
    }

    async fn link(&self, _dir: &Path, _other: &Path) -> Result<CommandOutput, InstallError> {
        Ok(CommandOutput::default())
    }

    async fn install(&self, _dir: &Path) -> Result<CommandOutput, InstallError> {
        Ok(CommandOutput::default())
    }
}

pub fn succeeded_output(tasks: u32) -> ExecutionOutput {
    let mut execution_state = ExecutionState::default();
    execution_state
        .steps
        .insert("step_1".to_string(), json!({"output": {"ok": true}}));
    execution_state
        .last_step_state
        .insert("step_1".to_string(), json!({"output": {"ok": true}}));

    ExecutionOutput {
        status: ExecutionOutputStatus::Succeeded,
        tasks,
        duration_ms: 12,
        execution_state,
        pause_metadata: None,
        tags: vec!["prod".to_string()],
        error_message: None,
    }
}

pub fn code_source_bundle() -> Vec<u8> {
    compress(&[
        ArchiveFile::new(
            "index.ts",
            "export const code = async (params) => ({ echoed: params });",
        ),
        ArchiveFile::new("package.json", r#"{"name":"code-step","version":"1.0.0"}"#),
    ])
    .unwrap()
}

fn step(name: &str, settings: StepSettings, next: Option<FlowStep>) -> FlowStep {
    FlowStep {
        name: name.to_string(),
        display_name: name.to_string(),
        settings,
        next_action: next.map(Box::new),
    }
}

/// Webhook trigger -> piece action -> one code step per source id
pub fn flow_version(id: &str, state: FlowVersionState, code_sources: &[Option<&str>]) -> FlowVersion {
    let mut next: Option<FlowStep> = None;
    for (index, source) in code_sources.iter().enumerate().rev() {
        next = Some(step(
            &format!("code_{}", index),
            StepSettings::CodeAction(CodeActionSettings {
                artifact_source_id: source.map(str::to_string),
                input: json!({}),
            }),
            next,
        ));
    }
    let piece = step(
        "send_message",
        StepSettings::PieceAction(PieceActionSettings {
            piece_name: "@flowbox/piece-slack".to_string(),
            piece_version: "0.3.1".to_string(),
            action_name: "send_message".to_string(),
            input: json!({"text": "hello"}),
        }),
        next,
    );

    FlowVersion {
        id: id.to_string(),
        flow_id: "flow-1".to_string(),
        display_name: "Test flow".to_string(),
        state,
        trigger: step(
            "trigger",
            StepSettings::Trigger(TriggerSettings {
                source: TriggerSource::Webhook,
            }),
            Some(piece),
        ),
    }
}

pub fn job(run_id: &str, flow_version_id: &str, execution_type: ExecutionType) -> JobData {
    JobData {
        project_id: PROJECT_ID.to_string(),
        flow_version_id: flow_version_id.to_string(),
        run_id: run_id.to_string(),
        execution_type,
        payload: json!({"body": {"id": 7}}),
    }
}

pub fn running_run(run_id: &str, flow_version_id: &str) -> FlowRun {
    FlowRun {
        id: run_id.to_string(),
        project_id: PROJECT_ID.to_string(),
        flow_version_id: flow_version_id.to_string(),
        status: ExecutionOutputStatus::Running,
        tasks: 0,
        logs_file_id: None,
        pause_metadata: None,
        tags: vec![],
    }
}

pub struct Harness {
    pub worker: Arc<FlowWorker>,
    pub pool: Arc<SandboxPool>,
    pub locks: Arc<BuildLockRegistry>,
    pub versions: Arc<InMemoryFlowVersions>,
    pub runs: Arc<InMemoryFlowRuns>,
    pub files: Arc<InMemoryFiles>,
    pub pieces: Arc<RecordingPieceInstaller>,
    pub engine: Arc<ScriptedEngine>,
    pub installer: Arc<FakeInstaller>,
    pub temp_dir: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(2, WorkerSettings::default(), FakeInstaller::default())
    }

    pub fn with_settings(settings: WorkerSettings) -> Self {
        Self::build(2, settings, FakeInstaller::default())
    }

    pub fn build(capacity: usize, settings: WorkerSettings, installer: FakeInstaller) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let pool = Arc::new(SandboxPool::new(PoolConfig::new(temp_dir.path(), capacity)));
        let locks = Arc::new(BuildLockRegistry::new());
        let versions = Arc::new(InMemoryFlowVersions::default());
        let runs = Arc::new(InMemoryFlowRuns::default());
        let files = Arc::new(InMemoryFiles::default());
        let pieces = Arc::new(RecordingPieceInstaller::default());
        let engine = Arc::new(ScriptedEngine::default());
        let installer = Arc::new(installer);

        let collaborators = Collaborators {
            flow_versions: versions.clone(),
            flow_runs: runs.clone(),
            files: files.clone(),
            pieces: pieces.clone(),
            engine: engine.clone(),
        };
        let worker = Arc::new(FlowWorker::new(
            pool.clone(),
            locks.clone(),
            CodeBuilder::new(installer.clone()),
            collaborators,
            settings,
        ));

        Self {
            worker,
            pool,
            locks,
            versions,
            runs,
            files,
            pieces,
            engine,
            installer,
            temp_dir,
        }
    }

    /// Register a flow version whose code steps use the given source files
    pub fn add_version(&self, id: &str, state: FlowVersionState, code_sources: &[Option<&str>]) {
        for source in code_sources.iter().flatten() {
            self.files.insert(source, code_source_bundle());
        }
        self.versions
            .versions
            .lock()
            .unwrap()
            .insert(id.to_string(), flow_version(id, state, code_sources));
    }

    pub fn add_run(&self, run_id: &str, flow_version_id: &str) {
        self.runs.insert(running_run(run_id, flow_version_id));
    }

    pub fn cached_boxes(&self) -> Vec<u32> {
        self.pool
            .snapshot()
            .into_iter()
            .filter(|info| info.cached)
            .map(|info| info.box_id)
            .collect()
    }
}
