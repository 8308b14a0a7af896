// ABOUTME: Flow-run orchestrator for Flowbox workers
// ABOUTME: Prepares sandboxes, runs flows through the engine and records the outcome

pub mod collaborators;
pub mod error;
pub mod input;
pub mod lock;
pub mod log_file;
pub mod pieces;
pub mod worker;

pub use collaborators::{
    CollaboratorError, Collaborators, EngineError, EngineRunner, FileService, FinishRunRequest,
    FlowRunService, FlowVersionService, PauseRunRequest, PieceInstaller,
};
pub use error::{Result, RunOutcome, WorkerError};
pub use lock::{BuildLockGuard, BuildLockRegistry, LockError};
pub use pieces::PackageManagerPieceInstaller;
pub use worker::{FlowWorker, RunState, WorkerSettings};
