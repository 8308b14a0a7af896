// ABOUTME: Error types for the sandbox pool
// ABOUTME: Covers acquisition timeouts, unknown sandbox ids and filesystem failures

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Timed out after {timeout:?} waiting for a sandbox for key {key}")]
    AcquireTimeout { key: String, timeout: Duration },

    #[error("Sandbox not found: {0}")]
    UnknownSandbox(u32),

    #[error("Sandbox filesystem error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PoolError>;
