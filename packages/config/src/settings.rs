// ABOUTME: Worker configuration loaded from the environment
// ABOUTME: Validates pool capacity, timeouts and output limits before the worker starts

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::constants::*;
use crate::env::{non_empty_env, parse_bool_env, parse_env_or_default_with_validation};

pub const DEFAULT_SANDBOX_CAPACITY: usize = 8;
pub const MAX_SANDBOX_CAPACITY: usize = 256;
pub const DEFAULT_BUILD_LOCK_TIMEOUT_MS: u64 = 180_000;
pub const DEFAULT_MAX_LOG_SIZE: usize = 2048 * 1024;
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000/";
pub const DEFAULT_PACKAGE_MANAGER: &str = "npx";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {var}")]
    InvalidValue { var: &'static str, value: String },
    #[error("{var} value {value} is out of valid range ({min}-{max})")]
    OutOfRange {
        var: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },
    #[error("Failed to load .env file: {0}")]
    DotEnv(#[from] dotenvy::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    pub sandbox_root: PathBuf,
    pub sandbox_capacity: usize,
    /// None waits for a free sandbox indefinitely
    pub acquire_timeout: Option<Duration>,
    pub build_lock_timeout: Duration,
    pub max_log_size: usize,
    pub server_url: String,
    pub strip_last_step_state: bool,
    pub package_manager: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            sandbox_root: default_sandbox_root(),
            sandbox_capacity: DEFAULT_SANDBOX_CAPACITY,
            acquire_timeout: None,
            build_lock_timeout: Duration::from_millis(DEFAULT_BUILD_LOCK_TIMEOUT_MS),
            max_log_size: DEFAULT_MAX_LOG_SIZE,
            server_url: DEFAULT_SERVER_URL.to_string(),
            strip_last_step_state: true,
            package_manager: DEFAULT_PACKAGE_MANAGER.to_string(),
        }
    }
}

impl WorkerConfig {
    /// Load `.env` (if present) and then read the environment
    pub fn load() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(e.into()),
        }
        Self::from_env()
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let sandbox_root = non_empty_env(FLOWBOX_SANDBOX_ROOT)
            .map(PathBuf::from)
            .unwrap_or_else(default_sandbox_root);

        let sandbox_capacity = match strict_u64(FLOWBOX_SANDBOX_CAPACITY)? {
            Some(value) => {
                check_range(FLOWBOX_SANDBOX_CAPACITY, value, 1, MAX_SANDBOX_CAPACITY as u64)?;
                value as usize
            }
            None => DEFAULT_SANDBOX_CAPACITY,
        };

        let acquire_timeout = match strict_u64(FLOWBOX_SANDBOX_ACQUIRE_TIMEOUT_MS)? {
            Some(value) => {
                check_range(FLOWBOX_SANDBOX_ACQUIRE_TIMEOUT_MS, value, 1, u64::MAX)?;
                Some(Duration::from_millis(value))
            }
            None => None,
        };

        let build_lock_timeout_ms = match strict_u64(FLOWBOX_BUILD_LOCK_TIMEOUT_MS)? {
            Some(value) => {
                check_range(FLOWBOX_BUILD_LOCK_TIMEOUT_MS, value, 1, u64::MAX)?;
                value
            }
            None => DEFAULT_BUILD_LOCK_TIMEOUT_MS,
        };

        let max_log_size =
            parse_env_or_default_with_validation(FLOWBOX_MAX_LOG_SIZE, DEFAULT_MAX_LOG_SIZE, |v| {
                v > 0
            });

        let mut server_url =
            non_empty_env(FLOWBOX_SERVER_URL).unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
        if !server_url.ends_with('/') {
            server_url.push('/');
        }

        let strip_last_step_state = parse_bool_env(FLOWBOX_STRIP_LAST_STEP_STATE, true);

        let package_manager = non_empty_env(FLOWBOX_PACKAGE_MANAGER)
            .unwrap_or_else(|| DEFAULT_PACKAGE_MANAGER.to_string());

        Ok(WorkerConfig {
            sandbox_root,
            sandbox_capacity,
            acquire_timeout,
            build_lock_timeout: Duration::from_millis(build_lock_timeout_ms),
            max_log_size,
            server_url,
            strip_last_step_state,
            package_manager,
        })
    }
}

fn default_sandbox_root() -> PathBuf {
    env::temp_dir().join("flowbox").join("sandboxes")
}

fn strict_u64(var: &'static str) -> Result<Option<u64>, ConfigError> {
    match non_empty_env(var) {
        Some(raw) => raw
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { var, value: raw }),
        None => Ok(None),
    }
}

fn check_range(var: &'static str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            var,
            value,
            min,
            max,
        });
    }
    Ok(())
}
