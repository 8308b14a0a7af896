// ABOUTME: Configuration package for Flowbox workers
// ABOUTME: Environment variable names, parsing helpers, worker settings and tracing setup

pub mod constants;
pub mod env;
pub mod logging;
pub mod settings;

pub use logging::init_tracing;
pub use settings::{ConfigError, WorkerConfig};
