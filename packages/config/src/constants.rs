// ABOUTME: Environment variable name constants
// ABOUTME: Centralized definitions of all environment variable names used across Flowbox

// Sandbox Pool Configuration
pub const FLOWBOX_SANDBOX_ROOT: &str = "FLOWBOX_SANDBOX_ROOT";
pub const FLOWBOX_SANDBOX_CAPACITY: &str = "FLOWBOX_SANDBOX_CAPACITY";
pub const FLOWBOX_SANDBOX_ACQUIRE_TIMEOUT_MS: &str = "FLOWBOX_SANDBOX_ACQUIRE_TIMEOUT_MS";

// Build Configuration
pub const FLOWBOX_BUILD_LOCK_TIMEOUT_MS: &str = "FLOWBOX_BUILD_LOCK_TIMEOUT_MS";
pub const FLOWBOX_PACKAGE_MANAGER: &str = "FLOWBOX_PACKAGE_MANAGER";

// Run Output Configuration
pub const FLOWBOX_MAX_LOG_SIZE: &str = "FLOWBOX_MAX_LOG_SIZE";
pub const FLOWBOX_STRIP_LAST_STEP_STATE: &str = "FLOWBOX_STRIP_LAST_STEP_STATE";

// Engine Callback Configuration
pub const FLOWBOX_SERVER_URL: &str = "FLOWBOX_SERVER_URL";

// Logging
pub const RUST_LOG: &str = "RUST_LOG";
