// ABOUTME: Platform-wide constants shared by every Flowbox package
// ABOUTME: Log size cap, identifier length and sandbox directory names

/// Maximum serialized size of a persisted execution log (2 MiB)
pub const MAX_LOG_SIZE: usize = 2048 * 1024;

/// Length of generated platform identifiers
pub const ID_LENGTH: usize = 21;

/// Directory inside a sandbox that holds one sub-directory per code step
pub const CODES_DIR: &str = "codes";
