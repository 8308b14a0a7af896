// ABOUTME: Sandbox resource pool for Flowbox workers
// ABOUTME: Reusable filesystem sandboxes loaned by cache key with RAII leases

pub mod error;
pub mod key;
pub mod lease;
pub mod pool;

pub use error::{PoolError, Result};
pub use key::CacheKey;
pub use lease::SandboxLease;
pub use pool::{PoolConfig, SandboxInfo, SandboxPool, SandboxStatus};
