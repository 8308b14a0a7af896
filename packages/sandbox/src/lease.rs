// ABOUTME: Exclusive loan of a pooled sandbox, returned to the pool when dropped
// ABOUTME: Exposes directory preparation: recreate, clean and mark_ready

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use crate::key::CacheKey;
use crate::pool::{PoolInner, SandboxStatus};

/// Per-run files removed by `clean`
pub const EPHEMERAL_FILES: [&str; 2] = ["input.json", "output.json"];
pub const EPHEMERAL_DIRS: [&str; 1] = ["tmp"];

#[derive(Debug)]
pub struct SandboxLease {
    pool: Arc<PoolInner>,
    box_id: u32,
    key: CacheKey,
    folder: PathBuf,
    cached_on_acquire: bool,
}

impl SandboxLease {
    pub(crate) fn new(pool: Arc<PoolInner>, box_id: u32, key: CacheKey, cached: bool) -> Self {
        let folder = pool.root.join(box_id.to_string());
        Self {
            pool,
            box_id,
            key,
            folder,
            cached_on_acquire: cached,
        }
    }

    pub fn box_id(&self) -> u32 {
        self.box_id
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn folder_path(&self) -> &Path {
        &self.folder
    }

    /// Whether the sandbox held a complete build for this key when it was loaned
    pub fn is_cached(&self) -> bool {
        self.cached_on_acquire
    }

    /// Wipe the directory and start over; the sandbox is no longer cached
    pub async fn recreate(&self) -> Result<()> {
        self.update(|slot_status, cached| {
            *slot_status = SandboxStatus::Building;
            *cached = false;
        });

        match tokio::fs::remove_dir_all(&self.folder).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tokio::fs::create_dir_all(&self.folder).await?;

        debug!("Recreated sandbox {} at {}", self.box_id, self.folder.display());
        Ok(())
    }

    /// Remove per-run files, keeping installed dependencies and build output
    pub async fn clean(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.folder).await?;

        for file in EPHEMERAL_FILES {
            match tokio::fs::remove_file(self.folder.join(file)).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        for dir in EPHEMERAL_DIRS {
            match tokio::fs::remove_dir_all(self.folder.join(dir)).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        self.update(|slot_status, _| *slot_status = SandboxStatus::Ready);
        debug!("Cleaned sandbox {}", self.box_id);
        Ok(())
    }

    /// Record a completed build. Only cacheable keys leave the sandbox cached.
    pub fn mark_ready(&self) {
        let cacheable = self.key.is_cacheable();
        self.update(|slot_status, cached| {
            *slot_status = SandboxStatus::Ready;
            *cached = cacheable;
        });
    }

    /// Return the sandbox to the pool
    pub fn release(self) {
        drop(self);
    }

    fn update(&self, apply: impl FnOnce(&mut SandboxStatus, &mut bool)) {
        let mut state = self.pool.lock();
        if let Some(slot) = state.slot_mut(self.box_id) {
            apply(&mut slot.status, &mut slot.cached);
        }
    }
}

impl Drop for SandboxLease {
    fn drop(&mut self) {
        self.pool.lock().mark_returned(self.box_id);
        self.pool.released.notify_waiters();
        debug!("Released sandbox {} (key {})", self.box_id, self.key);
    }
}
