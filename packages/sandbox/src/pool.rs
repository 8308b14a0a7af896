// ABOUTME: Fixed-capacity pool of filesystem sandboxes keyed by cache key
// ABOUTME: Loans each sandbox to one caller at a time and rebinds free slots on eviction

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::error::{PoolError, Result};
use crate::key::CacheKey;
use crate::lease::SandboxLease;

/// Lifecycle state of a single sandbox slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SandboxStatus {
    Idle,
    Acquired,
    Building,
    Ready,
    Returned,
}

impl SandboxStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Idle => "idle",
            Self::Acquired => "acquired",
            Self::Building => "building",
            Self::Ready => "ready",
            Self::Returned => "returned",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub root: PathBuf,
    pub capacity: usize,
    /// None waits for a free sandbox indefinitely
    pub acquire_timeout: Option<Duration>,
}

impl PoolConfig {
    pub fn new(root: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            root: root.into(),
            capacity,
            acquire_timeout: None,
        }
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = Some(timeout);
        self
    }
}

/// Point-in-time view of a slot, for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxInfo {
    pub box_id: u32,
    pub key: Option<String>,
    pub status: SandboxStatus,
    pub cached: bool,
    pub loaned: bool,
}

#[derive(Debug)]
pub(crate) struct Slot {
    pub(crate) box_id: u32,
    pub(crate) key: Option<CacheKey>,
    pub(crate) status: SandboxStatus,
    pub(crate) cached: bool,
    pub(crate) loaned: bool,
    returned_at: u64,
}

#[derive(Debug)]
pub(crate) struct PoolState {
    pub(crate) slots: Vec<Slot>,
    release_counter: u64,
}

impl PoolState {
    pub(crate) fn slot_mut(&mut self, box_id: u32) -> Option<&mut Slot> {
        self.slots.iter_mut().find(|slot| slot.box_id == box_id)
    }

    pub(crate) fn mark_returned(&mut self, box_id: u32) {
        self.release_counter += 1;
        let counter = self.release_counter;
        if let Some(slot) = self.slot_mut(box_id) {
            slot.loaned = false;
            slot.status = SandboxStatus::Returned;
            slot.returned_at = counter;
        }
    }
}

#[derive(Debug)]
pub(crate) struct PoolInner {
    pub(crate) root: PathBuf,
    acquire_timeout: Option<Duration>,
    state: Mutex<PoolState>,
    pub(crate) released: Notify,
}

impl PoolInner {
    pub(crate) fn lock(&self) -> MutexGuard<'_, PoolState> {
        // A panic while holding the lock leaves slot bookkeeping consistent
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Sandbox resource pool. Cloning shares the same slots.
#[derive(Debug, Clone)]
pub struct SandboxPool {
    inner: Arc<PoolInner>,
}

impl SandboxPool {
    pub fn new(config: PoolConfig) -> Self {
        let capacity = if config.capacity == 0 {
            warn!("Sandbox pool capacity 0 is invalid, using 1");
            1
        } else {
            config.capacity
        };

        let slots = (0..capacity as u32)
            .map(|box_id| Slot {
                box_id,
                key: None,
                status: SandboxStatus::Idle,
                cached: false,
                loaned: false,
                returned_at: 0,
            })
            .collect();

        info!(
            "Created sandbox pool with {} slots at {}",
            capacity,
            config.root.display()
        );

        Self {
            inner: Arc::new(PoolInner {
                root: config.root,
                acquire_timeout: config.acquire_timeout,
                state: Mutex::new(PoolState {
                    slots,
                    release_counter: 0,
                }),
                released: Notify::new(),
            }),
        }
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().slots.len()
    }

    /// Loan a sandbox bound to `key`, waiting while the key is loaned or no slot is free
    pub async fn acquire(&self, key: CacheKey) -> Result<SandboxLease> {
        match self.inner.acquire_timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.wait_for_slot(&key))
                .await
                .map_err(|_| PoolError::AcquireTimeout {
                    key: key.to_string(),
                    timeout,
                }),
            None => Ok(self.wait_for_slot(&key).await),
        }
    }

    async fn wait_for_slot(&self, key: &CacheKey) -> SandboxLease {
        loop {
            // Register interest before checking so a release in between is not missed
            let mut notified = std::pin::pin!(self.inner.released.notified());
            notified.as_mut().enable();

            if let Some(lease) = self.try_acquire(key) {
                return lease;
            }

            debug!("No sandbox available for key {}, waiting for release", key);
            notified.await;
        }
    }

    fn try_acquire(&self, key: &CacheKey) -> Option<SandboxLease> {
        let mut state = self.inner.lock();

        if let Some(slot) = state
            .slots
            .iter_mut()
            .find(|slot| slot.key.as_ref() == Some(key))
        {
            if slot.loaned {
                return None;
            }
            slot.loaned = true;
            slot.status = SandboxStatus::Acquired;
            debug!(
                "Reusing sandbox {} for key {} (cached: {})",
                slot.box_id, key, slot.cached
            );
            return Some(SandboxLease::new(
                Arc::clone(&self.inner),
                slot.box_id,
                key.clone(),
                slot.cached,
            ));
        }

        let slot = state
            .slots
            .iter_mut()
            .filter(|slot| !slot.loaned)
            .min_by_key(|slot| (slot.status != SandboxStatus::Idle, slot.returned_at))?;

        if let Some(previous) = &slot.key {
            debug!(
                "Evicting key {} from sandbox {} for key {}",
                previous, slot.box_id, key
            );
        }
        slot.key = Some(key.clone());
        slot.cached = false;
        slot.loaned = true;
        slot.status = SandboxStatus::Acquired;

        Some(SandboxLease::new(
            Arc::clone(&self.inner),
            slot.box_id,
            key.clone(),
            false,
        ))
    }

    /// Drop the cached flag so the next acquisition rebuilds from scratch
    pub fn invalidate(&self, box_id: u32) -> Result<()> {
        let mut state = self.inner.lock();
        let slot = state
            .slot_mut(box_id)
            .ok_or(PoolError::UnknownSandbox(box_id))?;
        slot.cached = false;
        info!("Invalidated sandbox {}", box_id);
        Ok(())
    }

    pub fn snapshot(&self) -> Vec<SandboxInfo> {
        self.inner
            .lock()
            .slots
            .iter()
            .map(|slot| SandboxInfo {
                box_id: slot.box_id,
                key: slot.key.as_ref().map(|key| key.to_string()),
                status: slot.status,
                cached: slot.cached,
                loaned: slot.loaned,
            })
            .collect()
    }

    pub fn info(&self, box_id: u32) -> Option<SandboxInfo> {
        self.snapshot()
            .into_iter()
            .find(|info| info.box_id == box_id)
    }
}
