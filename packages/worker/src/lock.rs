// ABOUTME: Keyed, time-boxed async locks serialising builds of the same draft flow version
// ABOUTME: Guards release on drop and unused keys are pruned from the registry

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    #[error("Timed out after {timeout:?} waiting for build lock {key}")]
    Timeout { key: String, timeout: Duration },
}

type LockMap = HashMap<String, Arc<tokio::sync::Mutex<()>>>;

#[derive(Debug, Clone, Default)]
pub struct BuildLockRegistry {
    locks: Arc<Mutex<LockMap>>,
}

impl BuildLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait up to `timeout` for exclusive access to `key`
    pub async fn acquire(&self, key: &str, timeout: Duration) -> Result<BuildLockGuard, LockError> {
        let mutex = Arc::clone(self.lock_map().entry(key.to_string()).or_default());

        let acquired = tokio::time::timeout(timeout, mutex.lock_owned()).await;
        match acquired {
            Ok(guard) => {
                debug!("Acquired build lock {}", key);
                Ok(BuildLockGuard {
                    key: key.to_string(),
                    registry: self.clone(),
                    guard: Some(guard),
                })
            }
            Err(_) => {
                warn!("Timed out after {:?} waiting for build lock {}", timeout, key);
                self.prune(key);
                Err(LockError::Timeout {
                    key: key.to_string(),
                    timeout,
                })
            }
        }
    }

    /// Keys currently held or waited on
    pub fn active_keys(&self) -> usize {
        self.lock_map().len()
    }

    fn lock_map(&self) -> MutexGuard<'_, LockMap> {
        self.locks.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn prune(&self, key: &str) {
        let mut locks = self.lock_map();
        if locks
            .get(key)
            .is_some_and(|mutex| Arc::strong_count(mutex) == 1)
        {
            locks.remove(key);
        }
    }
}

/// Held build lock; dropping it releases the key
#[derive(Debug)]
pub struct BuildLockGuard {
    key: String,
    registry: BuildLockRegistry,
    guard: Option<OwnedMutexGuard<()>>,
}

impl BuildLockGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for BuildLockGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.registry.prune(&self.key);
        debug!("Released build lock {}", self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_same_key_is_serialised() {
        let registry = BuildLockRegistry::new();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let registry = registry.clone();
                let in_flight = Arc::clone(&in_flight);
                let max_seen = Arc::clone(&max_seen);
                tokio::spawn(async move {
                    let _guard = registry
                        .acquire("fv-draft", Duration::from_secs(5))
                        .await
                        .unwrap();
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(registry.active_keys(), 0);
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let registry = BuildLockRegistry::new();

        let _a = registry.acquire("a", Duration::from_millis(50)).await.unwrap();
        let b = registry.acquire("b", Duration::from_millis(50)).await;

        assert!(b.is_ok());
        assert_eq!(registry.active_keys(), 2);
    }

    #[tokio::test]
    async fn test_timeout() {
        let registry = BuildLockRegistry::new();
        let held = registry.acquire("fv-1", Duration::from_secs(1)).await.unwrap();

        let result = registry.acquire("fv-1", Duration::from_millis(30)).await;

        assert_eq!(
            result.unwrap_err(),
            LockError::Timeout {
                key: "fv-1".to_string(),
                timeout: Duration::from_millis(30),
            }
        );

        // The holder is unaffected and the key can be taken again after release
        assert_eq!(held.key(), "fv-1");
        drop(held);
        assert!(registry
            .acquire("fv-1", Duration::from_millis(30))
            .await
            .is_ok());
    }
}
