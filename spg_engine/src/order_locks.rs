//! Per-order mutual exclusion.
//!
//! Reconciliation of a single order (read, decide, conditional write, notify) must never run concurrently with another
//! reconciliation of the same order. Different orders are independent and never wait on each other.
//!
//! Entries are created on demand and pruned when the last holder releases, so the map only ever contains orders that
//! are being worked on right now.
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use log::*;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = HashMap<String, Arc<AsyncMutex<()>>>;

#[derive(Clone, Default)]
pub struct OrderLocks {
    locks: Arc<Mutex<LockMap>>,
}

impl OrderLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no one else holds the lock for `key`, then returns a guard. The lock is released when the guard is
    /// dropped.
    pub async fn lock(&self, key: &str) -> OrderLockGuard {
        let mutex = {
            let mut map = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            map.entry(key.to_string()).or_default().clone()
        };
        let guard = mutex.lock_owned().await;
        trace!("🔒️ Lock acquired for order {key}");
        OrderLockGuard { key: key.to_string(), locks: Arc::clone(&self.locks), guard: Some(guard) }
    }

    /// The number of orders with a live lock entry.
    pub fn len(&self) -> usize {
        self.locks.lock().map(|m| m.len()).unwrap_or_else(|e| e.into_inner().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct OrderLockGuard {
    key: String,
    locks: Arc<Mutex<LockMap>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for OrderLockGuard {
    fn drop(&mut self) {
        // Release the async mutex first so its Arc count reflects only the map and any waiters.
        drop(self.guard.take());
        let mut map = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if map.get(&self.key).map(|m| Arc::strong_count(m) == 1).unwrap_or(false) {
            map.remove(&self.key);
        }
        trace!("🔒️ Lock released for order {}", self.key);
    }
}
