//! Per-string mutual exclusion over an unbounded key space.
//!
//! A [`KeyLock`]/[`KeyRwLock`] maps arbitrary string keys to lazily-created
//! lock instances. Creation is race-free: concurrent lookups of a new key
//! always agree on the same lock instance. Locks are never evicted — the
//! table grows with the set of distinct keys ever seen, which is the
//! documented tradeoff for a key space that in practice stays small (see the
//! crate-level note in the workspace `DESIGN.md`).
//!
//! Guards are returned owned (`lock_owned`/`read_owned`/`write_owned`) so
//! they can be moved into a spawned task instead of being tied to the
//! borrow that acquired them.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock as SyncRwLock;
use tokio::sync::{Mutex, OwnedMutexGuard, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

/// Exclusive per-key lock table.
#[derive(Default)]
pub struct KeyLock {
    locks: SyncRwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyLock {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_or_create(&self, key: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.read().get(key) {
            return lock.clone();
        }

        let mut locks = self.locks.write();
        if let Some(lock) = locks.get(key) {
            return lock.clone();
        }

        let lock = Arc::new(Mutex::new(()));
        locks.insert(key.to_owned(), lock.clone());
        lock
    }

    /// Acquires the exclusive lock for `key`, returning an owned guard that
    /// can outlive this call — e.g. be moved into `tokio::spawn`.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        self.get_or_create(key).lock_owned().await
    }
}

/// Per-key reader-writer lock table.
#[derive(Default)]
pub struct KeyRwLock {
    locks: SyncRwLock<HashMap<String, Arc<RwLock<()>>>>,
}

impl KeyRwLock {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_or_create(&self, key: &str) -> Arc<RwLock<()>> {
        if let Some(lock) = self.locks.read().get(key) {
            return lock.clone();
        }

        let mut locks = self.locks.write();
        if let Some(lock) = locks.get(key) {
            return lock.clone();
        }

        let lock = Arc::new(RwLock::new(()));
        locks.insert(key.to_owned(), lock.clone());
        lock
    }

    pub async fn write(&self, key: &str) -> OwnedRwLockWriteGuard<()> {
        self.get_or_create(key).write_owned().await
    }

    pub async fn read(&self, key: &str) -> OwnedRwLockReadGuard<()> {
        self.get_or_create(key).read_owned().await
    }
}
