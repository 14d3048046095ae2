//! Per-document build exclusion.
//!
//! [`BuildGate`] hands out at most one [`BuildLease`] per [`DocumentKey`] at
//! a time. Distinct keys never block each other. A second caller for a held
//! key waits (it does not fail or skip) and, once it gets the lease, sees
//! whatever the first caller left in the store.
//!
//! Acquisition has no timeout; wrap [`BuildGate::acquire`] in
//! `tokio::time::timeout` where a bounded wait is needed.
//!
//! Registry entries are created on first use and dropped again when the
//! last lease holder or waiter for that key goes away, so the registry only
//! holds documents that are currently being built or waited on.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::hashing::DocumentKey;

type Registry = Arc<Mutex<HashMap<DocumentKey, Arc<AsyncMutex<()>>>>>;

#[derive(Default, Clone)]
pub struct BuildGate {
    locks: Registry,
}

impl BuildGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other lease for `key` is held, then returns one.
    pub async fn acquire(&self, key: &DocumentKey) -> BuildLease {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(key.clone()).or_default().clone()
        };
        let guard = lock.lock_owned().await;
        BuildLease {
            key: key.clone(),
            guard: Some(guard),
            registry: self.locks.clone(),
        }
    }

    /// Number of keys currently tracked (held or waited on).
    pub fn tracked(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Exclusive right to build one document. Released on drop.
pub struct BuildLease {
    key: DocumentKey,
    guard: Option<OwnedMutexGuard<()>>,
    registry: Registry,
}

impl BuildLease {
    pub fn key(&self) -> &DocumentKey {
        &self.key
    }
}

impl Drop for BuildLease {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        // Only the registry itself still references the mutex: nobody waits.
        if locks
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::derive_key;
    use std::path::Path;
    use std::time::Duration;

    fn key(p: &str) -> DocumentKey {
        derive_key(Path::new(p))
    }

    #[tokio::test]
    async fn same_key_waits_for_release() {
        let gate = BuildGate::new();
        let a = key("/a.pdf");

        let lease = gate.acquire(&a).await;
        let blocked = tokio::time::timeout(Duration::from_millis(50), gate.acquire(&a)).await;
        assert!(blocked.is_err());

        drop(lease);
        let again = tokio::time::timeout(Duration::from_millis(50), gate.acquire(&a)).await;
        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn distinct_keys_do_not_block() {
        let gate = BuildGate::new();
        let _a = gate.acquire(&key("/a.pdf")).await;
        let b = tokio::time::timeout(Duration::from_millis(50), gate.acquire(&key("/b.pdf"))).await;
        assert!(b.is_ok());
        assert_eq!(gate.tracked(), 2);
    }

    #[tokio::test]
    async fn waiter_gets_lease_after_holder_finishes() {
        let gate = BuildGate::new();
        let a = key("/a.pdf");
        let lease = gate.acquire(&a).await;

        let gate2 = gate.clone();
        let a2 = a.clone();
        let waiter = tokio::spawn(async move {
            let lease = gate2.acquire(&a2).await;
            lease.key().clone()
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        // The waiter keeps the entry alive across the holder's release.
        drop(lease);
        assert_eq!(waiter.await.unwrap(), a);
    }

    #[tokio::test]
    async fn idle_entries_are_evicted() {
        let gate = BuildGate::new();
        {
            let _lease = gate.acquire(&key("/a.pdf")).await;
            assert_eq!(gate.tracked(), 1);
        }
        assert_eq!(gate.tracked(), 0);
    }
}
