use crate::domain::ports::{RowGuard, RowKey};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Entries beyond this count trigger a sweep of locks nobody holds.
const SWEEP_THRESHOLD: usize = 4096;

/// Table of per-row exclusive locks for single-process stores.
///
/// Two lockers of the same [`RowKey`] serialize; different keys never block
/// each other. Guards are owned, so they can live inside a unit of work across
/// `.await` points.
#[derive(Default, Clone)]
pub struct RowLocks {
    rows: Arc<DashMap<RowKey, Arc<Mutex<()>>>>,
}

impl RowLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: RowKey) -> RowGuard {
        if self.rows.len() > SWEEP_THRESHOLD {
            self.sweep();
        }
        let row = self.rows.entry(key).or_default().clone();
        row.lock_owned().await
    }

    /// Drops entries that no guard or waiter references.
    fn sweep(&self) {
        self.rows.retain(|_, row| Arc::strong_count(row) > 1);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::actor::UserId;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_serializes() {
        let locks = RowLocks::new();
        let guard = locks.lock(RowKey::Balance(UserId(1))).await;

        let contender = locks.clone();
        let handle = tokio::spawn(async move {
            let _guard = contender.lock(RowKey::Balance(UserId(1))).await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());
        drop(guard);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let locks = RowLocks::new();
        let _a = locks.lock(RowKey::Balance(UserId(1))).await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.lock(RowKey::Balance(UserId(2)))).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_sweep_keeps_held_rows() {
        let locks = RowLocks::new();
        let held = locks.lock(RowKey::WebhookEvent("evt_1".to_string())).await;
        drop(locks.lock(RowKey::WebhookEvent("evt_2".to_string())).await);
        locks.sweep();
        assert_eq!(locks.len(), 1);
        drop(held);
        locks.sweep();
        assert!(locks.is_empty());
    }
}
