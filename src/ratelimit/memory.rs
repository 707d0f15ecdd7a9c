//! In-process counter store.
//!
//! Counters live in a single mutex-guarded map and expire lazily against
//! tokio's clock. Only suitable when one process is the sole caller.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

use super::store::CounterStore;
use crate::error::Result;

/// A counter and the instant its window closes.
#[derive(Debug, Clone, Copy)]
struct WindowRecord {
    count: u64,
    expires_at: Instant,
}

impl WindowRecord {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Counter store kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    records: Mutex<HashMap<String, WindowRecord>>,
}

impl MemoryCounterStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired record. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|_, record| !record.is_expired(now));
        before - records.len()
    }

    /// Number of records currently held, expired or not.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn incr_window(&self, key: &str, ttl: Duration) -> Result<u64> {
        let now = Instant::now();
        let mut records = self.records.lock();

        let record = records
            .entry(key.to_string())
            .and_modify(|record| {
                if record.is_expired(now) {
                    *record = WindowRecord {
                        count: 0,
                        expires_at: now + ttl,
                    };
                }
            })
            .or_insert(WindowRecord {
                count: 0,
                expires_at: now + ttl,
            });

        record.count += 1;
        trace!(key = %key, count = record.count, "Incremented in-memory counter");
        Ok(record.count)
    }

    async fn count(&self, key: &str) -> Result<Option<u64>> {
        let now = Instant::now();
        let mut records = self.records.lock();

        match records.get(key).copied() {
            Some(record) if record.is_expired(now) => {
                records.remove(key);
                Ok(None)
            }
            Some(record) => Ok(Some(record.count)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_first_increment_creates_counter() {
        let store = MemoryCounterStore::new();

        assert_eq!(store.count("k").await.unwrap(), None);
        assert_eq!(store.incr_window("k", TTL).await.unwrap(), 1);
        assert_eq!(store.count("k").await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_increments_accumulate() {
        let store = MemoryCounterStore::new();

        for expected in 1..=4 {
            assert_eq!(store.incr_window("k", TTL).await.unwrap(), expected);
        }
        assert_eq!(store.count("k").await.unwrap(), Some(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_is_not_refreshed_by_increments() {
        let store = MemoryCounterStore::new();

        store.incr_window("k", TTL).await.unwrap();
        tokio::time::advance(Duration::from_secs(40)).await;
        store.incr_window("k", TTL).await.unwrap();
        tokio::time::advance(Duration::from_secs(20)).await;

        // 60s after creation the window is gone even though the last
        // increment was only 20s ago.
        assert_eq!(store.count("k").await.unwrap(), None);
        assert_eq!(store.incr_window("k", TTL).await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let store = MemoryCounterStore::new();

        store.incr_window("short", Duration::from_secs(1)).await.unwrap();
        store.incr_window("long", TTL).await.unwrap();
        assert_eq!(store.len(), 2);

        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.count("long").await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let store = MemoryCounterStore::new();

        store.incr_window("a", TTL).await.unwrap();
        store.incr_window("a", TTL).await.unwrap();
        store.incr_window("b", TTL).await.unwrap();

        assert_eq!(store.count("a").await.unwrap(), Some(2));
        assert_eq!(store.count("b").await.unwrap(), Some(1));
    }
}
