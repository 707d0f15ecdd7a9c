//! Counter store trait for abstracting the shared and local backends.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Trait for counter store implementations.
///
/// The store is the only synchronization point between limiter instances,
/// so every implementation must make `incr_window` atomic per key.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment the counter at `key` and return the new count.
    ///
    /// When the increment creates the counter (the result is 1) its
    /// time-to-live is set to `ttl`. Later increments never touch the TTL.
    async fn incr_window(&self, key: &str, ttl: Duration) -> Result<u64>;

    /// Read the counter at `key` without creating or refreshing it.
    async fn count(&self, key: &str) -> Result<Option<u64>>;
}
