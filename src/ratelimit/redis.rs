//! Redis-backed counter store.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, Script};
use std::time::Duration;
use tracing::{info, warn};

use super::store::CounterStore;
use crate::error::{CallgateError, Result};

/// Increment and open the window in one server-side step.
///
/// The TTL is only written when INCR created the key. A key found without
/// any TTL (left behind by a writer that died between SET and EXPIRE) is
/// given one so it cannot count forever.
const INCR_WINDOW_SCRIPT: &str = r#"
local count = redis.call('INCR', KEYS[1])
if count == 1 or redis.call('TTL', KEYS[1]) == -1 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return count
"#;

/// Counter store shared by every limiter instance through Redis.
pub struct RedisCounterStore {
    connection: MultiplexedConnection,
    incr_window: Script,
}

impl RedisCounterStore {
    /// Open a multiplexed connection to `url`, giving up after `timeout`.
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::open(url)?;
        let addr = client.get_connection_info().addr.to_string();

        let connection = tokio::time::timeout(timeout, client.get_multiplexed_async_connection())
            .await
            .map_err(|_| {
                warn!(addr = %addr, timeout = ?timeout, "Timed out connecting to store");
                CallgateError::StoreUnavailable(format!(
                    "timed out after {:?} connecting to {}",
                    timeout, addr
                ))
            })?
            .map_err(|e| {
                warn!(addr = %addr, error = %e, "Failed to connect to store");
                CallgateError::from(e)
            })?;

        info!(addr = %addr, "Connected to counter store");
        Ok(Self {
            connection,
            incr_window: Script::new(INCR_WINDOW_SCRIPT),
        })
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn incr_window(&self, key: &str, ttl: Duration) -> Result<u64> {
        let mut connection = self.connection.clone();
        // EXPIRE takes whole seconds; a zero TTL would delete the key outright
        let ttl_secs = ttl.as_secs().max(1);

        let mut invocation = self.incr_window.prepare_invoke();
        invocation.key(key).arg(ttl_secs);
        let count: u64 = invocation.invoke_async(&mut connection).await?;
        Ok(count)
    }

    async fn count(&self, key: &str) -> Result<Option<u64>> {
        let mut connection = self.connection.clone();
        let count: Option<u64> = connection.get(key).await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_url() -> Option<String> {
        std::env::var("CALLGATE_TEST_REDIS_URL").ok()
    }

    #[tokio::test]
    async fn test_connect_to_closed_port_is_store_unavailable() {
        // Port 1 is reserved and nothing listens there.
        let result = RedisCounterStore::connect("redis://127.0.0.1:1/", Duration::from_secs(2)).await;
        assert!(matches!(result, Err(CallgateError::StoreUnavailable(_))));
    }

    #[tokio::test]
    async fn test_invalid_url_is_store_unavailable() {
        let result = RedisCounterStore::connect("not a url", Duration::from_secs(1)).await;
        assert!(matches!(result, Err(CallgateError::StoreUnavailable(_))));
    }

    #[tokio::test]
    #[ignore = "requires a Redis server at CALLGATE_TEST_REDIS_URL"]
    async fn test_incr_window_sets_ttl_once() {
        let url = test_url().expect("CALLGATE_TEST_REDIS_URL not set");
        let store = RedisCounterStore::connect(&url, Duration::from_secs(5))
            .await
            .unwrap();
        let key = format!("callgate:test:{}", std::process::id());
        let mut connection = store.connection.clone();
        let _: () = connection.del(&key).await.unwrap();

        assert_eq!(store.count(&key).await.unwrap(), None);
        assert_eq!(store.incr_window(&key, Duration::from_secs(60)).await.unwrap(), 1);

        // Shrink the TTL by hand; a later increment must leave it alone.
        let _: () = connection.expire(&key, 30).await.unwrap();
        assert_eq!(store.incr_window(&key, Duration::from_secs(60)).await.unwrap(), 2);
        let ttl: i64 = connection.ttl(&key).await.unwrap();
        assert!(ttl <= 30 && ttl > 0);

        assert_eq!(store.count(&key).await.unwrap(), Some(2));
        let _: () = connection.del(&key).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires a Redis server at CALLGATE_TEST_REDIS_URL"]
    async fn test_orphaned_key_gets_ttl() {
        let url = test_url().expect("CALLGATE_TEST_REDIS_URL not set");
        let store = RedisCounterStore::connect(&url, Duration::from_secs(5))
            .await
            .unwrap();
        let key = format!("callgate:test:orphan:{}", std::process::id());
        let mut connection = store.connection.clone();
        let _: () = connection.set(&key, 3).await.unwrap();

        assert_eq!(store.incr_window(&key, Duration::from_secs(60)).await.unwrap(), 4);
        let ttl: i64 = connection.ttl(&key).await.unwrap();
        assert!(ttl > 0);

        let _: () = connection.del(&key).await.unwrap();
    }
}
