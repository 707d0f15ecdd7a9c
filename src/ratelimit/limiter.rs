//! Fixed-window counter over a shared store.

use std::time::Duration;
use tracing::{debug, trace, warn};

use super::key::{CallerIdentity, RateKey};
use super::redis::RedisCounterStore;
use super::store::CounterStore;
use crate::config::LimiterConfig;
use crate::error::Result;

/// Settings for a window counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSettings {
    /// The post-increment count at which requests start being denied
    pub max_calls_limit: u64,
    /// Window length, fixed when the window opens
    pub window: Duration,
    /// Whether the user-agent is part of the rate key
    pub include_user_agent: bool,
}

impl From<&LimiterConfig> for WindowSettings {
    fn from(config: &LimiterConfig) -> Self {
        Self {
            max_calls_limit: config.max_calls_limit,
            window: config.window(),
            include_user_agent: config.user_agent,
        }
    }
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self::from(&LimiterConfig::default())
    }
}

/// Per-caller fixed-window limiter.
///
/// Holds no counting state of its own; all state lives in the store, so any
/// number of instances across processes can share one store.
pub struct WindowCounter<S: CounterStore> {
    store: S,
    settings: WindowSettings,
}

impl WindowCounter<RedisCounterStore> {
    /// Connect to the store described by `config`.
    pub async fn connect(config: &LimiterConfig) -> Result<Self> {
        config.validate()?;
        let store = RedisCounterStore::connect(&config.store_url(), config.connect_timeout()).await?;
        Ok(Self::new(store, WindowSettings::from(config)))
    }
}

impl<S: CounterStore> WindowCounter<S> {
    /// Create a window counter over an existing store handle.
    pub fn new(store: S, settings: WindowSettings) -> Self {
        Self { store, settings }
    }

    /// Count this request and decide whether to admit it.
    ///
    /// Returns `Ok(false)` once the caller's count for the current window
    /// reaches the limit. The request that opens a window is always
    /// admitted; after that, the request whose increment makes the count
    /// equal to `max_calls_limit` is the first one denied. Store failures
    /// are returned as errors, never as a decision.
    pub async fn check(&self, identity: &CallerIdentity) -> Result<bool> {
        let key = RateKey::derive(identity, self.settings.include_user_agent)?;

        let count = self
            .store
            .incr_window(key.as_str(), self.settings.window)
            .await
            .map_err(|e| {
                warn!(key = %key, error = %e, "Counter store increment failed");
                e
            })?;

        trace!(key = %key, count = count, limit = self.settings.max_calls_limit, "Checked window");

        if count == 1 {
            debug!(
                key = %key,
                window = ?self.settings.window,
                "Opened rate limit window"
            );
            return Ok(true);
        }

        if count >= self.settings.max_calls_limit {
            debug!(
                key = %key,
                count = count,
                limit = self.settings.max_calls_limit,
                "Rate limit exceeded"
            );
            return Ok(false);
        }

        Ok(true)
    }

    /// Requests counted for the caller in the current window, 0 if none.
    ///
    /// This never creates a counter or touches its expiry.
    pub async fn total(&self, identity: &CallerIdentity) -> Result<u64> {
        let key = RateKey::derive(identity, self.settings.include_user_agent)?;

        let count = self.store.count(key.as_str()).await.map_err(|e| {
            warn!(key = %key, error = %e, "Counter store read failed");
            e
        })?;

        trace!(key = %key, count = ?count, "Read window total");
        Ok(count.unwrap_or(0))
    }

    /// Get the settings for this counter.
    pub fn settings(&self) -> WindowSettings {
        self.settings
    }

    /// Get the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }
}
