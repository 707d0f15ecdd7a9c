//! Callgate - per-client fixed-window request limiter
//!
//! Each caller, identified by IP address and optionally its user-agent, gets
//! a counter in a shared store that opens with a fixed time-to-live on the
//! first request of a window. Any number of service instances can consult
//! the same store; the store is the only synchronization point.

pub mod config;
pub mod error;
pub mod identity;
pub mod ratelimit;

pub use config::LimiterConfig;
pub use error::{CallgateError, Result};
pub use ratelimit::{CallerIdentity, CounterStore, WindowCounter, WindowSettings};
