//! Fixed-window rate limiting over a shared counter store.

mod key;
mod limiter;
mod memory;
mod redis;
mod store;

pub use key::{CallerIdentity, RateKey};
pub use limiter::{WindowCounter, WindowSettings};
pub use memory::MemoryCounterStore;
pub use self::redis::RedisCounterStore;
pub use store::CounterStore;
