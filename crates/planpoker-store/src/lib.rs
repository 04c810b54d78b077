//! Room snapshot storage.
//!
//! The room engine persists through the narrow [`Store`] trait: string
//! values under string keys, each with an optional time-to-live. Two
//! implementations ship:
//!
//! - [`MemoryStore`]: a process-local map, used in development and tests.
//! - [`RedisStore`]: any Redis-compatible server, via `fred`.
//!
//! # Feature Flags
//!
//! - `redis` (default): enables [`RedisStore`]

mod error;
mod memory;
#[cfg(feature = "redis")]
mod redis;

pub use error::StoreError;
pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use redis::RedisStore;

use std::future::Future;
use std::time::Duration;

/// A key-value store with per-key expiry.
///
/// Methods return `impl Future + Send` rather than being declared
/// `async fn` so that generic callers can hold the futures across
/// `tokio::spawn` boundaries. Implementors may still write `async fn`.
///
/// Writing a key replaces both its value and its expiry. Reads never
/// extend a key's lifetime.
pub trait Store: Send + Sync + 'static {
    /// Returns the value at `key`, or `None` if absent or expired.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;

    /// Stores `value` at `key`. With `ttl`, the key expires after that
    /// long; without, it never expires.
    fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Removes `key`. Returns `true` if it existed.
    fn delete(&self, key: &str) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Returns `true` if `key` is present and unexpired.
    fn exists(&self, key: &str) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Lists live keys matching a glob `pattern` (`*` and `?`).
    fn keys(&self, pattern: &str) -> impl Future<Output = Result<Vec<String>, StoreError>> + Send;
}
