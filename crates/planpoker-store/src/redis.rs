//! Redis-compatible [`Store`] using `fred`.
//!
//! Every command runs under a timeout so that an unreachable server turns
//! into a [`StoreError::Timeout`] instead of a stalled room operation.

use std::future::Future;
use std::time::Duration;

use fred::prelude::*;
use fred::types::{Expiration, Key};
use futures_util::TryStreamExt;

use crate::{Store, StoreError};

/// Keys requested per `SCAN` page when listing.
const SCAN_PAGE: u32 = 100;

/// Connection handle to a Redis-compatible server.
///
/// Cloning is cheap; clones share the underlying connection.
#[derive(Clone)]
pub struct RedisStore {
    client: Client,
    timeout: Duration,
}

impl RedisStore {
    /// Connects to the server at `url` (`redis://host:port/db`).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if the URL cannot be parsed,
    /// [`StoreError::Timeout`] if the connection is not up within
    /// `timeout`, and [`StoreError::Redis`] if it fails outright.
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let config = Config::from_url(url)
            .map_err(|e| StoreError::Config(format!("invalid Redis URL: {e}")))?;
        let client = Builder::from_config(config).build()?;

        tokio::time::timeout(timeout, client.init())
            .await
            .map_err(|_| StoreError::Timeout("connect"))??;

        tracing::info!("connected to Redis");
        Ok(Self { client, timeout })
    }

    async fn bounded<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = Result<T, fred::error::Error>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => {
                tracing::warn!(op, timeout_ms = self.timeout.as_millis() as u64, "store command timed out");
                Err(StoreError::Timeout(op))
            }
        }
    }
}

impl Store for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.bounded("get", self.client.get::<Option<String>, _>(key))
            .await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let expire = ttl.map(|ttl| Expiration::PX(ttl.as_millis() as i64));
        self.bounded(
            "set",
            self.client.set::<(), _, _>(key, value, expire, None, false),
        )
        .await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let removed: u32 = self.bounded("delete", self.client.del(key)).await?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let count: u32 = self.bounded("exists", self.client.exists(key)).await?;
        Ok(count > 0)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let keys: Vec<Key> = self
            .bounded(
                "keys",
                self.client
                    .scan_buffered(pattern, Some(SCAN_PAGE), None)
                    .try_collect(),
            )
            .await?;
        let mut keys: Vec<String> = keys.into_iter().filter_map(Key::into_string).collect();
        keys.sort();
        keys.dedup();
        Ok(keys)
    }
}
