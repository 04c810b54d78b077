/// Errors that can occur in the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The Redis client reported a failure.
    #[cfg(feature = "redis")]
    #[error("redis error: {0}")]
    Redis(#[from] fred::error::Error),

    /// The operation did not complete within the configured timeout.
    #[error("store operation timed out: {0}")]
    Timeout(&'static str),

    /// The store could not be configured (bad URL and the like).
    #[error("store configuration error: {0}")]
    Config(String),
}
