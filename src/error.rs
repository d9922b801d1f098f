use std::time::Duration;

/// Errors surfaced across the cache manager boundary.
///
/// There is no `NotFound` variant: a missing entry is represented as
/// `Option::None` from `try_get`, not as an error.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// A distributed-lock acquisition did not complete within its configured timeout.
    #[error("distributed lock acquisition timed out after {0:?}")]
    Timeout(Duration),

    /// The caller-supplied factory failed; the error is carried verbatim.
    #[error("factory failed: {0}")]
    Factory(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A required argument was invalid (e.g. an empty fingerprint).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation was canceled before it could complete.
    #[error("operation was canceled")]
    Canceled,
}

pub type CacheResult<T> = Result<T, CacheError>;
