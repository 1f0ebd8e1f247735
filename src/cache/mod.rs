//! Client-side query cache and the invalidation contract used by the refresh policy.
//!
//! - [`DataGroupKey`] names a cache partition; [`MatchMode`] decides whether an
//!   invalidation covers only that key or every key extending it.
//! - [`Invalidate`] is the collaborator seam the refresh policy drives.
//! - [`QueryCache`] is the in-process implementation backed by an LRU.

mod key;
mod query_cache;

pub use key::{DataGroupKey, MatchMode};
pub use query_cache::QueryCache;

use futures::future::BoxFuture;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    /// The fetcher behind a cached query failed.
    #[error("Failed to fetch {key}: {message}")]
    Fetch { key: DataGroupKey, message: String },

    #[error("Cached value for {key} has an unexpected shape: {source}")]
    Decode {
        key: DataGroupKey,
        #[source]
        source: serde_json::Error,
    },

    #[error("Value for {key} could not be stored: {source}")]
    Encode {
        key: DataGroupKey,
        #[source]
        source: serde_json::Error,
    },
}

/// Marks cached entries as needing a refetch.
///
/// Implementations must not panic or block; the returned future resolving
/// to `Err` is the only failure channel.
pub trait Invalidate: Send + Sync {
    /// Invalidate every cached entry whose key equals `key`, or (under
    /// [`MatchMode::Prefix`]) extends it.
    fn invalidate<'a>(
        &'a self,
        key: &'a DataGroupKey,
        mode: MatchMode,
    ) -> BoxFuture<'a, Result<(), CacheError>>;
}
