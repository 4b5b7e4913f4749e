//! Core types shared by the cache engine.

use futures::future::BoxFuture;
use std::sync::Arc;

use crate::api::ApiError;

/// Outcome of a single loader invocation.
pub type LoadResult<T> = Result<T, ApiError>;

/// Factory producing the network call for a key.
///
/// The engine keeps the most recently registered loader per key so that an
/// invalidation can refetch without the caller being involved.
pub type Loader<T> = Arc<dyn Fn() -> BoxFuture<'static, LoadResult<T>> + Send + Sync>;

/// Wrap an async closure as a [`Loader`].
pub fn loader<T, F, Fut>(f: F) -> Loader<T>
where
  F: Fn() -> Fut + Send + Sync + 'static,
  Fut: std::future::Future<Output = LoadResult<T>> + Send + 'static,
{
  use futures::FutureExt;
  Arc::new(move || f().boxed())
}

/// Token identifying one outstanding fetch for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(pub u64);

/// How a fetch treats an existing settled entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchPolicy {
  /// Serve settled, non-stale entries without a network call
  #[default]
  CacheFirst,
  /// Always go to the network unless a request is already in flight.
  /// Prior data is cleared when the request starts.
  NetworkOnly,
}

/// Indicates how a fetch request was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
  /// Settled entry served without a network call
  Cache,
  /// Attached to a request already in flight
  InFlight,
  /// A new network call was issued
  Network,
}
