//! Generic query cache with request coalescing and invalidation.
//!
//! This module provides a payload-agnostic caching engine that:
//! - Addresses entries by structural [`Key`]s
//! - Coalesces concurrent fetches for a key into one network call
//! - Rejects responses superseded by a newer request for the same key
//! - Marks keys stale after mutations and refetches them for live subscribers
//! - Keeps the last good data visible while revalidating or after a failure

mod invalidation;
mod key;
mod layer;
mod store;
mod traits;

pub use invalidation::Invalidation;
pub use key::{Key, ResourceKind};
pub use layer::QueryClient;
pub use store::{CacheEntry, CacheStore, FetchStatus};
pub use traits::{loader, FetchPolicy, FetchSource, LoadResult, Loader, RequestId};
