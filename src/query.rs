//! Presentation-facing view of cached queries.
//!
//! Inspired by TanStack Query: a component declares the key it needs by
//! subscribing, and renders from a [`QueryState`] derived from the cache
//! entry. The engine decides whether a network call is needed.
//!
//! # Example
//!
//! ```ignore
//! let mut jobs = client.jobs();
//!
//! // In event loop tick
//! if jobs.poll() {
//!     // State changed, trigger re-render
//! }
//!
//! // In render
//! match jobs.state() {
//!     QueryState::Idle => {}
//!     QueryState::Loading { data } => render_spinner(data),
//!     QueryState::Success(data) => render_data(data),
//!     QueryState::Error { error, data } => render_error(error, data),
//! }
//! ```

use tokio::sync::watch;

use crate::api::ApiError;
use crate::cache::{CacheEntry, FetchStatus, Key};

/// The state of a query
#[derive(Debug, Clone, PartialEq)]
pub enum QueryState<T> {
  /// No fetch attempted
  Idle,
  /// A fetch is in flight; `data` holds the previous value being revalidated
  Loading { data: Option<T> },
  /// Last fetch succeeded.
  ///
  /// An entry invalidated while nobody was subscribed keeps this state until
  /// its next subscription starts the refetch; check
  /// [`Subscription::is_stale`] to tell it apart from fresh data.
  Success(T),
  /// Last fetch failed; `data` holds the last good value, if any
  Error { error: ApiError, data: Option<T> },
}

impl<T> QueryState<T> {
  pub fn is_idle(&self) -> bool {
    matches!(self, QueryState::Idle)
  }

  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading { .. })
  }

  pub fn is_success(&self) -> bool {
    matches!(self, QueryState::Success(_))
  }

  pub fn is_error(&self) -> bool {
    matches!(self, QueryState::Error { .. })
  }

  /// Best data available for display, fresh or not.
  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Success(data) => Some(data),
      QueryState::Loading { data } | QueryState::Error { data, .. } => data.as_ref(),
      QueryState::Idle => None,
    }
  }

  pub fn error(&self) -> Option<&ApiError> {
    match self {
      QueryState::Error { error, .. } => Some(error),
      _ => None,
    }
  }

  pub fn map<U>(self, f: impl Fn(T) -> U) -> QueryState<U> {
    match self {
      QueryState::Idle => QueryState::Idle,
      QueryState::Loading { data } => QueryState::Loading { data: data.map(&f) },
      QueryState::Success(data) => QueryState::Success(f(data)),
      QueryState::Error { error, data } => QueryState::Error {
        error,
        data: data.map(&f),
      },
    }
  }
}

impl<T> QueryState<Option<T>> {
  /// Collapse a projection whose payload may be absent.
  pub fn flatten(self) -> QueryState<T> {
    match self {
      QueryState::Idle | QueryState::Success(None) => QueryState::Idle,
      QueryState::Loading { data } => QueryState::Loading {
        data: data.flatten(),
      },
      QueryState::Success(Some(data)) => QueryState::Success(data),
      QueryState::Error { error, data } => QueryState::Error {
        error,
        data: data.flatten(),
      },
    }
  }
}

/// Derive the presentation state of a cache entry.
///
/// Pure: equal entries always project to equal states.
pub fn project<T: Clone>(entry: &CacheEntry<T>) -> QueryState<T> {
  match (entry.status, &entry.data) {
    (FetchStatus::Idle, _) => QueryState::Idle,
    (FetchStatus::Loading, data) => QueryState::Loading { data: data.clone() },
    (FetchStatus::Success, Some(data)) => QueryState::Success(data.clone()),
    (FetchStatus::Success, None) => QueryState::Idle,
    (FetchStatus::Error, data) => QueryState::Error {
      error: entry
        .error
        .clone()
        .unwrap_or_else(|| ApiError::Network("request failed".to_string())),
      data: data.clone(),
    },
  }
}

/// Handle held by presentation code for one key.
///
/// Dropping the handle ends the subscription; keys without subscribers are
/// refetched lazily after an invalidation instead of immediately.
#[derive(Debug)]
pub struct Subscription<T> {
  key: Key,
  receiver: watch::Receiver<CacheEntry<T>>,
}

impl<T: Clone> Subscription<T> {
  pub(crate) fn new(key: Key, receiver: watch::Receiver<CacheEntry<T>>) -> Self {
    Self { key, receiver }
  }

  pub fn key(&self) -> &Key {
    &self.key
  }

  /// Snapshot of the underlying entry.
  pub fn entry(&self) -> CacheEntry<T> {
    self.receiver.borrow().clone()
  }

  pub fn state(&self) -> QueryState<T> {
    project(&self.receiver.borrow())
  }

  /// Whether the entry is flagged for refetch.
  pub fn is_stale(&self) -> bool {
    self.receiver.borrow().stale
  }

  /// Check for an update without waiting.
  ///
  /// Returns `true` if the entry changed since the last poll.
  /// Call this in your event loop tick handler.
  pub fn poll(&mut self) -> bool {
    match self.receiver.has_changed() {
      Ok(true) => {
        self.receiver.borrow_and_update();
        true
      }
      _ => false,
    }
  }

  /// Wait for the next update. Returns `false` once the entry was removed.
  pub async fn changed(&mut self) -> bool {
    self.receiver.changed().await.is_ok()
  }

  /// Wait until no request is pending, then return the settled state.
  ///
  /// If the entry is removed meanwhile, returns its final state.
  pub async fn settled(&mut self) -> QueryState<T> {
    let settled = match self.receiver.wait_for(|entry| entry.is_settled()).await {
      Ok(entry) => Some(project(&entry)),
      Err(_) => None,
    };
    settled.unwrap_or_else(|| self.state())
  }
}
