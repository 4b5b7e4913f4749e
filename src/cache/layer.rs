//! Query client that coordinates fetching, invalidation and mutations.

use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use super::invalidation::Invalidation;
use super::key::Key;
use super::store::{CacheEntry, CacheStore, FetchStatus};
use super::traits::{FetchPolicy, FetchSource, LoadResult, Loader, RequestId};
use crate::api::ApiError;
use crate::query::{project, QueryState, Subscription};

/// Request issued under the store lock, spawned once the lock is released.
struct PendingRequest<T> {
  key: Key,
  id: RequestId,
  loader: Loader<T>,
}

/// Owner of one cache store, shared by every consumer in a session.
///
/// The store is only written here: by fetch completion and by invalidation.
/// Mutations never write entries directly; they hand their invalidation set
/// to [`QueryClient::invalidate`] after the write succeeded.
pub struct QueryClient<T> {
  store: Arc<Mutex<CacheStore<T>>>,
}

impl<T> Clone for QueryClient<T> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
    }
  }
}

impl<T: Clone + Send + Sync + 'static> Default for QueryClient<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: Clone + Send + Sync + 'static> QueryClient<T> {
  pub fn new() -> Self {
    Self {
      store: Arc::new(Mutex::new(CacheStore::new())),
    }
  }

  fn lock(&self) -> MutexGuard<'_, CacheStore<T>> {
    self.store.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Request data for `key` with the cache-first policy.
  pub fn fetch(&self, key: &Key, loader: Loader<T>) -> FetchSource {
    self.fetch_with(key, loader, FetchPolicy::CacheFirst)
  }

  /// Request data for `key`.
  ///
  /// 1. Loading: attach to the request in flight
  /// 2. Settled and not stale (cache-first only): serve from cache
  /// 3. Otherwise: issue one network call, keeping old data visible
  pub fn fetch_with(&self, key: &Key, loader: Loader<T>, policy: FetchPolicy) -> FetchSource {
    let (source, pending) = {
      let mut store = self.lock();
      store.register(key, loader, policy);
      Self::request(&mut store, key, policy)
    };
    if let Some(pending) = pending {
      self.spawn(pending);
    }
    source
  }

  /// Fetch `key` and return a handle observing its entry.
  pub fn subscribe(&self, key: &Key, loader: Loader<T>) -> Subscription<T> {
    self.subscribe_with(key, loader, FetchPolicy::CacheFirst)
  }

  pub fn subscribe_with(&self, key: &Key, loader: Loader<T>, policy: FetchPolicy) -> Subscription<T> {
    let (receiver, pending) = {
      let mut store = self.lock();
      store.register(key, loader, policy);
      let (_, pending) = Self::request(&mut store, key, policy);
      (store.subscribe_or_insert(key), pending)
    };
    if let Some(pending) = pending {
      self.spawn(pending);
    }
    Subscription::new(key.clone(), receiver)
  }

  /// Observe an existing entry without registering a loader.
  ///
  /// A fresh entry is observed as is. An entry invalidated while nobody was
  /// subscribed is refetched with its registered loader and policy.
  pub fn watch(&self, key: &Key) -> Option<Subscription<T>> {
    let (receiver, pending) = {
      let mut store = self.lock();
      let receiver = store.subscribe(key)?;
      let stale = store
        .get(key)
        .is_some_and(|entry| entry.stale && entry.is_settled());
      let pending = if stale {
        let policy = store.policy(key);
        Self::request(&mut store, key, policy).1
      } else {
        None
      };
      (receiver, pending)
    };
    if let Some(pending) = pending {
      self.spawn(pending);
    }
    Some(Subscription::new(key.clone(), receiver))
  }

  /// Start a new request for `key` even if one is in flight.
  ///
  /// The earlier request's response is discarded when it arrives. Returns
  /// `None` when the key was never fetched.
  pub fn refetch(&self, key: &Key) -> Option<FetchSource> {
    let pending = {
      let mut store = self.lock();
      let loader = store.loader(key)?;
      let id = store.begin_request(key)?;
      PendingRequest {
        key: key.clone(),
        id,
        loader,
      }
    };
    self.spawn(pending);
    Some(FetchSource::Network)
  }

  /// Current projection for `key`; `Idle` when nothing is cached.
  ///
  /// Reading the state does not subscribe, so a stale entry is reported as
  /// cached until something subscribes to it.
  pub fn state(&self, key: &Key) -> QueryState<T> {
    self
      .lock()
      .get(key)
      .map(project)
      .unwrap_or(QueryState::Idle)
  }

  pub fn entry(&self, key: &Key) -> Option<CacheEntry<T>> {
    self.lock().get(key).cloned()
  }

  /// Drop `key` silently. A response in flight for it will be discarded.
  pub fn forget(&self, key: &Key) -> bool {
    self.lock().remove(key, None)
  }

  /// Apply a set of invalidations.
  ///
  /// Stale keys with live subscribers (or a request in flight) are refetched
  /// right away; the rest wait for their next subscription.
  pub fn invalidate(&self, invalidations: &[Invalidation]) {
    let mut started = Vec::new();
    {
      let mut store = self.lock();
      for invalidation in invalidations {
        let key = invalidation.key();
        match invalidation {
          Invalidation::Refetch(_) => {
            if !store.mark_stale(key) {
              continue;
            }
            let in_flight = store.get(key).is_some_and(CacheEntry::is_loading);
            if store.subscriber_count(key) == 0 && !in_flight {
              debug!(key = %key, "Marked stale");
              continue;
            }
            let Some(loader) = store.loader(key) else {
              continue;
            };
            if let Some(id) = store.begin_request(key) {
              started.push(PendingRequest {
                key: key.clone(),
                id,
                loader,
              });
            }
          }
          Invalidation::Remove(_) => {
            let reason = ApiError::NotFound(key.description());
            if store.remove(key, Some(reason)) {
              debug!(key = %key, "Removed");
            }
          }
        }
      }
    }
    for pending in started {
      self.spawn(pending);
    }
  }

  /// Run a write call once and, on success, apply its invalidation set.
  ///
  /// On failure the cache is left untouched and the error is returned.
  pub async fn mutate<R, Fut>(
    &self,
    label: impl Display,
    invalidations: Vec<Invalidation>,
    call: Fut,
  ) -> Result<R, ApiError>
  where
    Fut: Future<Output = Result<R, ApiError>>,
  {
    match call.await {
      Ok(result) => {
        info!(
          mutation = %label,
          invalidated = invalidations.len(),
          "Mutation succeeded"
        );
        self.invalidate(&invalidations);
        Ok(result)
      }
      Err(error) => {
        warn!(mutation = %label, error = %error, "Mutation failed");
        Err(error)
      }
    }
  }

  /// Decide how to satisfy a fetch, starting a request if needed.
  fn request(
    store: &mut CacheStore<T>,
    key: &Key,
    policy: FetchPolicy,
  ) -> (FetchSource, Option<PendingRequest<T>>) {
    let Some(entry) = store.get(key) else {
      return (FetchSource::Cache, None);
    };

    match entry.status {
      FetchStatus::Loading => {
        debug!(key = %key, "Joining request in flight");
        return (FetchSource::InFlight, None);
      }
      FetchStatus::Success | FetchStatus::Error
        if !entry.stale && policy == FetchPolicy::CacheFirst =>
      {
        debug!(key = %key, "Cache hit");
        return (FetchSource::Cache, None);
      }
      _ => {}
    }

    let pending = store.loader(key).and_then(|loader| {
      store.begin_request(key).map(|id| PendingRequest {
        key: key.clone(),
        id,
        loader,
      })
    });
    (FetchSource::Network, pending)
  }

  fn spawn(&self, pending: PendingRequest<T>) {
    let PendingRequest { key, id, loader } = pending;
    info!(key = %key, kind = key.kind().as_str(), request = id.0, "Fetching");

    let future = loader();
    let client = self.clone();
    tokio::spawn(async move {
      let result = future.await;
      client.complete(&key, id, result);
    });
  }

  fn complete(&self, key: &Key, id: RequestId, result: LoadResult<T>) {
    let error = result.as_ref().err().cloned();
    let applied = self.lock().commit(key, id, result);

    match (applied, error) {
      (false, _) => debug!(key = %key, request = id.0, "Discarding superseded response"),
      (true, Some(error)) => warn!(key = %key, request = id.0, error = %error, "Fetch failed"),
      (true, None) => debug!(key = %key, request = id.0, "Fetch succeeded"),
    }
  }
}
