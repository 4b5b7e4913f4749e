//! In-memory cache store: the single source of truth subscribers observe.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::watch;

use super::key::Key;
use super::traits::{FetchPolicy, LoadResult, Loader, RequestId};
use crate::api::ApiError;

/// Status of the most recent fetch for a key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchStatus {
  /// No fetch attempted yet
  #[default]
  Idle,
  /// A fetch is in flight
  Loading,
  /// Last fetch succeeded
  Success,
  /// Last fetch failed
  Error,
}

/// Cached state for one key.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
  /// Payload of the last successful fetch
  pub data: Option<T>,
  pub status: FetchStatus,
  /// Reason of the last failure; cleared by the next success
  pub error: Option<ApiError>,
  /// When `data` was committed
  pub fetched_at: Option<DateTime<Utc>>,
  /// Request whose response will be accepted, if any
  pub in_flight: Option<RequestId>,
  /// Marked for refetch by an invalidation
  pub stale: bool,
}

impl<T> Default for CacheEntry<T> {
  fn default() -> Self {
    Self {
      data: None,
      status: FetchStatus::Idle,
      error: None,
      fetched_at: None,
      in_flight: None,
      stale: false,
    }
  }
}

impl<T> CacheEntry<T> {
  pub fn is_loading(&self) -> bool {
    self.status == FetchStatus::Loading
  }

  /// Settled means the entry is not waiting on any request.
  pub fn is_settled(&self) -> bool {
    matches!(self.status, FetchStatus::Success | FetchStatus::Error)
  }
}

/// Store-side bookkeeping for one key.
struct Slot<T> {
  entry: CacheEntry<T>,
  tx: watch::Sender<CacheEntry<T>>,
  loader: Option<Loader<T>>,
  policy: FetchPolicy,
}

impl<T: Clone> Slot<T> {
  fn new() -> Self {
    let (tx, _rx) = watch::channel(CacheEntry::default());
    Self {
      entry: CacheEntry::default(),
      tx,
      loader: None,
      policy: FetchPolicy::default(),
    }
  }

  fn publish(&self) {
    self.tx.send_replace(self.entry.clone());
  }
}

/// Mapping from key to cache entry.
///
/// Every method is a complete read-modify-write step; callers hold the store
/// lock for the duration of a call and never across an await point.
pub struct CacheStore<T> {
  slots: HashMap<Key, Slot<T>>,
  next_request: u64,
}

impl<T> Default for CacheStore<T> {
  fn default() -> Self {
    Self {
      slots: HashMap::new(),
      next_request: 0,
    }
  }
}

impl<T: Clone> CacheStore<T> {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, key: &Key) -> Option<&CacheEntry<T>> {
    self.slots.get(key).map(|slot| &slot.entry)
  }

  pub fn contains(&self, key: &Key) -> bool {
    self.slots.contains_key(key)
  }

  /// Create the entry for `key` if missing and record its loader and policy.
  pub fn register(&mut self, key: &Key, loader: Loader<T>, policy: FetchPolicy) {
    let slot = self.slots.entry(key.clone()).or_insert_with(Slot::new);
    slot.loader = Some(loader);
    slot.policy = policy;
  }

  pub fn loader(&self, key: &Key) -> Option<Loader<T>> {
    self.slots.get(key).and_then(|slot| slot.loader.clone())
  }

  pub fn policy(&self, key: &Key) -> FetchPolicy {
    self
      .slots
      .get(key)
      .map(|slot| slot.policy)
      .unwrap_or_default()
  }

  pub fn subscribe(&self, key: &Key) -> Option<watch::Receiver<CacheEntry<T>>> {
    self.slots.get(key).map(|slot| slot.tx.subscribe())
  }

  pub fn subscribe_or_insert(&mut self, key: &Key) -> watch::Receiver<CacheEntry<T>> {
    self
      .slots
      .entry(key.clone())
      .or_insert_with(Slot::new)
      .tx
      .subscribe()
  }

  /// Number of live subscription handles for `key`.
  pub fn subscriber_count(&self, key: &Key) -> usize {
    self
      .slots
      .get(key)
      .map(|slot| slot.tx.receiver_count())
      .unwrap_or(0)
  }

  /// Start a new request for `key`, superseding any request in flight.
  ///
  /// Returns `None` when the key has no entry.
  pub fn begin_request(&mut self, key: &Key) -> Option<RequestId> {
    self.next_request += 1;
    let id = RequestId(self.next_request);

    let slot = self.slots.get_mut(key)?;
    slot.entry.status = FetchStatus::Loading;
    slot.entry.in_flight = Some(id);
    if slot.policy == FetchPolicy::NetworkOnly {
      slot.entry.data = None;
      slot.entry.fetched_at = None;
      slot.entry.error = None;
    }
    slot.publish();
    Some(id)
  }

  /// Apply a loader outcome if `id` is still the current request for `key`.
  ///
  /// Returns `false` when the response was superseded or the entry is gone.
  pub fn commit(&mut self, key: &Key, id: RequestId, result: LoadResult<T>) -> bool {
    let Some(slot) = self.slots.get_mut(key) else {
      return false;
    };
    if slot.entry.in_flight != Some(id) {
      return false;
    }

    let entry = &mut slot.entry;
    entry.in_flight = None;
    entry.stale = false;
    match result {
      Ok(data) => {
        entry.data = Some(data);
        entry.status = FetchStatus::Success;
        entry.error = None;
        entry.fetched_at = Some(Utc::now());
      }
      Err(error) => {
        // Prior data stays visible next to the error
        entry.status = FetchStatus::Error;
        entry.error = Some(error);
      }
    }
    slot.publish();
    true
  }

  /// Flag `key` for refetch without touching its data.
  ///
  /// Returns `false` when the key has no entry.
  pub fn mark_stale(&mut self, key: &Key) -> bool {
    match self.slots.get_mut(key) {
      Some(slot) => {
        slot.entry.stale = true;
        slot.publish();
        true
      }
      None => false,
    }
  }

  /// Drop the entry for `key`.
  ///
  /// With a `reason`, subscribers receive a final error snapshot carrying it
  /// before the channel closes. Any response still in flight is discarded
  /// on arrival because the entry no longer exists.
  pub fn remove(&mut self, key: &Key, reason: Option<ApiError>) -> bool {
    match self.slots.remove(key) {
      Some(slot) => {
        if let Some(error) = reason {
          slot.tx.send_replace(CacheEntry {
            status: FetchStatus::Error,
            error: Some(error),
            ..CacheEntry::default()
          });
        }
        true
      }
      None => false,
    }
  }
}
