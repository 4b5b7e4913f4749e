use super::key::Key;

/// Effect a successful mutation has on one cached key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidation {
  /// Mark stale and refetch; old data stays visible meanwhile
  Refetch(Key),
  /// The entity behind the key is gone; drop the entry
  Remove(Key),
}

impl Invalidation {
  pub fn key(&self) -> &Key {
    match self {
      Invalidation::Refetch(key) | Invalidation::Remove(key) => key,
    }
  }
}
