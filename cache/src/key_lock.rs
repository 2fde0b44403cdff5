use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

use parking_lot::{ReentrantMutex, RwLock};

pub(crate) type KeyLock = Arc<ReentrantMutex<()>>;

/// A registry of per-key locks.
///
/// Locks are created lazily on first use of a key and are never removed, so
/// a key always maps to the same lock object for the life of the cache.
/// The locks are reentrant: a factory or listener running inside a key's
/// critical section may call back into the cache for the same key.
pub(crate) struct KeyLocks<K, H> {
  locks: RwLock<HashMap<K, KeyLock, H>>,
}

impl<K, H> KeyLocks<K, H>
where
  K: Eq + Hash + Clone,
  H: BuildHasher,
{
  pub(crate) fn new(hasher: H) -> Self {
    Self {
      locks: RwLock::new(HashMap::with_hasher(hasher)),
    }
  }

  /// Returns the existing lock for `key`, if one was ever created.
  pub(crate) fn find(&self, key: &K) -> Option<KeyLock> {
    self.locks.read().get(key).cloned()
  }

  /// Returns the lock for `key`, creating it if absent.
  pub(crate) fn get_or_create(&self, key: &K) -> KeyLock {
    if let Some(lock) = self.find(key) {
      return lock;
    }
    self
      .locks
      .write()
      .entry(key.clone())
      .or_insert_with(|| Arc::new(ReentrantMutex::new(())))
      .clone()
  }

  #[cfg(test)]
  pub(crate) fn len(&self) -> usize {
    self.locks.read().len()
  }
}
