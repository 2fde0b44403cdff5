use crate::entry::CacheEntry;

use core::fmt;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

use crossbeam_utils::CachePadded;
use parking_lot::RwLock;

pub(crate) type ShardMap<K, V, H> = HashMap<K, Arc<CacheEntry<V>>, H>;

/// A helper function to hash a key using a `BuildHasher`.
#[inline]
pub(crate) fn hash_key<K: Hash + ?Sized, H: BuildHasher>(hasher: &H, key: &K) -> u64 {
  hasher.hash_one(key)
}

/// The key to entry map, partitioned into independently locked shards.
///
/// Shard locks are held only for map reads and writes, never across a
/// factory call or a listener. Per-key ordering comes from the key locks.
pub(crate) struct ShardedStore<K, V, H> {
  shards: Box<[CachePadded<RwLock<ShardMap<K, V, H>>>]>,
  hasher: H,
}

impl<K, V, H> fmt::Debug for ShardedStore<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ShardedStore")
      .field("num_shards", &self.shards.len())
      .finish()
  }
}

impl<K, V, H> ShardedStore<K, V, H>
where
  K: Eq + Hash,
  H: BuildHasher + Clone,
{
  /// Creates a store with `num_shards` shards. `num_shards` is a power of two.
  pub(crate) fn new(num_shards: usize, hasher: H) -> Self {
    let shards = (0..num_shards)
      .map(|_| CachePadded::new(RwLock::new(HashMap::with_hasher(hasher.clone()))))
      .collect::<Vec<_>>();

    Self {
      shards: shards.into_boxed_slice(),
      hasher,
    }
  }

  #[inline]
  pub(crate) fn get_shard(&self, key: &K) -> &RwLock<ShardMap<K, V, H>> {
    let hash = hash_key(&self.hasher, key);
    &self.shards[hash as usize & (self.shards.len() - 1)]
  }

  pub(crate) fn get(&self, key: &K) -> Option<Arc<CacheEntry<V>>> {
    self.get_shard(key).read().get(key).cloned()
  }

  pub(crate) fn contains_key(&self, key: &K) -> bool {
    self.get_shard(key).read().contains_key(key)
  }

  pub(crate) fn insert(&self, key: K, entry: Arc<CacheEntry<V>>) -> Option<Arc<CacheEntry<V>>> {
    self.get_shard(&key).write().insert(key, entry)
  }

  pub(crate) fn remove(&self, key: &K) -> Option<Arc<CacheEntry<V>>> {
    self.get_shard(key).write().remove(key)
  }

  /// Returns an iterator over all the shard locks, for whole-cache scans.
  pub(crate) fn iter_shards(&self) -> impl Iterator<Item = &RwLock<ShardMap<K, V, H>>> {
    self.shards.iter().map(|padded| &**padded)
  }

  pub(crate) fn keys(&self) -> Vec<K>
  where
    K: Clone,
  {
    let mut keys = Vec::new();
    for shard in self.iter_shards() {
      keys.extend(shard.read().keys().cloned());
    }
    keys
  }

  pub(crate) fn len(&self) -> usize {
    self.iter_shards().map(|shard| shard.read().len()).sum()
  }

  pub(crate) fn any_can_expire(&self) -> bool {
    self
      .iter_shards()
      .any(|shard| shard.read().values().any(|entry| entry.can_expire()))
  }
}
