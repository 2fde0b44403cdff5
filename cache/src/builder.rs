use crate::dispose::{Dispose, Disposer};
use crate::error::CacheError;
use crate::handles::Cache;
use crate::key_lock::KeyLocks;
use crate::listener::{ExpirationListener, Listeners};
use crate::policy::ExpirationPolicy;
use crate::shared::{CacheShared, PolicyFactory, SharedConfig};
use crate::store::ShardedStore;

use core::fmt;
use std::hash::{BuildHasher, Hash};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

/// The default sweep cadence.
pub const DEFAULT_EXPIRATION_TIMER_INTERVAL: Duration = Duration::from_secs(1);

/// A builder for creating `Cache` instances.
pub struct CacheBuilder<K, V, H = ahash::RandomState> {
  shards: usize,
  hasher: H,
  default_policy: Option<PolicyFactory>,
  store_null_values: bool,
  dispose_values_on_removal: bool,
  disposer: Option<Disposer<V>>,
  expiration_timer_interval: Duration,
  listeners: Vec<Arc<dyn ExpirationListener<K, V>>>,
  _key_marker: PhantomData<K>,
}

// Manual Debug implementation for CacheBuilder.
impl<K, V, H> fmt::Debug for CacheBuilder<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheBuilder")
      .field("shards", &self.shards)
      .field("has_default_policy", &self.default_policy.is_some())
      .field("store_null_values", &self.store_null_values)
      .field("dispose_values_on_removal", &self.dispose_values_on_removal)
      .field("has_disposer", &self.disposer.is_some())
      .field("expiration_timer_interval", &self.expiration_timer_interval)
      .field("listeners", &self.listeners.len())
      .finish_non_exhaustive()
  }
}

// --- General Configuration Methods ---
impl<K, V, H> CacheBuilder<K, V, H> {
  /// Sets the number of shards of the entry map. Rounded up to a power of
  /// two when the cache is built.
  pub fn shards(mut self, shards: usize) -> Self {
    self.shards = shards;
    self
  }

  /// Sets the factory producing a policy for entries stored without one.
  ///
  /// Without a factory such entries never expire.
  pub fn default_expiration_policy<F>(mut self, factory: F) -> Self
  where
    F: Fn() -> ExpirationPolicy + Send + Sync + 'static,
  {
    self.default_policy = Some(Arc::new(factory));
    self
  }

  /// Whether a `None` fetch result is cached. Defaults to `false`, in which
  /// case every fetch for the key calls the factory again.
  pub fn store_null_values(mut self, store: bool) -> Self {
    self.store_null_values = store;
    self
  }

  /// Whether removed and expired values are disposed. Defaults to `false`.
  pub fn dispose_values_on_removal(mut self, dispose: bool) -> Self {
    self.dispose_values_on_removal = dispose;
    self
  }

  /// Sets the function that releases a value leaving the cache.
  pub fn disposer<F>(mut self, disposer: F) -> Self
  where
    F: Fn(&V) + Send + Sync + 'static,
  {
    self.disposer = Some(Arc::new(disposer));
    self
  }

  /// Sets the sweep cadence. Defaults to one second.
  pub fn expiration_timer_interval(mut self, interval: Duration) -> Self {
    self.expiration_timer_interval = interval;
    self
  }

  /// Registers an expiration listener.
  pub fn expiration_listener<L>(mut self, listener: L) -> Self
  where
    L: ExpirationListener<K, V> + 'static,
  {
    self.listeners.push(Arc::new(listener));
    self
  }
}

impl<K, V: Dispose + 'static, H> CacheBuilder<K, V, H> {
  /// Disposes values through their [`Dispose`] implementation when they
  /// leave the cache.
  pub fn dispose_values(self) -> Self {
    self
      .disposer(|value: &V| value.dispose())
      .dispose_values_on_removal(true)
  }
}

// --- Default Constructor ---
impl<K, V, H: BuildHasher + Default> CacheBuilder<K, V, H> {
  /// Creates a new `CacheBuilder` with default settings.
  pub fn new() -> Self {
    Self {
      shards: (num_cpus::get() * 4).max(1).next_power_of_two(),
      hasher: H::default(),
      default_policy: None,
      store_null_values: false,
      dispose_values_on_removal: false,
      disposer: None,
      expiration_timer_interval: DEFAULT_EXPIRATION_TIMER_INTERVAL,
      listeners: Vec::new(),
      _key_marker: PhantomData,
    }
  }
}

impl<K, V> Default for CacheBuilder<K, V, ahash::RandomState> {
  fn default() -> Self {
    Self::new()
  }
}

// --- Build Methods ---
impl<K, V, H> CacheBuilder<K, V, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  H: BuildHasher + Clone + Send + Sync + 'static,
{
  /// Sets the hasher for the cache's keys.
  pub fn hasher(mut self, hasher: H) -> Self {
    self.hasher = hasher;
    self
  }

  /// Builds a synchronous `Cache`.
  pub fn build(self) -> Result<Cache<K, V, H>, CacheError> {
    let shards = self.validate()?;

    let listeners = Listeners::new();
    for listener in self.listeners {
      listeners.add(listener);
    }

    let shared = CacheShared::new(SharedConfig {
      store: ShardedStore::new(shards, self.hasher.clone()),
      key_locks: KeyLocks::new(self.hasher),
      listeners,
      default_policy: self.default_policy,
      store_null_values: self.store_null_values,
      dispose_values_on_removal: self.dispose_values_on_removal,
      disposer: self.disposer,
      timer_interval: self.expiration_timer_interval,
    });
    Ok(Cache { shared })
  }

  /// Validates the builder configuration and returns the effective shard count.
  pub(crate) fn validate(&self) -> Result<usize, CacheError> {
    if self.shards == 0 {
      return Err(CacheError::ZeroShards);
    }
    let shards = self
      .shards
      .checked_next_power_of_two()
      .ok_or(CacheError::TooManyShards(self.shards))?;
    if self.expiration_timer_interval.is_zero() {
      return Err(CacheError::ZeroTimerInterval);
    }
    Ok(shards)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn shards_round_up_to_power_of_two() {
    let builder = CacheBuilder::<u32, u32>::new().shards(5);
    assert_eq!(builder.validate(), Ok(8));
  }

  #[test]
  fn oversized_shard_count_is_rejected() {
    let builder = CacheBuilder::<u32, u32>::new().shards(usize::MAX);
    assert_eq!(builder.validate(), Err(CacheError::TooManyShards(usize::MAX)));
  }

  #[test]
  fn zero_shards_is_rejected() {
    let err = CacheBuilder::<u32, u32>::new().shards(0).build().unwrap_err();
    assert_eq!(err, CacheError::ZeroShards);
  }

  #[test]
  fn zero_interval_is_rejected() {
    let err = CacheBuilder::<u32, u32>::new()
      .expiration_timer_interval(Duration::ZERO)
      .build()
      .unwrap_err();
    assert_eq!(err, CacheError::ZeroTimerInterval);
  }
}
