use crate::builder::CacheBuilder;
use crate::listener::{ExpirationListener, ListenerId};
use crate::metrics::MetricsSnapshot;
use crate::shared::{CacheShared, FetchOptions};
use crate::CacheError;

use std::convert::Infallible;
use std::hash::{BuildHasher, Hash};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

/// A thread-safe, synchronous cache with per-entry expiration.
///
/// Operations on the same key are serialized by that key's lock; operations
/// on different keys run concurrently. Share the cache between threads by
/// wrapping it in an `Arc`.
#[derive(Debug)]
pub struct Cache<K, V, H = ahash::RandomState> {
  pub(crate) shared: Arc<CacheShared<K, V, H>>,
}

impl<K, V> Cache<K, V, ahash::RandomState>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  /// Creates a cache with the default configuration.
  pub fn new() -> Self {
    // The default configuration always validates.
    match CacheBuilder::default().build() {
      Ok(cache) => cache,
      Err(err) => unreachable!("default cache configuration is invalid: {err}"),
    }
  }
}

impl<K, V> Default for Cache<K, V, ahash::RandomState>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}

impl<K, V, H> Cache<K, V, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  H: BuildHasher + Clone + Send + Sync + 'static,
{
  /// Retrieves a value from the cache.
  ///
  /// Reading an entry with a sliding policy extends its life. An entry that
  /// has expired but was not swept yet is still returned.
  pub fn get(&self, key: &K) -> Option<Arc<V>> {
    self.shared.get(key)
  }

  /// Returns `true` if the cache holds an entry for `key`.
  ///
  /// Expiry is not consulted: an expired entry is reported until the next
  /// sweep removes it.
  pub fn contains_key(&self, key: &K) -> bool {
    self.shared.store.contains_key(key)
  }

  /// Returns the cached value, or calls `fetch` and caches its result.
  ///
  /// For concurrent calls with the same key `fetch` runs at most once; the
  /// other callers wait on the key's lock and receive the cached value.
  /// A `None` result is returned but not cached unless the cache was built
  /// with `store_null_values(true)`.
  pub fn get_or_fetch<F>(&self, key: K, fetch: F) -> Option<Arc<V>>
  where
    F: FnOnce() -> Option<V>,
  {
    self.get_or_fetch_with(key, fetch, FetchOptions::default())
  }

  /// Like [`get_or_fetch`](Self::get_or_fetch), with an explicit policy or
  /// override flag.
  pub fn get_or_fetch_with<F>(&self, key: K, fetch: F, options: FetchOptions) -> Option<Arc<V>>
  where
    F: FnOnce() -> Option<V>,
  {
    let result: Result<_, Infallible> = self.shared.get_or_fetch(key, || Ok(fetch()), options);
    match result {
      Ok(value) => value,
      Err(never) => match never {},
    }
  }

  /// A fallible fetch. An error from `fetch` is returned unchanged and
  /// nothing is cached for the key.
  pub fn try_get_or_fetch_with<E, F>(
    &self,
    key: K,
    fetch: F,
    options: FetchOptions,
  ) -> Result<Option<Arc<V>>, E>
  where
    F: FnOnce() -> Result<Option<V>, E>,
  {
    self.shared.get_or_fetch(key, fetch, options)
  }

  /// Adds `value` unless the key is already cached.
  pub fn add(&self, key: K, value: V) {
    self.add_with(key, value, FetchOptions::default());
  }

  /// Adds `value` with an explicit policy, or replaces an existing entry
  /// when `override_existing` is set.
  pub fn add_with(&self, key: K, value: V, options: FetchOptions) {
    self.get_or_fetch_with(key, move || Some(value), options);
  }

  /// Removes `key` from the cache. Returns `false` if it was absent.
  ///
  /// Expiration listeners are not notified.
  pub fn remove(&self, key: &K) -> bool {
    self.shared.remove(key, None::<fn()>)
  }

  /// Removes `key` and runs `on_remove` inside the key's critical section,
  /// after the entry left the cache and before its value is disposed.
  /// `on_remove` does not run when the key is absent.
  pub fn remove_with<A>(&self, key: &K, on_remove: A) -> bool
  where
    A: FnOnce(),
  {
    self.shared.remove(key, Some(on_remove))
  }

  /// Removes every entry, each one under its own key lock.
  pub fn clear(&self) {
    self.shared.clear();
  }

  /// A snapshot of the cached keys.
  pub fn keys(&self) -> Vec<K> {
    self.shared.store.keys()
  }

  pub fn len(&self) -> usize {
    self.shared.store.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn dispose_values_on_removal(&self) -> bool {
    self
      .shared
      .dispose_values_on_removal
      .load(Ordering::Acquire)
  }

  /// Whether removed and expired values go through the disposer.
  /// An `Expired` listener can override this per entry.
  pub fn set_dispose_values_on_removal(&self, dispose: bool) {
    self
      .shared
      .dispose_values_on_removal
      .store(dispose, Ordering::Release);
  }

  pub fn expiration_timer_interval(&self) -> Duration {
    self.shared.timer_interval()
  }

  /// Changes the sweep cadence. A running timer restarts its wait with the
  /// new interval immediately.
  pub fn set_expiration_timer_interval(&self, interval: Duration) -> Result<(), CacheError> {
    self.shared.set_timer_interval(interval)
  }

  /// Registers an expiration listener.
  pub fn subscribe<L>(&self, listener: L) -> ListenerId
  where
    L: ExpirationListener<K, V> + 'static,
  {
    self.shared.listeners.add(Arc::new(listener))
  }

  /// Unregisters a listener. Returns `false` if the id was unknown.
  pub fn unsubscribe(&self, id: ListenerId) -> bool {
    self.shared.listeners.remove(id)
  }

  /// Whether the background sweep is currently scheduled.
  pub fn is_sweep_armed(&self) -> bool {
    self.shared.is_sweep_armed()
  }

  /// Returns a snapshot of the cache's metrics.
  pub fn metrics(&self) -> MetricsSnapshot {
    self.shared.metrics.snapshot()
  }
}
