use crate::dispose::Disposer;
use crate::entry::CacheEntry;
use crate::error::CacheError;
use crate::key_lock::KeyLocks;
use crate::listener::{ExpiredEvent, ExpiringEvent, Listeners};
use crate::metrics::Metrics;
use crate::policy::ExpirationPolicy;
use crate::store::ShardedStore;
use crate::task::timer::SweepTimer;

use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error, trace};

pub(crate) type PolicyFactory = Arc<dyn Fn() -> ExpirationPolicy + Send + Sync>;

/// Per-call options for fetches and adds.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
  pub(crate) policy: Option<ExpirationPolicy>,
  pub(crate) override_existing: bool,
}

impl FetchOptions {
  pub fn new() -> Self {
    Self::default()
  }

  /// Stores the entry with `policy` instead of the cache's default policy.
  pub fn policy(mut self, policy: ExpirationPolicy) -> Self {
    self.policy = Some(policy);
    self
  }

  /// Stores the entry with a fixed `duration` policy.
  ///
  /// `Duration::ZERO` means "no explicit policy": the cache's default
  /// policy factory, if any, applies instead.
  pub fn expiration(mut self, duration: Duration) -> Self {
    self.policy = if duration.is_zero() {
      None
    } else {
      Some(ExpirationPolicy::duration(duration))
    };
    self
  }

  /// Replaces an existing entry instead of returning it.
  pub fn override_existing(mut self, override_existing: bool) -> Self {
    self.override_existing = override_existing;
    self
  }
}

/// Outcome of the shared removal routine.
enum Removal {
  Absent,
  Removed,
  /// The entry stayed in the cache, either renewed by a listener or
  /// refreshed since the sweep looked at it.
  Kept { can_expire: bool },
}

struct TimerSlot {
  interval: Duration,
  timer: Option<SweepTimer>,
}

/// The internal, thread-safe core of the cache.
pub(crate) struct CacheShared<K, V, H> {
  pub(crate) store: ShardedStore<K, V, H>,
  pub(crate) key_locks: KeyLocks<K, H>,
  pub(crate) listeners: Listeners<K, V>,
  pub(crate) metrics: Metrics,
  pub(crate) default_policy: Option<PolicyFactory>,
  pub(crate) store_null_values: bool,
  pub(crate) dispose_values_on_removal: AtomicBool,
  pub(crate) disposer: Option<Disposer<V>>,
  /// Set while at least one stored entry can expire.
  check_for_expired: AtomicBool,
  /// Bumped under the timer lock every time an expirable entry is stored.
  arm_epoch: AtomicU64,
  /// The coarse lock guarding the sweep timer.
  timer: Mutex<TimerSlot>,
  self_ref: Weak<Self>,
}

/// Everything the builder hands to the core.
pub(crate) struct SharedConfig<K, V, H> {
  pub(crate) store: ShardedStore<K, V, H>,
  pub(crate) key_locks: KeyLocks<K, H>,
  pub(crate) listeners: Listeners<K, V>,
  pub(crate) default_policy: Option<PolicyFactory>,
  pub(crate) store_null_values: bool,
  pub(crate) dispose_values_on_removal: bool,
  pub(crate) disposer: Option<Disposer<V>>,
  pub(crate) timer_interval: Duration,
}

impl<K, V, H> fmt::Debug for CacheShared<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheShared")
      .field("store", &self.store)
      .field("store_null_values", &self.store_null_values)
      .field(
        "check_for_expired",
        &self.check_for_expired.load(Ordering::Relaxed),
      )
      .field("metrics", &self.metrics.snapshot())
      .finish_non_exhaustive()
  }
}

impl<K, V, H> Drop for CacheShared<K, V, H> {
  fn drop(&mut self) {
    if let Some(timer) = self.timer.get_mut().timer.take() {
      timer.stop();
    }
  }
}

impl<K, V, H> CacheShared<K, V, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  H: BuildHasher + Clone + Send + Sync + 'static,
{
  pub(crate) fn new(config: SharedConfig<K, V, H>) -> Arc<Self> {
    Arc::new_cyclic(|self_ref| Self {
      store: config.store,
      key_locks: config.key_locks,
      listeners: config.listeners,
      metrics: Metrics::new(),
      default_policy: config.default_policy,
      store_null_values: config.store_null_values,
      dispose_values_on_removal: AtomicBool::new(config.dispose_values_on_removal),
      disposer: config.disposer,
      check_for_expired: AtomicBool::new(false),
      arm_epoch: AtomicU64::new(0),
      timer: Mutex::new(TimerSlot {
        interval: config.timer_interval,
        timer: None,
      }),
      self_ref: self_ref.clone(),
    })
  }

  pub(crate) fn get(&self, key: &K) -> Option<Arc<V>> {
    // A key that never had a lock was never stored.
    let Some(lock) = self.key_locks.find(key) else {
      Metrics::incr(&self.metrics.misses);
      return None;
    };
    let _guard = lock.lock();

    match self.store.get(key) {
      Some(entry) => {
        Metrics::incr(&self.metrics.hits);
        entry.value()
      }
      None => {
        Metrics::incr(&self.metrics.misses);
        None
      }
    }
  }

  /// Returns the cached value for `key`, or runs `fetch` and stores its
  /// result, all inside the key's critical section.
  pub(crate) fn get_or_fetch<E, F>(
    &self,
    key: K,
    fetch: F,
    options: FetchOptions,
  ) -> Result<Option<Arc<V>>, E>
  where
    F: FnOnce() -> Result<Option<V>, E>,
  {
    let lock = self.key_locks.get_or_create(&key);
    let _guard = lock.lock();

    if !options.override_existing {
      if let Some(entry) = self.store.get(&key) {
        Metrics::incr(&self.metrics.hits);
        return Ok(entry.value());
      }
      Metrics::incr(&self.metrics.misses);
    }

    Metrics::incr(&self.metrics.fetches);
    let value = fetch()?;
    if value.is_none() && !self.store_null_values {
      return Ok(None);
    }

    let policy = options
      .policy
      .or_else(|| self.default_policy.as_ref().map(|factory| factory()));
    let can_expire = policy.is_some();
    let value = value.map(Arc::new);

    let entry = Arc::new(CacheEntry::new(value.clone(), policy));
    match self.store.insert(key, entry) {
      Some(previous) => {
        Metrics::incr(&self.metrics.updates);
        if self.dispose_values_on_removal.load(Ordering::Acquire) {
          self.dispose_value(&previous);
        }
      }
      None => Metrics::incr(&self.metrics.inserts),
    }

    if can_expire {
      self.ensure_sweeping();
    }
    Ok(value)
  }

  /// Explicitly removes `key`. Never raises expiration events.
  pub(crate) fn remove<A>(&self, key: &K, on_remove: Option<A>) -> bool
  where
    A: FnOnce(),
  {
    let Some(lock) = self.key_locks.find(key) else {
      return false;
    };
    let _guard = lock.lock();
    matches!(self.remove_item(key, false, on_remove), Removal::Removed)
  }

  pub(crate) fn clear(&self) {
    let epoch = self.arm_epoch.load(Ordering::SeqCst);
    let keys = self.store.keys();
    let mut removed = 0usize;

    for key in &keys {
      let lock = self.key_locks.get_or_create(key);
      let _guard = lock.lock();
      if let Removal::Removed = self.remove_item(key, false, None::<fn()>) {
        removed += 1;
      }
    }

    debug!(removed, "cache cleared");
    self.update_sweep_state(epoch, self.store.any_can_expire());
  }

  /// The removal routine shared by explicit removal and the sweep.
  ///
  /// Must be called with the key's lock held. With `raise_events` the entry
  /// is only removed if it is still expired, and listeners may cancel.
  fn remove_item<A>(&self, key: &K, raise_events: bool, action: Option<A>) -> Removal
  where
    A: FnOnce(),
  {
    let Some(entry) = self.store.get(key) else {
      return Removal::Absent;
    };

    if raise_events {
      if !entry.is_expired() {
        return Removal::Kept {
          can_expire: entry.can_expire(),
        };
      }

      let mut event = ExpiringEvent::new(key, entry.peek(), entry.policy().cloned());
      self.listeners.raise_expiring(&mut event);

      // A listener may have removed or replaced the entry through the cache.
      match self.store.get(key) {
        Some(current) if Arc::ptr_eq(&current, &entry) => {}
        Some(current) => {
          return Removal::Kept {
            can_expire: current.can_expire(),
          }
        }
        None => return Removal::Absent,
      }

      if event.is_cancelled() {
        let policy = event
          .into_policy()
          .or_else(|| self.default_policy.as_ref().map(|factory| factory()));
        if let Some(policy) = &policy {
          if policy.is_expired() && policy.can_reset() {
            policy.reset();
          }
        }
        let can_expire = policy.is_some();
        let renewed = Arc::new(CacheEntry::new(entry.peek().cloned(), policy));
        self.store.insert(key.clone(), renewed);

        Metrics::incr(&self.metrics.expirations_cancelled);
        debug!(can_expire, "expiration cancelled by listener");
        return Removal::Kept { can_expire };
      }
    }

    self.store.remove(key);
    if let Some(action) = action {
      action();
    }

    let mut dispose = self.dispose_values_on_removal.load(Ordering::Acquire);
    if raise_events {
      let mut event = ExpiredEvent::new(key, entry.peek(), dispose);
      self.listeners.raise_expired(&mut event);
      dispose = event.dispose();
      Metrics::incr(&self.metrics.expirations);
    } else {
      Metrics::incr(&self.metrics.removals);
    }

    if dispose {
      self.dispose_value(&entry);
    }
    Removal::Removed
  }

  fn dispose_value(&self, entry: &CacheEntry<V>) {
    let (Some(disposer), Some(value)) = (&self.disposer, entry.peek()) else {
      return;
    };
    if panic::catch_unwind(AssertUnwindSafe(|| disposer(value))).is_err() {
      error!("cache value disposer panicked");
    }
  }

  /// Scans for expired entries and removes them, raising events.
  pub(crate) fn sweep(&self) {
    if !self.check_for_expired.load(Ordering::Acquire) {
      return;
    }

    let epoch = self.arm_epoch.load(Ordering::SeqCst);
    let mut expired = Vec::new();
    let mut still_expirable = false;

    for shard in self.store.iter_shards() {
      let guard = shard.read();
      for (key, entry) in guard.iter() {
        match panic::catch_unwind(AssertUnwindSafe(|| entry.is_expired())) {
          Ok(true) => expired.push(key.clone()),
          Ok(false) => still_expirable |= entry.can_expire(),
          Err(_) => {
            // A panicking policy is checked again on the next sweep.
            Metrics::incr(&self.metrics.sweep_failures);
            error!("expiration policy panicked during sweep");
            still_expirable = true;
          }
        }
      }
    }

    trace!(expired = expired.len(), "sweeping expired cache entries");

    for key in &expired {
      let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let lock = self.key_locks.get_or_create(key);
        let _guard = lock.lock();
        self.remove_item(key, true, None::<fn()>)
      }));

      match outcome {
        Ok(Removal::Kept { can_expire }) => still_expirable |= can_expire,
        Ok(Removal::Removed | Removal::Absent) => {}
        Err(_) => {
          // The entry may still be there; retry it on the next sweep.
          Metrics::incr(&self.metrics.sweep_failures);
          error!("expiring a cache entry panicked");
          still_expirable = true;
        }
      }
    }

    Metrics::incr(&self.metrics.sweeps);
    self.update_sweep_state(epoch, still_expirable);
  }

  /// Marks the cache as holding expirable entries and arms the timer.
  fn ensure_sweeping(&self) {
    let mut slot = self.timer.lock();
    self.arm_epoch.fetch_add(1, Ordering::SeqCst);
    self.check_for_expired.store(true, Ordering::Release);

    let interval = slot.interval;
    let timer = slot
      .timer
      .get_or_insert_with(|| self.spawn_timer(interval));
    if !timer.is_armed() {
      timer.arm();
      debug!(?interval, "sweep timer armed");
    }
  }

  /// Disarms the timer when nothing can expire any more, unless an
  /// expirable entry was stored since `epoch` was read.
  fn update_sweep_state(&self, epoch: u64, still_expirable: bool) {
    let slot = self.timer.lock();
    if still_expirable || self.arm_epoch.load(Ordering::SeqCst) != epoch {
      return;
    }

    self.check_for_expired.store(false, Ordering::Release);
    if let Some(timer) = &slot.timer {
      if timer.is_armed() {
        timer.disarm();
        debug!("sweep timer disarmed, no expirable entries left");
      }
    }
  }

  fn spawn_timer(&self, interval: Duration) -> SweepTimer {
    let weak = self.self_ref.clone();
    SweepTimer::spawn(interval, move || {
      let Some(shared) = weak.upgrade() else {
        return false;
      };
      if panic::catch_unwind(AssertUnwindSafe(|| shared.sweep())).is_err() {
        error!("cache sweep panicked");
      }
      true
    })
  }

  pub(crate) fn timer_interval(&self) -> Duration {
    self.timer.lock().interval
  }

  pub(crate) fn set_timer_interval(&self, interval: Duration) -> Result<(), CacheError> {
    if interval.is_zero() {
      return Err(CacheError::ZeroTimerInterval);
    }

    let mut slot = self.timer.lock();
    slot.interval = interval;
    if let Some(timer) = &slot.timer {
      timer.reschedule(interval);
      debug!(?interval, "sweep timer rescheduled");
    }
    Ok(())
  }

  pub(crate) fn is_sweep_armed(&self) -> bool {
    self
      .timer
      .lock()
      .timer
      .as_ref()
      .is_some_and(SweepTimer::is_armed)
  }
}
