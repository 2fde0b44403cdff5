use crate::policy::ExpirationPolicy;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

/// Raised by the sweep before an expired entry is removed.
///
/// Setting `cancel` keeps the entry in the cache. The entry is then stored
/// again with [`policy`](Self::policy), which a listener may replace to
/// give the entry a fresh lifetime.
pub struct ExpiringEvent<'a, K, V> {
  key: &'a K,
  value: Option<&'a Arc<V>>,
  policy: Option<ExpirationPolicy>,
  cancel: bool,
}

impl<'a, K, V> ExpiringEvent<'a, K, V> {
  pub(crate) fn new(key: &'a K, value: Option<&'a Arc<V>>, policy: Option<ExpirationPolicy>) -> Self {
    Self {
      key,
      value,
      policy,
      cancel: false,
    }
  }

  pub fn key(&self) -> &K {
    self.key
  }

  /// The cached value. `None` for a cached null result.
  pub fn value(&self) -> Option<&Arc<V>> {
    self.value
  }

  /// The policy the entry keeps if the expiration is cancelled.
  pub fn policy(&self) -> Option<&ExpirationPolicy> {
    self.policy.as_ref()
  }

  /// Replaces the policy used when the expiration is cancelled.
  ///
  /// With `None` the renewed entry gets a policy from the cache's default
  /// policy factory, or keeps living forever if there is none.
  pub fn set_policy(&mut self, policy: Option<ExpirationPolicy>) {
    self.policy = policy;
  }

  pub fn is_cancelled(&self) -> bool {
    self.cancel
  }

  pub fn set_cancel(&mut self, cancel: bool) {
    self.cancel = cancel;
  }

  pub(crate) fn into_policy(self) -> Option<ExpirationPolicy> {
    self.policy
  }
}

impl<K: fmt::Debug, V> fmt::Debug for ExpiringEvent<'_, K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ExpiringEvent")
      .field("key", self.key)
      .field("has_value", &self.value.is_some())
      .field("policy", &self.policy)
      .field("cancel", &self.cancel)
      .finish()
  }
}

/// Raised by the sweep after an expired entry was removed.
///
/// `dispose` starts out as the cache's `dispose_values_on_removal` setting
/// and decides whether the configured disposer runs for this value.
pub struct ExpiredEvent<'a, K, V> {
  key: &'a K,
  value: Option<&'a Arc<V>>,
  dispose: bool,
}

impl<'a, K, V> ExpiredEvent<'a, K, V> {
  pub(crate) fn new(key: &'a K, value: Option<&'a Arc<V>>, dispose: bool) -> Self {
    Self { key, value, dispose }
  }

  pub fn key(&self) -> &K {
    self.key
  }

  pub fn value(&self) -> Option<&Arc<V>> {
    self.value
  }

  pub fn dispose(&self) -> bool {
    self.dispose
  }

  pub fn set_dispose(&mut self, dispose: bool) {
    self.dispose = dispose;
  }
}

impl<K: fmt::Debug, V> fmt::Debug for ExpiredEvent<'_, K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ExpiredEvent")
      .field("key", self.key)
      .field("has_value", &self.value.is_some())
      .field("dispose", &self.dispose)
      .finish()
  }
}

/// A listener that can be registered with the cache to observe and
/// influence time-driven expiration.
///
/// Both callbacks run synchronously on the sweep thread while the entry's
/// key lock is held. Explicit `remove` and `clear` never call them.
pub trait ExpirationListener<K, V>: Send + Sync {
  /// Called before an expired entry is removed. May cancel the removal.
  fn on_expiring(&self, _event: &mut ExpiringEvent<'_, K, V>) {}

  /// Called after an expired entry was removed. May override disposal.
  fn on_expired(&self, _event: &mut ExpiredEvent<'_, K, V>) {}
}

/// Identifies a listener registered with [`Cache::subscribe`](crate::Cache::subscribe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type ListenerList<K, V> = Vec<(ListenerId, Arc<dyn ExpirationListener<K, V>>)>;

/// The observer list.
pub(crate) struct Listeners<K, V> {
  next_id: AtomicU64,
  listeners: RwLock<ListenerList<K, V>>,
}

impl<K, V> Listeners<K, V> {
  pub(crate) fn new() -> Self {
    Self {
      next_id: AtomicU64::new(0),
      listeners: RwLock::new(Vec::new()),
    }
  }

  pub(crate) fn add(&self, listener: Arc<dyn ExpirationListener<K, V>>) -> ListenerId {
    let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
    self.listeners.write().push((id, listener));
    id
  }

  pub(crate) fn remove(&self, id: ListenerId) -> bool {
    let mut guard = self.listeners.write();
    let before = guard.len();
    guard.retain(|(existing, _)| *existing != id);
    guard.len() != before
  }

  /// Copies the current listeners out so callbacks run without the list lock.
  fn snapshot(&self) -> Vec<Arc<dyn ExpirationListener<K, V>>> {
    self
      .listeners
      .read()
      .iter()
      .map(|(_, listener)| Arc::clone(listener))
      .collect()
  }

  pub(crate) fn raise_expiring(&self, event: &mut ExpiringEvent<'_, K, V>) {
    for listener in self.snapshot() {
      listener.on_expiring(event);
    }
  }

  pub(crate) fn raise_expired(&self, event: &mut ExpiredEvent<'_, K, V>) {
    for listener in self.snapshot() {
      listener.on_expired(event);
    }
  }
}
