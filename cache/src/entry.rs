use crate::policy::ExpirationPolicy;

use std::sync::Arc;

/// A container for a value in the cache, holding its expiration policy.
///
/// Entries are never mutated in place apart from the policy's own expiry
/// instant; a renewed entry replaces the old one in the store.
#[derive(Debug)]
pub(crate) struct CacheEntry<V> {
  /// The user's value. `None` is a cached "null" result.
  value: Option<Arc<V>>,
  policy: Option<ExpirationPolicy>,
}

impl<V> CacheEntry<V> {
  pub(crate) fn new(value: Option<Arc<V>>, policy: Option<ExpirationPolicy>) -> Self {
    Self { value, policy }
  }

  /// Returns the value, resetting a sliding policy first.
  #[inline]
  pub(crate) fn value(&self) -> Option<Arc<V>> {
    if let Some(policy) = &self.policy {
      if policy.can_reset() {
        policy.reset();
      }
    }
    self.value.clone()
  }

  /// Returns the value without touching the policy.
  #[inline]
  pub(crate) fn peek(&self) -> Option<&Arc<V>> {
    self.value.as_ref()
  }

  #[inline]
  pub(crate) fn policy(&self) -> Option<&ExpirationPolicy> {
    self.policy.as_ref()
  }

  #[inline]
  pub(crate) fn can_expire(&self) -> bool {
    self.policy.is_some()
  }

  #[inline]
  pub(crate) fn is_expired(&self) -> bool {
    self.policy.as_ref().is_some_and(ExpirationPolicy::is_expired)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::thread;
  use std::time::Duration;

  #[test]
  fn entry_without_policy_never_expires() {
    let entry = CacheEntry::new(Some(Arc::new(1)), None);
    assert!(!entry.can_expire());
    assert!(!entry.is_expired());
    assert_eq!(entry.value().as_deref(), Some(&1));
  }

  #[test]
  fn reading_value_resets_sliding_policy() {
    let entry = CacheEntry::new(
      Some(Arc::new("v")),
      Some(ExpirationPolicy::sliding(Duration::from_millis(60))),
    );
    for _ in 0..4 {
      thread::sleep(Duration::from_millis(30));
      assert!(entry.value().is_some());
    }
    assert!(!entry.is_expired());

    thread::sleep(Duration::from_millis(80));
    assert!(entry.is_expired());
  }

  #[test]
  fn peek_does_not_reset() {
    let entry = CacheEntry::new(
      Some(Arc::new(7)),
      Some(ExpirationPolicy::sliding(Duration::from_millis(40))),
    );
    thread::sleep(Duration::from_millis(25));
    assert_eq!(entry.peek().map(|v| **v), Some(7));
    thread::sleep(Duration::from_millis(25));
    assert!(entry.is_expired());
  }
}
