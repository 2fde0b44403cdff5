mod common;

use common::{build_fast_cache, RecordingListener, Seen, FAST_SWEEP};
use expiry_cache::{
  Cache, CacheBuilder, ExpirationListener, ExpirationPolicy, ExpiredEvent, ExpiringEvent,
  FetchOptions,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const SHORT_TTL: Duration = Duration::from_millis(50);

fn short_lived() -> FetchOptions {
  FetchOptions::new().expiration(SHORT_TTL)
}

/// Cancels expiration and hands the entry a new lifetime.
struct Renewer {
  renewals: Arc<AtomicUsize>,
  lifetime: Duration,
}

impl ExpirationListener<i32, String> for Renewer {
  fn on_expiring(&self, event: &mut ExpiringEvent<'_, i32, String>) {
    self.renewals.fetch_add(1, Ordering::SeqCst);
    event.set_cancel(true);
    event.set_policy(Some(ExpirationPolicy::duration(self.lifetime)));
  }
}

#[test]
fn test_sync_sweep_raises_expiring_then_expired() {
  let (listener, rx) = RecordingListener::new();
  let cache = CacheBuilder::<i32, String>::new()
    .expiration_timer_interval(FAST_SWEEP)
    .expiration_listener(listener)
    .build()
    .unwrap();

  cache.add_with(1, "one".to_string(), short_lived());

  let first = rx.recv_timeout(Duration::from_secs(2)).unwrap();
  let second = rx.recv_timeout(Duration::from_secs(2)).unwrap();
  assert_eq!(first, Seen::Expiring(1));
  assert_eq!(second, Seen::Expired(1));
  assert!(!cache.contains_key(&1));
}

#[test]
fn test_sync_explicit_remove_bypasses_events() {
  let (listener, _rx) = RecordingListener::new();
  let expiring = listener.expiring.clone();
  let expired = listener.expired.clone();

  let cache: Cache<i32, String> = build_fast_cache();
  cache.subscribe(listener);

  cache.add_with(1, "one".to_string(), short_lived());
  assert!(cache.remove(&1));
  cache.add_with(2, "two".to_string(), short_lived());
  cache.clear();

  thread::sleep(SHORT_TTL * 4);
  assert_eq!(expiring.load(Ordering::SeqCst), 0);
  assert_eq!(expired.load(Ordering::SeqCst), 0);

  // The same kind of entry removed by the sweep raises both events.
  cache.add_with(3, "three".to_string(), short_lived());
  thread::sleep(SHORT_TTL * 4);
  assert_eq!(expiring.load(Ordering::SeqCst), 1);
  assert_eq!(expired.load(Ordering::SeqCst), 1);
}

#[test]
fn test_sync_cancelled_expiration_keeps_entry() {
  let renewals = Arc::new(AtomicUsize::new(0));
  let cache = CacheBuilder::<i32, String>::new()
    .expiration_timer_interval(FAST_SWEEP)
    .expiration_listener(Renewer {
      renewals: renewals.clone(),
      lifetime: Duration::from_secs(60),
    })
    .build()
    .unwrap();

  cache.add_with(1, "one".to_string(), short_lived());
  thread::sleep(SHORT_TTL * 4);

  assert_eq!(renewals.load(Ordering::SeqCst), 1, "renewed exactly once");
  assert!(cache.contains_key(&1));
  assert_eq!(cache.get(&1).as_deref().map(String::as_str), Some("one"));

  let metrics = cache.metrics();
  assert_eq!(metrics.expirations_cancelled, 1);
  assert_eq!(metrics.expirations, 0);
  assert!(cache.is_sweep_armed(), "renewed entry can still expire");
}

#[test]
fn test_sync_cancel_with_no_policy_keeps_entry_forever() {
  struct KeepForever;
  impl ExpirationListener<i32, String> for KeepForever {
    fn on_expiring(&self, event: &mut ExpiringEvent<'_, i32, String>) {
      event.set_cancel(true);
      event.set_policy(None);
    }
  }

  let cache: Cache<i32, String> = build_fast_cache();
  cache.subscribe(KeepForever);
  cache.add_with(1, "one".to_string(), short_lived());

  thread::sleep(SHORT_TTL * 4);
  assert!(cache.contains_key(&1));
  assert!(!cache.is_sweep_armed(), "nothing can expire any more");
}

#[test]
fn test_sync_cancel_with_no_policy_falls_back_to_default_policy() {
  struct KeepWithDefault(Arc<AtomicUsize>);
  impl ExpirationListener<i32, String> for KeepWithDefault {
    fn on_expiring(&self, event: &mut ExpiringEvent<'_, i32, String>) {
      self.0.fetch_add(1, Ordering::SeqCst);
      event.set_cancel(true);
      event.set_policy(None);
    }
  }

  let renewals = Arc::new(AtomicUsize::new(0));
  let cache = CacheBuilder::<i32, String>::new()
    .expiration_timer_interval(FAST_SWEEP)
    .default_expiration_policy(|| ExpirationPolicy::duration(Duration::from_secs(60)))
    .expiration_listener(KeepWithDefault(renewals.clone()))
    .build()
    .unwrap();

  cache.add_with(1, "one".to_string(), short_lived());
  thread::sleep(SHORT_TTL * 4);

  assert!(cache.contains_key(&1));
  assert_eq!(renewals.load(Ordering::SeqCst), 1, "renewed with the default lifetime");
  assert!(cache.is_sweep_armed(), "the default policy can still expire");
}

#[test]
fn test_sync_cancel_without_new_policy_is_offered_again() {
  struct CancelOnly(Arc<AtomicUsize>);
  impl ExpirationListener<i32, String> for CancelOnly {
    fn on_expiring(&self, event: &mut ExpiringEvent<'_, i32, String>) {
      self.0.fetch_add(1, Ordering::SeqCst);
      event.set_cancel(true);
    }
  }

  let offers = Arc::new(AtomicUsize::new(0));
  let cache: Cache<i32, String> = build_fast_cache();
  cache.subscribe(CancelOnly(offers.clone()));
  cache.add_with(1, "one".to_string(), short_lived());

  thread::sleep(SHORT_TTL * 6);
  assert!(cache.contains_key(&1));
  assert!(
    offers.load(Ordering::SeqCst) >= 2,
    "a fixed policy that stays expired is offered on every sweep"
  );
}

#[test]
fn test_sync_unsubscribe_stops_notifications() {
  let (listener, _rx) = RecordingListener::new();
  let expiring = listener.expiring.clone();

  let cache: Cache<i32, String> = build_fast_cache();
  let id = cache.subscribe(listener);
  assert!(cache.unsubscribe(id));
  assert!(!cache.unsubscribe(id));

  cache.add_with(1, "one".to_string(), short_lived());
  thread::sleep(SHORT_TTL * 4);
  assert!(!cache.contains_key(&1));
  assert_eq!(expiring.load(Ordering::SeqCst), 0);
}

#[test]
fn test_sync_panicking_listener_does_not_stop_sweep() {
  struct PanicsOnOne;
  impl ExpirationListener<i32, String> for PanicsOnOne {
    fn on_expiring(&self, event: &mut ExpiringEvent<'_, i32, String>) {
      if *event.key() == 1 {
        panic!("listener failure for key 1");
      }
    }
  }

  let cache: Cache<i32, String> = build_fast_cache();
  cache.subscribe(PanicsOnOne);
  cache.add_with(1, "one".to_string(), short_lived());
  cache.add_with(2, "two".to_string(), short_lived());

  thread::sleep(SHORT_TTL * 4);
  assert!(!cache.contains_key(&2), "other keys still expire");
  assert!(cache.contains_key(&1), "failed removal leaves the entry");
  assert!(cache.metrics().sweep_failures >= 1);
  assert!(cache.is_sweep_armed(), "the failed key is retried");
}

#[test]
fn test_sync_listener_may_use_cache_for_same_key() {
  struct Refetcher(Arc<Cache<i32, String>>);
  impl ExpirationListener<i32, String> for Refetcher {
    fn on_expired(&self, event: &mut ExpiredEvent<'_, i32, String>) {
      // The key's lock is held by the sweep; reentry must not deadlock.
      assert!(!self.0.contains_key(event.key()));
    }
  }

  let cache: Arc<Cache<i32, String>> = Arc::new(build_fast_cache());
  let id = cache.subscribe(Refetcher(cache.clone()));
  cache.add_with(1, "one".to_string(), short_lived());

  thread::sleep(SHORT_TTL * 4);
  assert!(!cache.contains_key(&1));
  // Break the Arc cycle through the listener.
  cache.unsubscribe(id);
}
