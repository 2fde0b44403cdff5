use expiry_cache::{
  CacheBuilder, ExpirationListener, ExpirationPolicy, ExpiredEvent, ExpiringEvent, FetchOptions,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

/// Keeps each session alive for two extra rounds before letting it go.
struct SessionKeeper {
  renewals: AtomicUsize,
}

impl ExpirationListener<String, String> for SessionKeeper {
  fn on_expiring(&self, event: &mut ExpiringEvent<'_, String, String>) {
    let renewals = self.renewals.fetch_add(1, Ordering::SeqCst);
    if renewals < 2 {
      println!("Renewing '{}' (renewal #{})", event.key(), renewals + 1);
      event.set_cancel(true);
      event.set_policy(Some(ExpirationPolicy::duration(Duration::from_millis(300))));
    } else {
      println!("Letting '{}' expire", event.key());
    }
  }

  fn on_expired(&self, event: &mut ExpiredEvent<'_, String, String>) {
    println!(
      "Expired '{}' with value {:?}",
      event.key(),
      event.value().map(|v| v.as_str())
    );
  }
}

fn main() {
  let cache = CacheBuilder::default()
    .expiration_timer_interval(Duration::from_millis(50))
    .expiration_listener(SessionKeeper {
      renewals: AtomicUsize::new(0),
    })
    .build()
    .expect("Failed to build cache");

  cache.add_with(
    "session".to_string(),
    "token-123".to_string(),
    FetchOptions::new().expiration(Duration::from_millis(300)),
  );

  while cache.contains_key(&"session".to_string()) {
    thread::sleep(Duration::from_millis(100));
  }

  println!("\nFinal Metrics: {:#?}", cache.metrics());
  assert_eq!(cache.metrics().expirations_cancelled, 2);
  println!("Sweep armed: {}", cache.is_sweep_armed());
}
