use expiry_cache::{CacheBuilder, ExpirationPolicy, FetchOptions};
use std::thread;
use std::time::Duration;

fn main() {
  // Sweep expired entries every 250ms.
  let cache = CacheBuilder::default()
    .expiration_timer_interval(Duration::from_millis(250))
    .build()
    .expect("Failed to build cache");

  println!("Adding ('fixed', 100) with a 1-second lifetime.");
  cache.add_with(
    "fixed".to_string(),
    100,
    FetchOptions::new().expiration(Duration::from_secs(1)),
  );

  println!("Fetching 'sliding' with a 1-second sliding lifetime.");
  let value = cache.get_or_fetch_with(
    "sliding".to_string(),
    || {
      println!("  factory called for 'sliding'");
      Some(200)
    },
    FetchOptions::new().policy(ExpirationPolicy::sliding(Duration::from_secs(1))),
  );
  println!("Fetched: {:?}", value);

  for i in 1..=3 {
    thread::sleep(Duration::from_millis(600));
    // Reading the sliding entry pushes its expiry forward.
    let sliding = cache.get(&"sliding".to_string());
    let fixed = cache.get(&"fixed".to_string());
    println!("[{}] sliding = {:?}, fixed = {:?}", i, sliding, fixed);
  }

  println!("\nCache metrics: {:#?}", cache.metrics());
  println!("Sweep armed: {}", cache.is_sweep_armed());
}
