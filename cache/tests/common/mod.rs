#![allow(dead_code)]

use std::hash::{BuildHasher, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use expiry_cache::{Cache, CacheBuilder, ExpirationListener, ExpiredEvent, ExpiringEvent};

/// Sweep cadence used by expiration tests.
pub const FAST_SWEEP: Duration = Duration::from_millis(10);

// A custom hasher that uses the integer value of the key as its hash, so
// tests can put keys on known shards.
#[derive(Clone, Default)]
pub struct ShardControllingHasher;
impl BuildHasher for ShardControllingHasher {
  type Hasher = TestHasher;
  fn build_hasher(&self) -> Self::Hasher {
    TestHasher(0)
  }
}
pub struct TestHasher(u64);
impl Hasher for TestHasher {
  fn finish(&self) -> u64 {
    self.0
  }
  fn write(&mut self, _: &[u8]) {
    unimplemented!()
  }
  fn write_i32(&mut self, i: i32) {
    self.0 = i as u64;
  }
}

pub fn build_fast_cache<K, V>() -> Cache<K, V>
where
  K: Eq + std::hash::Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  CacheBuilder::new()
    .expiration_timer_interval(FAST_SWEEP)
    .build()
    .unwrap()
}

pub fn build_sharded_test_cache(shards: usize) -> Cache<i32, String, ShardControllingHasher> {
  CacheBuilder::new()
    .shards(shards)
    .hasher(ShardControllingHasher)
    .expiration_timer_interval(FAST_SWEEP)
    .build()
    .unwrap()
}

/// What a `RecordingListener` saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seen<K> {
  Expiring(K),
  Expired(K),
}

/// Counts and forwards every expiration event it sees.
pub struct RecordingListener<K> {
  pub expiring: Arc<AtomicUsize>,
  pub expired: Arc<AtomicUsize>,
  sender: Mutex<mpsc::Sender<Seen<K>>>,
}

impl<K> RecordingListener<K> {
  pub fn new() -> (Self, mpsc::Receiver<Seen<K>>) {
    let (tx, rx) = mpsc::channel();
    let listener = Self {
      expiring: Arc::new(AtomicUsize::new(0)),
      expired: Arc::new(AtomicUsize::new(0)),
      sender: Mutex::new(tx),
    };
    (listener, rx)
  }
}

impl<K: Clone + Send + Sync, V> ExpirationListener<K, V> for RecordingListener<K> {
  fn on_expiring(&self, event: &mut ExpiringEvent<'_, K, V>) {
    self.expiring.fetch_add(1, Ordering::SeqCst);
    let _ = self
      .sender
      .lock()
      .unwrap()
      .send(Seen::Expiring(event.key().clone()));
  }

  fn on_expired(&self, event: &mut ExpiredEvent<'_, K, V>) {
    self.expired.fetch_add(1, Ordering::SeqCst);
    let _ = self
      .sender
      .lock()
      .unwrap()
      .send(Seen::Expired(event.key().clone()));
  }
}

/// A value that records how often it was disposed.
#[derive(Debug)]
pub struct Resource {
  pub id: u32,
  pub disposed: Arc<AtomicUsize>,
}

impl Resource {
  pub fn new(id: u32) -> (Self, Arc<AtomicUsize>) {
    let disposed = Arc::new(AtomicUsize::new(0));
    (
      Self {
        id,
        disposed: disposed.clone(),
      },
      disposed,
    )
  }
}

impl expiry_cache::Dispose for Resource {
  fn dispose(&self) {
    self.disposed.fetch_add(1, Ordering::SeqCst);
  }
}
