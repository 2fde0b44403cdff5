use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crossbeam_utils::CachePadded;

/// A thread-safe, internal metrics collector for the cache.
/// All fields are atomic to allow for lock-free updates.
#[derive(Debug)]
pub(crate) struct Metrics {
  // --- Lookups ---
  pub(crate) hits: CachePadded<AtomicU64>,
  pub(crate) misses: CachePadded<AtomicU64>,

  // --- Writes ---
  pub(crate) fetches: CachePadded<AtomicU64>,
  pub(crate) inserts: CachePadded<AtomicU64>,
  pub(crate) updates: CachePadded<AtomicU64>,
  pub(crate) removals: CachePadded<AtomicU64>,

  // --- Expiration ---
  pub(crate) expirations: CachePadded<AtomicU64>,
  pub(crate) expirations_cancelled: CachePadded<AtomicU64>,
  pub(crate) sweeps: CachePadded<AtomicU64>,
  pub(crate) sweep_failures: CachePadded<AtomicU64>,

  created_at: Instant,
}

impl Default for Metrics {
  fn default() -> Self {
    Self {
      hits: CachePadded::new(AtomicU64::new(0)),
      misses: CachePadded::new(AtomicU64::new(0)),
      fetches: CachePadded::new(AtomicU64::new(0)),
      inserts: CachePadded::new(AtomicU64::new(0)),
      updates: CachePadded::new(AtomicU64::new(0)),
      removals: CachePadded::new(AtomicU64::new(0)),
      expirations: CachePadded::new(AtomicU64::new(0)),
      expirations_cancelled: CachePadded::new(AtomicU64::new(0)),
      sweeps: CachePadded::new(AtomicU64::new(0)),
      sweep_failures: CachePadded::new(AtomicU64::new(0)),
      created_at: Instant::now(),
    }
  }
}

impl Metrics {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  #[inline]
  pub(crate) fn incr(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
  }

  /// Creates a point-in-time snapshot of the current metrics.
  pub(crate) fn snapshot(&self) -> MetricsSnapshot {
    let hits = self.hits.load(Ordering::Relaxed);
    let misses = self.misses.load(Ordering::Relaxed);
    let total_lookups = hits + misses;

    MetricsSnapshot {
      hits,
      misses,
      hit_ratio: if total_lookups == 0 {
        0.0
      } else {
        hits as f64 / total_lookups as f64
      },
      fetches: self.fetches.load(Ordering::Relaxed),
      inserts: self.inserts.load(Ordering::Relaxed),
      updates: self.updates.load(Ordering::Relaxed),
      removals: self.removals.load(Ordering::Relaxed),
      expirations: self.expirations.load(Ordering::Relaxed),
      expirations_cancelled: self.expirations_cancelled.load(Ordering::Relaxed),
      sweeps: self.sweeps.load(Ordering::Relaxed),
      sweep_failures: self.sweep_failures.load(Ordering::Relaxed),
      uptime_secs: self.created_at.elapsed().as_secs(),
    }
  }
}

/// A point-in-time, public-facing snapshot of the cache's metrics.
#[derive(Clone)]
pub struct MetricsSnapshot {
  /// Lookups (`get` and fetch calls) that found the key.
  pub hits: u64,
  /// Lookups that did not find the key.
  pub misses: u64,
  /// The cache hit ratio (hits / (hits + misses)).
  pub hit_ratio: f64,
  /// The number of times a fetch factory was invoked.
  pub fetches: u64,
  /// Entries stored for a key that was absent.
  pub inserts: u64,
  /// Entries that replaced an existing one via `override_existing`.
  pub updates: u64,
  /// Entries removed through `remove` or `clear`.
  pub removals: u64,
  /// Entries removed by the sweep.
  pub expirations: u64,
  /// Expirations cancelled by a listener.
  pub expirations_cancelled: u64,
  /// Completed sweep runs.
  pub sweeps: u64,
  /// Keys whose expiration panicked inside the sweep.
  pub sweep_failures: u64,
  /// The number of seconds the cache has been running.
  pub uptime_secs: u64,
}

impl fmt::Debug for MetricsSnapshot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MetricsSnapshot")
      .field("hits", &self.hits)
      .field("misses", &self.misses)
      .field("hit_ratio", &format!("{:.2}%", self.hit_ratio * 100.0))
      .field("fetches", &self.fetches)
      .field("inserts", &self.inserts)
      .field("updates", &self.updates)
      .field("removals", &self.removals)
      .field("expirations", &self.expirations)
      .field("expirations_cancelled", &self.expirations_cancelled)
      .field("sweeps", &self.sweeps)
      .field("sweep_failures", &self.sweep_failures)
      .field("uptime_secs", &self.uptime_secs)
      .finish()
  }
}
