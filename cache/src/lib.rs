//! A concurrent, synchronous in-memory cache with per-entry expiration.
//!
//! # Features
//! - **Expiration Policies**: fixed duration, sliding (reset on read),
//!   absolute instant, custom predicates and composites of those.
//! - **At-Most-Once Fetch**: `get_or_fetch` serializes callers per key, so
//!   a missing value is produced by exactly one factory call.
//! - **Per-Key Locking**: operations on different keys never wait on each
//!   other; the entry map itself is sharded.
//! - **Self-Disarming Sweep**: a background timer removes expired entries
//!   and parks itself while nothing in the cache can expire.
//! - **Cancellable Expiration**: listeners see entries before and after the
//!   sweep removes them, can keep them alive with a new policy, and can
//!   decide whether the value is disposed.
//!
//! ```
//! use expiry_cache::{CacheBuilder, FetchOptions};
//! use std::time::Duration;
//!
//! let cache = CacheBuilder::<&str, u32>::new()
//!   .expiration_timer_interval(Duration::from_millis(50))
//!   .build()
//!   .unwrap();
//!
//! cache.add_with("a", 42, FetchOptions::new().expiration(Duration::from_secs(5)));
//! assert_eq!(cache.get(&"a").as_deref(), Some(&42));
//!
//! let fetched = cache.get_or_fetch("b", || Some(7));
//! assert_eq!(fetched.as_deref(), Some(&7));
//! ```

// Public modules that form the API
pub mod builder;
pub mod dispose;
pub mod error;
pub mod handles;
pub mod listener;
pub mod metrics;
pub mod policy;

// Internal, crate-only modules
mod entry;
mod key_lock;
mod shared;
mod store;
mod task;
mod time;

// Re-export the primary user-facing types for convenience
pub use builder::CacheBuilder;
pub use dispose::Dispose;
pub use error::CacheError;
pub use handles::Cache;
pub use listener::{ExpirationListener, ExpiredEvent, ExpiringEvent, ListenerId};
pub use metrics::MetricsSnapshot;
pub use policy::ExpirationPolicy;
pub use shared::FetchOptions;
