//! Expiration policies decide when a cached entry becomes stale.
//!
//! A policy is attached to an entry when it is stored. The sweep asks the
//! policy whether it has expired; reads ask whether it can be reset and, for
//! sliding policies, push its expiry instant forward.
//!
//! ```
//! use expiry_cache::ExpirationPolicy;
//! use std::time::Duration;
//!
//! let fixed = ExpirationPolicy::duration(Duration::from_secs(30));
//! assert!(!fixed.can_reset());
//!
//! let sliding = ExpirationPolicy::sliding(Duration::from_secs(30));
//! assert!(sliding.can_reset());
//! assert!(!sliding.is_expired());
//! ```

use crate::time;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

type ExpiredFn = Arc<dyn Fn() -> bool + Send + Sync>;
type ResetFn = Arc<dyn Fn() + Send + Sync>;

/// A rule determining when a cached entry becomes stale.
pub struct ExpirationPolicy {
  kind: PolicyKind,
}

enum PolicyKind {
  /// Expires `duration` after creation, or after the last reset when sliding.
  Duration {
    duration: Duration,
    sliding: bool,
    /// Nanoseconds since the cache epoch.
    expires_at: AtomicU64,
  },
  /// Expires at a fixed instant.
  Absolute { expires_at: u64 },
  /// Expiry decided by a user predicate.
  Custom {
    is_expired: ExpiredFn,
    on_reset: Option<ResetFn>,
  },
  Composite {
    policies: Vec<ExpirationPolicy>,
    require_all: bool,
  },
}

impl ExpirationPolicy {
  /// A policy that expires a fixed `duration` after it is created.
  ///
  /// Reading the entry does not extend its life.
  pub fn duration(duration: Duration) -> Self {
    Self::from_duration(duration, false)
  }

  /// A sliding policy: every read of the entry pushes the expiry instant
  /// to `now + duration`.
  pub fn sliding(duration: Duration) -> Self {
    Self::from_duration(duration, true)
  }

  fn from_duration(duration: Duration, sliding: bool) -> Self {
    let expires_at = time::now_nanos().saturating_add(time::duration_to_nanos(duration));
    Self {
      kind: PolicyKind::Duration {
        duration,
        sliding,
        expires_at: AtomicU64::new(expires_at),
      },
    }
  }

  /// A policy that expires at `instant`.
  pub fn absolute(instant: Instant) -> Self {
    Self {
      kind: PolicyKind::Absolute {
        expires_at: time::instant_to_nanos(instant),
      },
    }
  }

  /// A policy whose expiry is decided by `is_expired`. It cannot be reset.
  pub fn custom<F>(is_expired: F) -> Self
  where
    F: Fn() -> bool + Send + Sync + 'static,
  {
    Self {
      kind: PolicyKind::Custom {
        is_expired: Arc::new(is_expired),
        on_reset: None,
      },
    }
  }

  /// A custom policy that can be reset. `on_reset` runs every time the
  /// entry holding this policy is read.
  pub fn custom_resettable<F, R>(is_expired: F, on_reset: R) -> Self
  where
    F: Fn() -> bool + Send + Sync + 'static,
    R: Fn() + Send + Sync + 'static,
  {
    Self {
      kind: PolicyKind::Custom {
        is_expired: Arc::new(is_expired),
        on_reset: Some(Arc::new(on_reset)),
      },
    }
  }

  /// A composite policy that expires as soon as any of `policies` expires.
  ///
  /// An empty composite never expires.
  pub fn any_of(policies: Vec<ExpirationPolicy>) -> Self {
    Self {
      kind: PolicyKind::Composite {
        policies,
        require_all: false,
      },
    }
  }

  /// A composite policy that expires only once every one of `policies`
  /// has expired.
  ///
  /// An empty composite never expires.
  pub fn all_of(policies: Vec<ExpirationPolicy>) -> Self {
    Self {
      kind: PolicyKind::Composite {
        policies,
        require_all: true,
      },
    }
  }

  /// Whether reading the entry extends its life.
  pub fn can_reset(&self) -> bool {
    match &self.kind {
      PolicyKind::Duration { sliding, .. } => *sliding,
      PolicyKind::Absolute { .. } => false,
      PolicyKind::Custom { on_reset, .. } => on_reset.is_some(),
      PolicyKind::Composite { policies, .. } => policies.iter().any(Self::can_reset),
    }
  }

  /// Whether the policy considers its entry stale right now.
  pub fn is_expired(&self) -> bool {
    match &self.kind {
      PolicyKind::Duration { expires_at, .. } => {
        time::now_nanos() >= expires_at.load(Ordering::Acquire)
      }
      PolicyKind::Absolute { expires_at } => time::now_nanos() >= *expires_at,
      PolicyKind::Custom { is_expired, .. } => is_expired(),
      PolicyKind::Composite {
        policies,
        require_all,
      } => {
        if policies.is_empty() {
          false
        } else if *require_all {
          policies.iter().all(Self::is_expired)
        } else {
          policies.iter().any(Self::is_expired)
        }
      }
    }
  }

  /// Recomputes the expiry from the current time.
  ///
  /// A no-op for policies that cannot reset.
  pub fn reset(&self) {
    match &self.kind {
      PolicyKind::Duration {
        duration,
        sliding: true,
        expires_at,
      } => {
        let next = time::now_nanos().saturating_add(time::duration_to_nanos(*duration));
        expires_at.store(next, Ordering::Release);
      }
      PolicyKind::Custom {
        on_reset: Some(on_reset),
        ..
      } => on_reset(),
      PolicyKind::Composite { policies, .. } => {
        for policy in policies.iter().filter(|p| p.can_reset()) {
          policy.reset();
        }
      }
      _ => {}
    }
  }

  /// The instant at which the policy expires, for time-based policies.
  pub fn expires_at(&self) -> Option<Instant> {
    match &self.kind {
      PolicyKind::Duration { expires_at, .. } => {
        Some(time::nanos_to_instant(expires_at.load(Ordering::Acquire)))
      }
      PolicyKind::Absolute { expires_at } => Some(time::nanos_to_instant(*expires_at)),
      _ => None,
    }
  }

  /// The configured lifetime of duration-based policies.
  pub fn duration_span(&self) -> Option<Duration> {
    match &self.kind {
      PolicyKind::Duration { duration, .. } => Some(*duration),
      _ => None,
    }
  }
}

// Cloning snapshots the current expiry instant; the clone is reset independently.
impl Clone for ExpirationPolicy {
  fn clone(&self) -> Self {
    let kind = match &self.kind {
      PolicyKind::Duration {
        duration,
        sliding,
        expires_at,
      } => PolicyKind::Duration {
        duration: *duration,
        sliding: *sliding,
        expires_at: AtomicU64::new(expires_at.load(Ordering::Acquire)),
      },
      PolicyKind::Absolute { expires_at } => PolicyKind::Absolute {
        expires_at: *expires_at,
      },
      PolicyKind::Custom {
        is_expired,
        on_reset,
      } => PolicyKind::Custom {
        is_expired: Arc::clone(is_expired),
        on_reset: on_reset.clone(),
      },
      PolicyKind::Composite {
        policies,
        require_all,
      } => PolicyKind::Composite {
        policies: policies.clone(),
        require_all: *require_all,
      },
    };
    Self { kind }
  }
}

impl fmt::Debug for ExpirationPolicy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.kind {
      PolicyKind::Duration {
        duration, sliding, ..
      } => f
        .debug_struct(if *sliding { "Sliding" } else { "Duration" })
        .field("duration", duration)
        .field("expires_at", &self.expires_at())
        .finish(),
      PolicyKind::Absolute { .. } => f
        .debug_struct("Absolute")
        .field("expires_at", &self.expires_at())
        .finish(),
      PolicyKind::Custom { on_reset, .. } => f
        .debug_struct("Custom")
        .field("can_reset", &on_reset.is_some())
        .finish_non_exhaustive(),
      PolicyKind::Composite {
        policies,
        require_all,
      } => f
        .debug_struct("Composite")
        .field("require_all", require_all)
        .field("policies", policies)
        .finish(),
    }
  }
}
