use std::sync::Arc;

/// A value that holds a resource which should be released when the value
/// leaves the cache.
///
/// Implement this for a value type and enable it with
/// [`CacheBuilder::dispose_values`](crate::CacheBuilder::dispose_values).
/// Types that do not implement it can still be released through
/// [`CacheBuilder::disposer`](crate::CacheBuilder::disposer).
pub trait Dispose {
  fn dispose(&self);
}

/// The injected release function. Runs only when disposal is enabled for a
/// removal.
pub(crate) type Disposer<V> = Arc<dyn Fn(&V) + Send + Sync>;
