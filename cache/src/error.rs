use thiserror::Error;

/// Errors raised by invalid cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
  /// The cache was configured with zero shards.
  #[error("shard count cannot be zero")]
  ZeroShards,
  /// The shard count cannot be rounded up to a power of two.
  #[error("shard count {0} is too large")]
  TooManyShards(usize),
  /// The sweep interval was set to zero.
  #[error("expiration timer interval cannot be zero")]
  ZeroTimerInterval,
}
