//! Response cache: bounded in-memory storage for operation responses.
//!
//! - [`CacheKey`]: order-independent key derived from an operation id and its
//!   variables.
//! - [`QueryResponseCache`]: LRU cache with a per-entry time-to-live.
//! - [`CacheError`]: failures of the cache itself.

use std::time::Duration;

use thiserror::Error;

pub mod key;
pub mod store;

pub use key::CacheKey;
pub use store::QueryResponseCache;

/// Default maximum number of cached responses.
pub const DEFAULT_SIZE: usize = 100;

/// Default lifetime of a cached response (15 minutes).
pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

/// Errors produced by [`QueryResponseCache`].
#[derive(Debug, Error)]
pub enum CacheError {
    /// A thread panicked while holding the cache lock.
    #[error("response cache lock poisoned")]
    Poisoned,
}
