//! Quorum Lock Common - Shared types for the quorum lock crates
//!
//! This crate provides:
//! - Error types for replica calls, quorum rounds and lock operations
//! - Lock token generation
//! - Protocol defaults and quorum arithmetic

pub mod error;
pub mod token;

use std::time::Duration;

// Re-exports for convenience
pub use error::{LocalLockError, LockError, MultiError, ReplicaError, ReplicaFailure};
pub use token::{TokenGenerator, default_token_generator, random_token};

/// Default lock expiration (replica TTL)
pub const DEFAULT_EXPIRATION: Duration = Duration::from_secs(10);

/// Default number of acquisition attempts
pub const DEFAULT_MAX_TRIES: u32 = 32;

/// Default fixed delay between acquisition attempts
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Default fraction of the expiration reserved for clock drift and latency
pub const DEFAULT_DRIFT_FACTOR: f64 = 0.01;

/// Majority threshold for `replicas` nodes: floor(N/2) + 1
pub fn quorum_for(replicas: usize) -> usize {
    replicas / 2 + 1
}
