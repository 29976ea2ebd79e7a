//! Quorum Lock Core - Distributed mutual exclusion over independent replicas
//!
//! This crate provides:
//! - `Redlock`: a lock handle acquired, extended and released by quorum rounds
//! - `Locker`: factory sharing one replica set and default options
//! - `QuorumExecutor`: concurrent fan-out of one call to every replica
//! - `LockOptions` / `LockSettings`: programmatic and file/env configuration
//! - `KeyedLock`: in-process exclusive locks keyed by id

pub mod executor;
pub mod local;
pub mod locker;
pub mod options;
pub mod redlock;
pub mod settings;

pub use executor::{QuorumExecutor, Tally};
pub use local::{KeyedLock, KeyedLockGuard};
pub use locker::Locker;
pub use options::{DelayFn, LockOption, LockOptions, fixed_delay};
pub use redlock::{Confirmation, Redlock};
pub use settings::LockSettings;

// Re-export the types needed to use the lock without naming the other crates
pub use quorum_lock_common::{
    LocalLockError, LockError, MultiError, ReplicaError, ReplicaFailure, TokenGenerator,
    quorum_for,
};
pub use quorum_lock_replica::{MemoryReplica, ReplicaClient, ReplicaSet};

#[cfg(feature = "redis")]
pub use quorum_lock_replica::RedisReplica;
