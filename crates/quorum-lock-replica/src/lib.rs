//! Quorum Lock Replica - Replica client abstraction and backends
//!
//! This crate provides:
//! - `ReplicaClient`: the atomic per-node primitives the lock protocol builds on
//! - `MemoryReplica`: in-process replica for tests and simulations
//! - `RedisReplica`: Redis-backed replica (feature: `redis`)

pub mod client;
pub mod memory;

#[cfg(feature = "redis")]
pub mod redis;

pub use client::{ReplicaClient, ReplicaSet};
pub use memory::MemoryReplica;

#[cfg(feature = "redis")]
pub use self::redis::RedisReplica;
