//! Replica client trait

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use quorum_lock_common::ReplicaError;

/// One key-value node taking part in a lock quorum.
///
/// Every operation must execute as a single indivisible step on the node, so
/// that no other client can interleave between the comparison and the
/// mutation. An `Err` means the node could not be reached or answered
/// garbage; a condition that simply does not hold is `Ok(false)`.
#[async_trait]
pub trait ReplicaClient: Send + Sync {
    /// Stable label for logs and error reports (usually the node address)
    fn name(&self) -> &str;

    /// Store `token` under `id` with `ttl`, only if `id` is absent
    async fn acquire(&self, id: &str, token: &str, ttl: Duration) -> Result<bool, ReplicaError>;

    /// Delete `id`, only if it currently holds `token`
    async fn release(&self, id: &str, token: &str) -> Result<bool, ReplicaError>;

    /// Reset the TTL of `id` to `ttl`, only if it currently holds `token`
    async fn extend(&self, id: &str, token: &str, ttl: Duration) -> Result<bool, ReplicaError>;

    /// Current value of `id`
    async fn read(&self, id: &str) -> Result<Option<String>, ReplicaError>;
}

/// Shared, immutable set of replicas backing a lock
pub type ReplicaSet = Arc<[Arc<dyn ReplicaClient>]>;
