// Lock factory
// Holds the replica set and default options shared by every lock it creates

use std::sync::Arc;

use tracing::{info, warn};

use quorum_lock_common::quorum_for;
use quorum_lock_replica::{ReplicaClient, ReplicaSet};

use crate::options::{LockOption, LockOptions};
use crate::redlock::Redlock;

/// Creates `Redlock` handles over a fixed replica set
#[derive(Clone)]
pub struct Locker {
    replicas: ReplicaSet,
    defaults: LockOptions,
}

impl Locker {
    /// Create a factory with the default lock options
    pub fn new(replicas: impl IntoIterator<Item = Arc<dyn ReplicaClient>>) -> Self {
        Self::with_defaults(replicas, LockOptions::default())
    }

    /// Create a factory whose locks start from `defaults`
    pub fn with_defaults(
        replicas: impl IntoIterator<Item = Arc<dyn ReplicaClient>>,
        defaults: LockOptions,
    ) -> Self {
        let replicas: ReplicaSet = replicas.into_iter().collect();

        if replicas.is_empty() {
            warn!("Locker created with no replicas, every lock attempt will fail");
        } else {
            info!(
                replicas = replicas.len(),
                quorum = quorum_for(replicas.len()),
                "Locker created"
            );
        }

        Self { replicas, defaults }
    }

    pub fn defaults(&self) -> &LockOptions {
        &self.defaults
    }

    /// Majority threshold of the replica set
    pub fn quorum(&self) -> usize {
        quorum_for(self.replicas.len())
    }

    /// New handle for `id` using the factory defaults
    pub fn new_lock(&self, id: impl Into<Arc<str>>) -> Redlock {
        self.new_lock_with_options(id, self.defaults.clone())
    }

    /// New handle for `id`, applying `options` over the factory defaults
    pub fn new_lock_with(
        &self,
        id: impl Into<Arc<str>>,
        options: impl IntoIterator<Item = LockOption>,
    ) -> Redlock {
        self.new_lock_with_options(id, self.defaults.clone().apply_all(options))
    }

    /// New handle for `id` with a complete set of options
    pub fn new_lock_with_options(&self, id: impl Into<Arc<str>>, options: LockOptions) -> Redlock {
        Redlock::new(id, Arc::clone(&self.replicas), options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use quorum_lock_replica::MemoryReplica;

    fn locker(count: usize) -> Locker {
        Locker::new(
            MemoryReplica::cluster("r", count)
                .into_iter()
                .map(|r| r as Arc<dyn ReplicaClient>),
        )
    }

    #[test]
    fn test_quorum_follows_replica_count() {
        assert_eq!(locker(1).quorum(), 1);
        assert_eq!(locker(4).quorum(), 3);
        assert_eq!(locker(5).quorum(), 3);
        assert_eq!(locker(0).quorum(), 1);
    }

    #[test]
    fn test_new_lock_uses_defaults() {
        let locker = locker(3);
        let lock = locker.new_lock("res");

        assert_eq!(lock.id(), "res");
        assert_eq!(lock.quorum(), 2);
        assert_eq!(lock.options().max_tries, 32);
        assert_eq!(lock.options().expiration, Duration::from_secs(10));
    }

    #[test]
    fn test_new_lock_with_overrides_defaults() {
        let defaults = LockOptions::default().with_max_tries(5);
        let locker = Locker::with_defaults(
            MemoryReplica::cluster("r", 3)
                .into_iter()
                .map(|r| r as Arc<dyn ReplicaClient>),
            defaults,
        );

        let lock = locker.new_lock_with(
            "res",
            [
                LockOption::Expiry(Duration::from_secs(2)),
                LockOption::DriftFactor(0.1),
            ],
        );
        assert_eq!(lock.options().max_tries, 5);
        assert_eq!(lock.options().expiration, Duration::from_secs(2));
        assert_eq!(lock.options().drift_factor, 0.1);

        // Factory defaults are untouched
        assert_eq!(locker.defaults().expiration, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_empty_replica_set_never_acquires() {
        let locker = locker(0);
        let mut lock = locker.new_lock_with("res", [LockOption::MaxTries(2)]);
        assert!(lock.lock().await.is_err());
        assert!(!lock.is_held());
    }
}
