// Hold a lock on real Redis nodes

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use quorum_lock_core::{LockOptions, Locker, RedisReplica, ReplicaClient};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::cli::HoldArgs;

pub async fn run(args: HoldArgs, options: LockOptions) -> anyhow::Result<()> {
    let mut replicas: Vec<Arc<dyn ReplicaClient>> = Vec::with_capacity(args.endpoints.len());
    for endpoint in &args.endpoints {
        let replica = RedisReplica::connect(endpoint)
            .await
            .with_context(|| format!("failed to connect to {}", endpoint))?;
        replicas.push(Arc::new(replica));
    }

    // Renew well before the replica TTL runs out
    let renew_every = (options.expiration / 3).max(Duration::from_millis(10));
    let locker = Locker::with_defaults(replicas, options);
    let mut lock = locker.new_lock(args.id.as_str());

    lock.lock().await.context("failed to acquire lock")?;
    info!(
        lock = %lock.id(),
        token = lock.token().unwrap_or_default(),
        remaining = ?lock.remaining(),
        "Holding lock"
    );

    let hold_until = Instant::now() + Duration::from_millis(args.hold_ms);
    while Instant::now() < hold_until {
        let left = hold_until.saturating_duration_since(Instant::now());
        tokio::time::sleep(renew_every.min(left)).await;
        if Instant::now() >= hold_until {
            break;
        }

        let extended = lock.extend().await;
        if !extended.confirmed {
            warn!(errors = %extended.errors, "Lost the lock while holding it");
            bail!(
                "lock '{}' was lost: extension confirmed by {} of {} required replicas",
                args.id,
                extended.successes,
                lock.quorum()
            );
        }
    }

    let released = lock.unlock().await;
    if released.confirmed {
        info!(lock = %args.id, "Lock released");
    } else {
        warn!(
            lock = %args.id,
            successes = released.successes,
            "Release not confirmed, the lock will lapse after its TTL"
        );
    }

    released
        .into_result()
        .map(|_| ())
        .context("failed to release lock")
}
