// Quorum executor
// Runs one action against every replica concurrently and joins every result

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use quorum_lock_common::{MultiError, ReplicaError, ReplicaFailure};
use quorum_lock_replica::{ReplicaClient, ReplicaSet};

/// Aggregate outcome of one quorum round.
///
/// `successes` and `errors` are independent: a replica answering `false`
/// counts in neither, so a low success count with no errors is plain
/// contention rather than an outage.
#[derive(Debug, Default)]
pub struct Tally {
    pub successes: usize,
    pub errors: MultiError,
}

/// Fans actions out to a fixed replica set
#[derive(Clone)]
pub struct QuorumExecutor {
    replicas: ReplicaSet,
    /// Deadline applied to each individual replica call
    call_timeout: Duration,
}

impl QuorumExecutor {
    pub fn new(replicas: ReplicaSet, call_timeout: Duration) -> Self {
        Self {
            replicas,
            call_timeout,
        }
    }

    pub fn len(&self) -> usize {
        self.replicas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replicas.is_empty()
    }

    /// Run `action` once per replica, one spawned task each, and wait for all of them.
    ///
    /// Never returns early: a slow or failing replica delays the round but
    /// never cancels its siblings. A call exceeding `call_timeout` is
    /// reported as `ReplicaError::Timeout`; a panicking task as
    /// `ReplicaError::TaskFailed`.
    pub async fn execute<F, Fut>(&self, op: &'static str, action: F) -> Tally
    where
        F: Fn(Arc<dyn ReplicaClient>) -> Fut,
        Fut: Future<Output = Result<bool, ReplicaError>> + Send + 'static,
    {
        let mut names = Vec::with_capacity(self.replicas.len());
        let mut handles = Vec::with_capacity(self.replicas.len());

        for replica in self.replicas.iter() {
            names.push(replica.name().to_string());

            let call = action(Arc::clone(replica));
            let timeout = self.call_timeout;
            handles.push(tokio::spawn(async move {
                match tokio::time::timeout(timeout, call).await {
                    Ok(result) => result,
                    Err(_) => Err(ReplicaError::Timeout(timeout)),
                }
            }));
        }

        let results = futures::future::join_all(handles).await;

        let mut tally = Tally::default();
        for (name, joined) in names.into_iter().zip(results) {
            let outcome = joined.unwrap_or_else(|e| Err(ReplicaError::TaskFailed(e.to_string())));
            match outcome {
                Ok(true) => tally.successes += 1,
                Ok(false) => {}
                Err(error) => {
                    warn!(replica = %name, op, error = %error, "Replica call failed");
                    metrics::counter!("quorum_lock_replica_errors_total", "op" => op).increment(1);
                    tally.errors.push(ReplicaFailure::new(name, error));
                }
            }
        }

        debug!(
            op,
            replicas = self.replicas.len(),
            successes = tally.successes,
            failures = tally.errors.len(),
            "Quorum round finished"
        );

        tally
    }
}
