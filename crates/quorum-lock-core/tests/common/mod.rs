// Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use quorum_lock_core::{LockOptions, Locker, MemoryReplica, ReplicaClient, ReplicaError};

/// One call observed by a `RecordingReplica`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub replica: String,
    pub op: &'static str,
}

/// Calls observed across a whole cluster, in arrival order
#[derive(Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl CallLog {
    fn record(&self, replica: &str, op: &'static str) {
        self.calls.lock().push(Call {
            replica: replica.to_string(),
            op,
        });
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn ops(&self) -> Vec<&'static str> {
        self.calls.lock().iter().map(|c| c.op).collect()
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.op == op).count()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

/// Memory replica that records every call before serving it
pub struct RecordingReplica {
    inner: MemoryReplica,
    log: CallLog,
}

impl RecordingReplica {
    pub fn memory(&self) -> &MemoryReplica {
        &self.inner
    }
}

#[async_trait]
impl ReplicaClient for RecordingReplica {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn acquire(&self, id: &str, token: &str, ttl: Duration) -> Result<bool, ReplicaError> {
        self.log.record(self.name(), "acquire");
        self.inner.acquire(id, token, ttl).await
    }

    async fn release(&self, id: &str, token: &str) -> Result<bool, ReplicaError> {
        self.log.record(self.name(), "release");
        self.inner.release(id, token).await
    }

    async fn extend(&self, id: &str, token: &str, ttl: Duration) -> Result<bool, ReplicaError> {
        self.log.record(self.name(), "extend");
        self.inner.extend(id, token, ttl).await
    }

    async fn read(&self, id: &str) -> Result<Option<String>, ReplicaError> {
        self.log.record(self.name(), "read");
        self.inner.read(id).await
    }
}

/// `count` recording replicas named `r-0 ..` sharing one call log
pub fn cluster(count: usize) -> (Vec<Arc<RecordingReplica>>, CallLog) {
    let log = CallLog::default();
    let replicas = (0..count)
        .map(|i| {
            Arc::new(RecordingReplica {
                inner: MemoryReplica::new(format!("r-{}", i)),
                log: log.clone(),
            })
        })
        .collect();
    (replicas, log)
}

pub fn locker(replicas: &[Arc<RecordingReplica>], defaults: LockOptions) -> Locker {
    Locker::with_defaults(
        replicas
            .iter()
            .map(|r| Arc::clone(r) as Arc<dyn ReplicaClient>),
        defaults,
    )
}

/// Few tries and a short fixed delay
pub fn fast_options() -> LockOptions {
    LockOptions::default()
        .with_max_tries(3)
        .with_retry_delay(Duration::from_millis(5))
}

/// Store `value` under `id` on the given replicas, as a competing client would
pub fn hold_elsewhere(replicas: &[Arc<RecordingReplica>], id: &str, value: &str, ttl: Duration) {
    for replica in replicas {
        replica.memory().seed(id, value, ttl);
    }
}
