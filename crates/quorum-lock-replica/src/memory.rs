// In-memory replica
// Keeps lock keys in a DashMap with per-key expiry; each operation runs under
// the owning shard's write lock, which makes compare-and-mutate indivisible

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use quorum_lock_common::ReplicaError;

use crate::client::ReplicaClient;

/// Upper bound for expiries that would overflow `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

/// A stored lock value
struct StoredValue {
    value: String,
    expires_at: Instant,
}

impl StoredValue {
    fn new(value: &str, now: Instant, ttl: Duration) -> Self {
        Self {
            value: value.to_string(),
            expires_at: expiry(now, ttl),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    fn is_held_by(&self, token: &str, now: Instant) -> bool {
        !self.is_expired(now) && self.value == token
    }
}

fn expiry(now: Instant, ttl: Duration) -> Instant {
    now.checked_add(ttl).unwrap_or(now + FAR_FUTURE)
}

/// Replica node living in the current process.
///
/// Used by tests and simulations. It can be taken offline or slowed down to
/// model partitions and slow links.
pub struct MemoryReplica {
    name: String,
    entries: Arc<DashMap<String, StoredValue>>,
    online: AtomicBool,
    /// Artificial per-call latency in microseconds
    latency_us: AtomicU64,
}

impl MemoryReplica {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Arc::new(DashMap::new()),
            online: AtomicBool::new(true),
            latency_us: AtomicU64::new(0),
        }
    }

    /// Build `count` replicas named `{prefix}-0 .. {prefix}-{count-1}`
    pub fn cluster(prefix: &str, count: usize) -> Vec<Arc<MemoryReplica>> {
        (0..count)
            .map(|i| Arc::new(MemoryReplica::new(format!("{}-{}", prefix, i))))
            .collect()
    }

    /// Take the replica offline (every call fails) or bring it back
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
        info!(replica = %self.name, online, "Replica availability changed");
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Delay every call by `latency`
    pub fn set_latency(&self, latency: Duration) {
        self.latency_us
            .store(latency.as_micros().min(u64::MAX as u128) as u64, Ordering::SeqCst);
    }

    /// Unconditionally store `value` under `id`, as another client would
    pub fn seed(&self, id: &str, value: &str, ttl: Duration) {
        self.entries
            .insert(id.to_string(), StoredValue::new(value, Instant::now(), ttl));
    }

    /// Live value under `id`, bypassing availability and latency settings
    pub fn value(&self, id: &str) -> Option<String> {
        let now = Instant::now();
        self.entries
            .get(id)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone())
    }

    /// Remaining time to live of `id`
    pub fn ttl(&self, id: &str) -> Option<Duration> {
        let now = Instant::now();
        self.entries
            .get(id)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.expires_at.saturating_duration_since(now))
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|entry| !entry.value().is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop expired keys, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    /// Start a background task that purges expired keys every `period`
    pub fn spawn_reaper(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let replica = Arc::clone(self);
        info!(replica = %replica.name, ?period, "Starting replica expiry task");

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let removed = replica.purge_expired();
                if removed > 0 {
                    debug!(
                        replica = %replica.name,
                        count = removed,
                        "Cleaned up expired lock entries"
                    );
                }
            }
        })
    }

    /// Apply configured latency and availability before serving a call
    async fn enter(&self) -> Result<(), ReplicaError> {
        let latency = self.latency_us.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_micros(latency)).await;
        }
        if !self.is_online() {
            return Err(ReplicaError::Unreachable(format!(
                "{} is offline",
                self.name
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ReplicaClient for MemoryReplica {
    fn name(&self) -> &str {
        &self.name
    }

    async fn acquire(&self, id: &str, token: &str, ttl: Duration) -> Result<bool, ReplicaError> {
        self.enter().await?;
        let now = Instant::now();

        let acquired = match self.entries.entry(id.to_string()) {
            Entry::Vacant(vacant) => {
                vacant.insert(StoredValue::new(token, now, ttl));
                true
            }
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    occupied.insert(StoredValue::new(token, now, ttl));
                    true
                } else {
                    false
                }
            }
        };

        debug!(replica = %self.name, key = %id, acquired, "acquire");
        Ok(acquired)
    }

    async fn release(&self, id: &str, token: &str) -> Result<bool, ReplicaError> {
        self.enter().await?;
        let now = Instant::now();

        let released = self
            .entries
            .remove_if(id, |_, entry| entry.is_held_by(token, now))
            .is_some();

        debug!(replica = %self.name, key = %id, released, "release");
        Ok(released)
    }

    async fn extend(&self, id: &str, token: &str, ttl: Duration) -> Result<bool, ReplicaError> {
        self.enter().await?;
        let now = Instant::now();

        let extended = match self.entries.get_mut(id) {
            Some(mut entry) if entry.is_held_by(token, now) => {
                entry.expires_at = expiry(now, ttl);
                true
            }
            _ => false,
        };

        debug!(replica = %self.name, key = %id, extended, "extend");
        Ok(extended)
    }

    async fn read(&self, id: &str) -> Result<Option<String>, ReplicaError> {
        self.enter().await?;
        Ok(self.value(id))
    }
}
