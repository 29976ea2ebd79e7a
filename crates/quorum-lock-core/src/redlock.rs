//! Distributed lock handle
//!
//! A `Redlock` owns the state of one lock as seen by this client: the
//! identifier, the token of the current acquisition and the local validity
//! deadline. Every operation is one or more quorum rounds over the replica
//! set; a round is confirmed when at least `N/2 + 1` replicas report success.
//!
//! Mutating operations take `&mut self`, so a handle has a single owner.
//! Share it behind a `tokio::sync::Mutex` if several tasks must drive it.

use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use quorum_lock_common::{LockError, MultiError, quorum_for};
use quorum_lock_replica::ReplicaSet;

use crate::executor::{QuorumExecutor, Tally};
use crate::options::LockOptions;

/// Fallback when a deadline would overflow `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

fn deadline(from: Instant, after: Duration) -> Instant {
    from.checked_add(after).unwrap_or(from + FAR_FUTURE)
}

/// Outcome of an unlock, extend or validity round
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Confirmation {
    /// At least a quorum of replicas reported success
    pub confirmed: bool,
    pub successes: usize,
    /// Transport failures, one per failing replica
    pub errors: MultiError,
}

impl Confirmation {
    fn from_tally(tally: Tally, quorum: usize) -> Self {
        Self {
            confirmed: tally.successes >= quorum,
            successes: tally.successes,
            errors: tally.errors,
        }
    }

    /// Unconfirmed outcome for a handle that holds no token
    fn unheld() -> Self {
        Self::default()
    }

    /// `Ok(true)` when confirmed, `Ok(false)` when replicas simply disagreed,
    /// `Err` when the round was unconfirmed and some replicas failed.
    pub fn into_result(self) -> Result<bool, MultiError> {
        if self.confirmed {
            Ok(true)
        } else if self.errors.is_empty() {
            Ok(false)
        } else {
            Err(self.errors)
        }
    }
}

fn confirmed_label(confirmed: bool) -> &'static str {
    if confirmed { "true" } else { "false" }
}

/// Handle to one distributed lock
pub struct Redlock {
    id: Arc<str>,
    options: LockOptions,
    quorum: usize,
    executor: QuorumExecutor,
    token: Option<Arc<str>>,
    until: Option<Instant>,
}

impl Redlock {
    /// Create an unacquired handle for `id` over `replicas`
    pub fn new(id: impl Into<Arc<str>>, replicas: ReplicaSet, options: LockOptions) -> Self {
        let quorum = quorum_for(replicas.len());
        let executor = QuorumExecutor::new(replicas, options.expiration);
        Self {
            id: id.into(),
            options,
            quorum,
            executor,
            token: None,
            until: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Token of the current acquisition
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Local validity deadline of the current acquisition
    pub fn until(&self) -> Option<Instant> {
        self.until
    }

    pub fn quorum(&self) -> usize {
        self.quorum
    }

    pub fn options(&self) -> &LockOptions {
        &self.options
    }

    /// Time left before the local deadline, `None` when unacquired
    pub fn remaining(&self) -> Option<Duration> {
        self.until
            .map(|until| until.saturating_duration_since(Instant::now()))
    }

    /// Local view only: a token is held and the deadline has not passed
    pub fn is_held(&self) -> bool {
        self.token.is_some() && self.until.is_some_and(|until| Instant::now() < until)
    }

    /// Acquire the lock on a quorum of replicas.
    ///
    /// A fresh token is generated once and reused by every attempt. Attempts
    /// after the first wait `retry_delay(attempt)`. A failed attempt is
    /// rolled back on every replica before the next one starts. When no
    /// replica accepts and at least one errors the call fails at once with
    /// those errors.
    pub async fn lock(&mut self) -> Result<(), LockError> {
        let token: Arc<str> = match (self.options.token_generator)() {
            Ok(token) => token.into(),
            Err(e) => {
                warn!(lock = %self.id, error = %e, "Failed to generate lock token");
                metrics::counter!("quorum_lock_acquire_total", "outcome" => "token_error")
                    .increment(1);
                return Err(LockError::TokenGeneration(e));
            }
        };

        for attempt in 1..=self.options.max_tries {
            if attempt > 1 {
                let delay = (self.options.retry_delay)(attempt);
                debug!(lock = %self.id, attempt, ?delay, "Waiting before retry");
                tokio::time::sleep(delay).await;
            }

            let start = Instant::now();
            let tally = self.acquire_round(&token).await;

            if tally.successes == 0 && !tally.errors.is_empty() {
                warn!(
                    lock = %self.id,
                    attempt,
                    errors = %tally.errors,
                    "No replica accepted the lock, giving up"
                );
                metrics::counter!("quorum_lock_acquire_total", "outcome" => "replica_error")
                    .increment(1);
                metrics::histogram!("quorum_lock_acquire_attempts").record(attempt as f64);
                return Err(LockError::Replicas(tally.errors));
            }

            let now = Instant::now();
            if tally.successes >= self.quorum
                && let Some(validity) = self.options.validity(now - start)
            {
                let until = deadline(now, validity);
                self.token = Some(token);
                self.until = Some(until);

                info!(
                    lock = %self.id,
                    attempt,
                    successes = tally.successes,
                    ?validity,
                    "Lock acquired"
                );
                metrics::counter!("quorum_lock_acquire_total", "outcome" => "acquired")
                    .increment(1);
                metrics::histogram!("quorum_lock_acquire_attempts").record(attempt as f64);
                return Ok(());
            }

            debug!(
                lock = %self.id,
                attempt,
                successes = tally.successes,
                quorum = self.quorum,
                failures = tally.errors.len(),
                "Attempt failed, releasing partial acquisition"
            );
            self.release_round(&token).await;
        }

        warn!(
            lock = %self.id,
            attempts = self.options.max_tries,
            "Lock acquisition exhausted"
        );
        metrics::counter!("quorum_lock_acquire_total", "outcome" => "exhausted").increment(1);
        metrics::histogram!("quorum_lock_acquire_attempts")
            .record(self.options.max_tries as f64);

        Err(LockError::AcquireFailed {
            id: self.id.to_string(),
            attempts: self.options.max_tries,
        })
    }

    /// Release the lock on every replica.
    ///
    /// The handle returns to unacquired whatever the outcome.
    pub async fn unlock(&mut self) -> Confirmation {
        self.until = None;
        let Some(token) = self.token.take() else {
            debug!(lock = %self.id, "Unlock on a handle holding no token");
            return Confirmation::unheld();
        };

        let confirmation = Confirmation::from_tally(self.release_round(&token).await, self.quorum);

        if confirmation.confirmed {
            info!(lock = %self.id, successes = confirmation.successes, "Lock released");
        } else {
            warn!(
                lock = %self.id,
                successes = confirmation.successes,
                quorum = self.quorum,
                errors = %confirmation.errors,
                "Lock release not confirmed by a quorum"
            );
        }
        metrics::counter!(
            "quorum_lock_release_total",
            "confirmed" => confirmed_label(confirmation.confirmed)
        )
        .increment(1);

        confirmation
    }

    /// Reset the TTL on every replica still holding this handle's token.
    ///
    /// On confirmation the local deadline moves to extend start plus
    /// expiration.
    pub async fn extend(&mut self) -> Confirmation {
        let Some(token) = self.token.clone() else {
            debug!(lock = %self.id, "Extend on a handle holding no token");
            return Confirmation::unheld();
        };

        let start = Instant::now();
        let id = Arc::clone(&self.id);
        let ttl = self.options.expiration;
        let tally = self
            .executor
            .execute("extend", move |replica| {
                let id = Arc::clone(&id);
                let token = Arc::clone(&token);
                async move { replica.extend(&id, &token, ttl).await }
            })
            .await;

        let confirmation = Confirmation::from_tally(tally, self.quorum);
        if confirmation.confirmed {
            self.until = Some(deadline(start, ttl));
            debug!(lock = %self.id, successes = confirmation.successes, "Lock extended");
        } else {
            warn!(
                lock = %self.id,
                successes = confirmation.successes,
                quorum = self.quorum,
                errors = %confirmation.errors,
                "Lock extension not confirmed by a quorum"
            );
        }
        metrics::counter!(
            "quorum_lock_extend_total",
            "confirmed" => confirmed_label(confirmation.confirmed)
        )
        .increment(1);

        confirmation
    }

    /// Check that a quorum of replicas still stores this handle's token.
    /// Replicas are only read.
    pub async fn valid(&self) -> Confirmation {
        let Some(token) = self.token.clone() else {
            return Confirmation::unheld();
        };

        let id = Arc::clone(&self.id);
        let tally = self
            .executor
            .execute("read", move |replica| {
                let id = Arc::clone(&id);
                let token = Arc::clone(&token);
                async move {
                    replica
                        .read(&id)
                        .await
                        .map(|value| value.as_deref() == Some(&*token))
                }
            })
            .await;

        Confirmation::from_tally(tally, self.quorum)
    }

    async fn acquire_round(&self, token: &Arc<str>) -> Tally {
        let id = Arc::clone(&self.id);
        let token = Arc::clone(token);
        let ttl = self.options.expiration;
        self.executor
            .execute("acquire", move |replica| {
                let id = Arc::clone(&id);
                let token = Arc::clone(&token);
                async move { replica.acquire(&id, &token, ttl).await }
            })
            .await
    }

    async fn release_round(&self, token: &Arc<str>) -> Tally {
        let id = Arc::clone(&self.id);
        let token = Arc::clone(token);
        self.executor
            .execute("release", move |replica| {
                let id = Arc::clone(&id);
                let token = Arc::clone(&token);
                async move { replica.release(&id, &token).await }
            })
            .await
    }
}

impl Debug for Redlock {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Redlock")
            .field("id", &self.id)
            .field("quorum", &self.quorum)
            .field("replicas", &self.executor.len())
            .field("held", &self.token.is_some())
            .field("until", &self.until)
            .finish_non_exhaustive()
    }
}
