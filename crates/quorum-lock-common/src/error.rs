//! Error types for quorum-lock
//!
//! This module defines:
//! - `ReplicaError`: failure talking to a single replica node
//! - `ReplicaFailure` / `MultiError`: per-replica failures collected by one quorum round
//! - `LockError`: terminal outcomes of a distributed `lock()` call
//! - `LocalLockError`: errors of the in-process keyed lock

use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Transport-level failure of one replica call.
///
/// A logical "condition not met" is never an error; replicas report it as `Ok(false)`.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplicaError {
    #[error("replica unreachable: {0}")]
    Unreachable(String),

    #[error("replica call timed out after {0:?}")]
    Timeout(Duration),

    #[error("replica protocol error: {0}")]
    Protocol(String),

    #[error("replica task failed: {0}")]
    TaskFailed(String),
}

/// A `ReplicaError` tagged with the replica that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaFailure {
    pub replica: String,
    pub error: ReplicaError,
}

impl ReplicaFailure {
    pub fn new(replica: impl Into<String>, error: ReplicaError) -> Self {
        Self {
            replica: replica.into(),
            error,
        }
    }
}

impl Display for ReplicaFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.replica, self.error)
    }
}

impl std::error::Error for ReplicaFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Aggregate of every replica failure seen in one quorum round.
///
/// Holds one entry per replica whose call failed at the transport level.
/// An empty `MultiError` means every replica answered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiError {
    errors: Vec<ReplicaFailure>,
}

impl MultiError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, failure: ReplicaFailure) {
        self.errors.push(failure);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[ReplicaFailure] {
        &self.errors
    }
}

impl Display for MultiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.errors.as_slice() {
            [] => write!(f, "no replica errors"),
            [single] => write!(f, "{}", single),
            many => {
                let rendered: Vec<String> = many
                    .iter()
                    .enumerate()
                    .map(|(i, failure)| format!("#{} {}", i, failure))
                    .collect();
                write!(f, "{}", rendered.join(","))
            }
        }
    }
}

impl std::error::Error for MultiError {}

impl FromIterator<ReplicaFailure> for MultiError {
    fn from_iter<T: IntoIterator<Item = ReplicaFailure>>(iter: T) -> Self {
        Self {
            errors: iter.into_iter().collect(),
        }
    }
}

/// Terminal failures of a distributed `lock()` call
#[derive(thiserror::Error, Debug)]
pub enum LockError {
    #[error("failed to acquire lock '{id}' after {attempts} attempt(s)")]
    AcquireFailed { id: String, attempts: u32 },

    #[error("failed to generate lock token: {0}")]
    TokenGeneration(#[source] anyhow::Error),

    /// No replica accepted the lock and at least one failed: treated as an outage
    #[error("{0}")]
    Replicas(#[from] MultiError),
}

impl LockError {
    /// Per-replica failures carried by this error, if any
    pub fn replica_errors(&self) -> Option<&MultiError> {
        match self {
            LockError::Replicas(errors) => Some(errors),
            _ => None,
        }
    }
}

/// Errors of the in-process keyed lock
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LocalLockError {
    #[error("lock id cannot be empty")]
    EmptyId,

    #[error("lock id '{0}' not found")]
    NotFound(String),
}
