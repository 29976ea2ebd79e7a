//! Lock configuration
//!
//! `LockOptions` is the immutable configuration a lock handle is built with.
//! Fields are set through builder methods or by applying `LockOption`
//! values; the last value applied to a field wins and fields are not
//! validated against each other (a drift factor of 1.0 or more is accepted
//! and makes every acquisition fail).

use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;

use quorum_lock_common::{
    DEFAULT_DRIFT_FACTOR, DEFAULT_EXPIRATION, DEFAULT_MAX_TRIES, DEFAULT_RETRY_DELAY,
    TokenGenerator, default_token_generator,
};

/// Maps a 1-based attempt number to the wait before that attempt
pub type DelayFn = Arc<dyn Fn(u32) -> Duration + Send + Sync>;

/// Configuration of a single distributed lock
#[derive(Clone)]
pub struct LockOptions {
    /// TTL stored at each replica, also the per-replica call deadline
    pub expiration: Duration,
    /// Acquisition attempts before giving up
    pub max_tries: u32,
    /// Wait before each retry
    pub retry_delay: DelayFn,
    /// Fraction of `expiration` reserved for clock drift and latency
    pub drift_factor: f64,
    /// Source of fresh ownership tokens
    pub token_generator: TokenGenerator,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            expiration: DEFAULT_EXPIRATION,
            max_tries: DEFAULT_MAX_TRIES,
            retry_delay: fixed_delay(DEFAULT_RETRY_DELAY),
            drift_factor: DEFAULT_DRIFT_FACTOR,
            token_generator: default_token_generator(),
        }
    }
}

impl Debug for LockOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockOptions")
            .field("expiration", &self.expiration)
            .field("max_tries", &self.max_tries)
            .field("drift_factor", &self.drift_factor)
            .finish_non_exhaustive()
    }
}

/// A delay function that always waits `delay`
pub fn fixed_delay(delay: Duration) -> DelayFn {
    Arc::new(move |_| delay)
}

impl LockOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_expiry(mut self, expiration: Duration) -> Self {
        self.expiration = expiration;
        self
    }

    pub fn with_max_tries(mut self, max_tries: u32) -> Self {
        self.max_tries = max_tries;
        self
    }

    /// Wait the same `delay` before every retry
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = fixed_delay(delay);
        self
    }

    /// Compute the wait before each retry from its 1-based attempt number.
    /// The first retry receives 2, so functions written for a 0-based index are off by one
    pub fn with_retry_delay_fn<F>(mut self, delay: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        self.retry_delay = Arc::new(delay);
        self
    }

    pub fn with_drift_factor(mut self, drift_factor: f64) -> Self {
        self.drift_factor = drift_factor;
        self
    }

    pub fn with_token_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn() -> anyhow::Result<String> + Send + Sync + 'static,
    {
        self.token_generator = Arc::new(generator);
        self
    }

    /// Apply one option value
    pub fn apply(self, option: LockOption) -> Self {
        match option {
            LockOption::Expiry(expiration) => self.with_expiry(expiration),
            LockOption::MaxTries(max_tries) => self.with_max_tries(max_tries),
            LockOption::RetryDelay(delay) => self.with_retry_delay(delay),
            LockOption::RetryDelayFn(delay) => Self {
                retry_delay: delay,
                ..self
            },
            LockOption::DriftFactor(factor) => self.with_drift_factor(factor),
            LockOption::TokenGenerator(generator) => Self {
                token_generator: generator,
                ..self
            },
        }
    }

    /// Apply option values in order
    pub fn apply_all(self, options: impl IntoIterator<Item = LockOption>) -> Self {
        options.into_iter().fold(self, Self::apply)
    }

    /// Time reserved for clock drift: `expiration * drift_factor`.
    ///
    /// Non-positive or NaN factors reserve nothing; factors too large to
    /// represent reserve `Duration::MAX`.
    pub fn drift(&self) -> Duration {
        let secs = self.expiration.as_secs_f64() * self.drift_factor;
        if secs.is_nan() || secs <= 0.0 {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    /// Validity left after an acquisition round that took `elapsed`.
    ///
    /// `None` when the round used up the whole drift-adjusted window.
    pub fn validity(&self, elapsed: Duration) -> Option<Duration> {
        self.expiration
            .checked_sub(elapsed)?
            .checked_sub(self.drift())
            .filter(|left| !left.is_zero())
    }
}

/// A single configuration value, for callers that keep options as data
#[derive(Clone)]
pub enum LockOption {
    Expiry(Duration),
    MaxTries(u32),
    RetryDelay(Duration),
    RetryDelayFn(DelayFn),
    DriftFactor(f64),
    TokenGenerator(TokenGenerator),
}

impl Debug for LockOption {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LockOption::Expiry(d) => f.debug_tuple("Expiry").field(d).finish(),
            LockOption::MaxTries(n) => f.debug_tuple("MaxTries").field(n).finish(),
            LockOption::RetryDelay(d) => f.debug_tuple("RetryDelay").field(d).finish(),
            LockOption::RetryDelayFn(_) => f.write_str("RetryDelayFn(..)"),
            LockOption::DriftFactor(x) => f.debug_tuple("DriftFactor").field(x).finish(),
            LockOption::TokenGenerator(_) => f.write_str("TokenGenerator(..)"),
        }
    }
}
