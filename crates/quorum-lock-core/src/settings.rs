// Lock settings loaded from a config file and the environment

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use quorum_lock_common::{
    DEFAULT_DRIFT_FACTOR, DEFAULT_EXPIRATION, DEFAULT_MAX_TRIES, DEFAULT_RETRY_DELAY,
};

use crate::options::LockOptions;

/// Environment variable prefix, e.g. `QUORUM_LOCK_MAX_TRIES=8`
pub const ENV_PREFIX: &str = "QUORUM_LOCK";

/// Serializable lock defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockSettings {
    pub expiration_ms: u64,
    pub max_tries: u32,
    pub retry_delay_ms: u64,
    pub drift_factor: f64,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            expiration_ms: DEFAULT_EXPIRATION.as_millis() as u64,
            max_tries: DEFAULT_MAX_TRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY.as_millis() as u64,
            drift_factor: DEFAULT_DRIFT_FACTOR,
        }
    }
}

impl LockSettings {
    /// Load settings from an optional file (format picked by extension),
    /// overlaid by `QUORUM_LOCK_*` environment variables. Missing keys keep
    /// their defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn expiration(&self) -> Duration {
        Duration::from_millis(self.expiration_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Lock options with a fixed retry delay and the default token generator
    pub fn to_options(&self) -> LockOptions {
        LockOptions::default()
            .with_expiry(self.expiration())
            .with_max_tries(self.max_tries)
            .with_retry_delay(self.retry_delay())
            .with_drift_factor(self.drift_factor)
    }
}
