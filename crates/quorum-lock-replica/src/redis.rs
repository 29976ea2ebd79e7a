// Redis replica
// Conditional mutations run as Lua scripts so the comparison and the write are
// a single step on the server

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{RedisError, Script};
use tracing::info;

use quorum_lock_common::ReplicaError;

use crate::client::ReplicaClient;

const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

const EXTEND_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("PEXPIRE", KEYS[1], ARGV[2])
else
    return 0
end
"#;

/// Replica backed by one Redis server
pub struct RedisReplica {
    name: String,
    conn: ConnectionManager,
    release_script: Script,
    extend_script: Script,
}

impl RedisReplica {
    /// Connect to the Redis server at `url` (e.g. `redis://127.0.0.1:6379/`)
    pub async fn connect(url: &str) -> Result<Self, ReplicaError> {
        let client = redis::Client::open(url).map_err(map_redis_error)?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(map_redis_error)?;

        info!(replica = %url, "Connected to redis replica");

        Ok(Self::with_connection(url, conn))
    }

    /// Wrap an existing connection manager
    pub fn with_connection(name: impl Into<String>, conn: ConnectionManager) -> Self {
        Self {
            name: name.into(),
            conn,
            release_script: Script::new(RELEASE_SCRIPT),
            extend_script: Script::new(EXTEND_SCRIPT),
        }
    }
}

/// Redis rejects a zero expiry, so round sub-millisecond TTLs up
fn ttl_millis(ttl: Duration) -> u64 {
    (ttl.as_millis().min(u64::MAX as u128) as u64).max(1)
}

/// Client-side timeouts carry no elapsed time, so they are reported as
/// unreachable with the redis message rather than as `Timeout`
fn map_redis_error(err: RedisError) -> ReplicaError {
    if err.is_timeout()
        || err.is_io_error()
        || err.is_connection_dropped()
        || err.is_connection_refusal()
    {
        ReplicaError::Unreachable(err.to_string())
    } else {
        ReplicaError::Protocol(err.to_string())
    }
}

#[async_trait]
impl ReplicaClient for RedisReplica {
    fn name(&self) -> &str {
        &self.name
    }

    async fn acquire(&self, id: &str, token: &str, ttl: Duration) -> Result<bool, ReplicaError> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(id)
            .arg(token)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(reply.as_deref() == Some("OK"))
    }

    async fn release(&self, id: &str, token: &str) -> Result<bool, ReplicaError> {
        let mut conn = self.conn.clone();
        let status: i64 = self
            .release_script
            .key(id)
            .arg(token)
            .invoke_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(status != 0)
    }

    async fn extend(&self, id: &str, token: &str, ttl: Duration) -> Result<bool, ReplicaError> {
        let mut conn = self.conn.clone();
        let status: i64 = self
            .extend_script
            .key(id)
            .arg(token)
            .arg(ttl_millis(ttl))
            .invoke_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(status != 0)
    }

    async fn read(&self, id: &str) -> Result<Option<String>, ReplicaError> {
        let mut conn = self.conn.clone();
        redis::cmd("GET")
            .arg(id)
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)
    }
}
