//! Redis Replica Tests
//!
//! Behaviour of `RedisReplica` against a live server. Set `REDIS_URL` to point
//! at a server other than `redis://127.0.0.1:6379/`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use redis::aio::MultiplexedConnection;

use quorum_lock_replica::{RedisReplica, ReplicaClient};

const LONG_TTL: Duration = Duration::from_secs(60);

fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379/".to_string())
}

/// Key unique to this process and call, so reruns never collide
fn unique_key(prefix: &str) -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!(
        "quorum-lock-test:{}:{}:{}:{}",
        prefix,
        std::process::id(),
        nanos,
        COUNTER.fetch_add(1, Ordering::Relaxed)
    )
}

async fn replica() -> RedisReplica {
    RedisReplica::connect(&redis_url())
        .await
        .expect("Failed to connect to redis")
}

async fn raw_connection() -> MultiplexedConnection {
    redis::Client::open(redis_url())
        .unwrap()
        .get_multiplexed_async_connection()
        .await
        .expect("Failed to open raw redis connection")
}

async fn raw_get(conn: &mut MultiplexedConnection, key: &str) -> Option<String> {
    redis::cmd("GET").arg(key).query_async(conn).await.unwrap()
}

async fn raw_pttl(conn: &mut MultiplexedConnection, key: &str) -> i64 {
    redis::cmd("PTTL").arg(key).query_async(conn).await.unwrap()
}

async fn raw_del(conn: &mut MultiplexedConnection, key: &str) {
    let _: i64 = redis::cmd("DEL").arg(key).query_async(conn).await.unwrap();
}

// ==================== Acquire Tests ====================

#[tokio::test]
#[ignore = "requires running redis"]
async fn test_acquire_absent_key_sets_value_and_ttl() {
    let replica = replica().await;
    let mut conn = raw_connection().await;
    let key = unique_key("acquire-absent");

    assert!(replica.acquire(&key, "token-a", LONG_TTL).await.unwrap());

    assert_eq!(raw_get(&mut conn, &key).await.as_deref(), Some("token-a"));
    let pttl = raw_pttl(&mut conn, &key).await;
    assert!(pttl > 0 && pttl <= 60_000, "unexpected PTTL {}", pttl);

    raw_del(&mut conn, &key).await;
}

#[tokio::test]
#[ignore = "requires running redis"]
async fn test_acquire_present_key_is_refused() {
    let replica = replica().await;
    let mut conn = raw_connection().await;
    let key = unique_key("acquire-present");

    assert!(replica.acquire(&key, "token-a", LONG_TTL).await.unwrap());
    assert!(!replica.acquire(&key, "token-b", LONG_TTL).await.unwrap());

    // The first holder keeps the key
    assert_eq!(raw_get(&mut conn, &key).await.as_deref(), Some("token-a"));

    raw_del(&mut conn, &key).await;
}

// ==================== Release Tests ====================

#[tokio::test]
#[ignore = "requires running redis"]
async fn test_release_with_matching_token_deletes_key() {
    let replica = replica().await;
    let mut conn = raw_connection().await;
    let key = unique_key("release-match");

    assert!(replica.acquire(&key, "token-a", LONG_TTL).await.unwrap());
    assert!(replica.release(&key, "token-a").await.unwrap());

    assert_eq!(raw_get(&mut conn, &key).await, None);
}

#[tokio::test]
#[ignore = "requires running redis"]
async fn test_release_with_wrong_token_leaves_key_untouched() {
    let replica = replica().await;
    let mut conn = raw_connection().await;
    let key = unique_key("release-wrong");

    assert!(replica.acquire(&key, "token-a", LONG_TTL).await.unwrap());
    assert!(!replica.release(&key, "token-b").await.unwrap());

    assert_eq!(raw_get(&mut conn, &key).await.as_deref(), Some("token-a"));
    let pttl = raw_pttl(&mut conn, &key).await;
    assert!(pttl > 30_000, "PTTL changed to {}", pttl);

    raw_del(&mut conn, &key).await;
}

// ==================== Extend Tests ====================

#[tokio::test]
#[ignore = "requires running redis"]
async fn test_extend_with_matching_token_resets_ttl() {
    let replica = replica().await;
    let mut conn = raw_connection().await;
    let key = unique_key("extend-match");

    assert!(
        replica
            .acquire(&key, "token-a", Duration::from_secs(5))
            .await
            .unwrap()
    );
    assert!(replica.extend(&key, "token-a", LONG_TTL).await.unwrap());

    let pttl = raw_pttl(&mut conn, &key).await;
    assert!(pttl > 30_000, "PTTL not extended: {}", pttl);

    raw_del(&mut conn, &key).await;
}

#[tokio::test]
#[ignore = "requires running redis"]
async fn test_extend_with_wrong_token_leaves_key_untouched() {
    let replica = replica().await;
    let mut conn = raw_connection().await;
    let key = unique_key("extend-wrong");

    assert!(replica.acquire(&key, "token-a", LONG_TTL).await.unwrap());
    assert!(
        !replica
            .extend(&key, "token-b", Duration::from_millis(500))
            .await
            .unwrap()
    );

    assert_eq!(raw_get(&mut conn, &key).await.as_deref(), Some("token-a"));
    let pttl = raw_pttl(&mut conn, &key).await;
    assert!(pttl > 30_000, "PTTL changed to {}", pttl);

    raw_del(&mut conn, &key).await;
}

#[tokio::test]
#[ignore = "requires running redis"]
async fn test_extend_missing_key_is_refused() {
    let replica = replica().await;
    let mut conn = raw_connection().await;
    let key = unique_key("extend-missing");

    assert!(!replica.extend(&key, "token-a", LONG_TTL).await.unwrap());
    assert_eq!(raw_get(&mut conn, &key).await, None);
}

// ==================== Read Tests ====================

#[tokio::test]
#[ignore = "requires running redis"]
async fn test_read_missing_key_is_none() {
    let replica = replica().await;
    let key = unique_key("read-missing");

    assert_eq!(replica.read(&key).await.unwrap(), None);
}

#[tokio::test]
#[ignore = "requires running redis"]
async fn test_read_returns_stored_token() {
    let replica = replica().await;
    let mut conn = raw_connection().await;
    let key = unique_key("read-present");

    assert!(replica.acquire(&key, "token-a", LONG_TTL).await.unwrap());
    assert_eq!(
        replica.read(&key).await.unwrap().as_deref(),
        Some("token-a")
    );

    raw_del(&mut conn, &key).await;
}
