//! Redis-backed coordination store.

use super::{CoordinationError, CoordinationResult, CoordinationStore};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, Script};
use std::time::Duration;

/// Deletes the lock only when the caller still owns it
const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// Increments and refreshes the expiry in one round trip
const INCR_SCRIPT: &str = r#"
local value = redis.call("INCRBY", KEYS[1], ARGV[1])
redis.call("EXPIRE", KEYS[1], ARGV[2])
return value
"#;

#[derive(Clone)]
pub struct RedisCoordination {
    conn: MultiplexedConnection,
}

impl RedisCoordination {
    /// Open a multiplexed connection to `redis_url`
    pub async fn connect(redis_url: &str) -> CoordinationResult<Self> {
        let client = Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self { conn })
    }

    fn ttl_secs(ttl: Duration) -> u64 {
        ttl.as_secs().max(1)
    }
}

#[async_trait]
impl CoordinationStore for RedisCoordination {
    async fn try_lock(&self, key: &str, token: &str, ttl: Duration) -> CoordinationResult<bool> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(token)
            .arg("NX")
            .arg("EX")
            .arg(Self::ttl_secs(ttl))
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn release_lock(&self, key: &str, token: &str) -> CoordinationResult<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = Script::new(RELEASE_SCRIPT)
            .key(key)
            .arg(token)
            .invoke_async(&mut conn)
            .await?;
        Ok(removed > 0)
    }

    async fn get(&self, key: &str) -> CoordinationResult<Option<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CoordinationResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key, value, Self::ttl_secs(ttl)).await?;
        Ok(())
    }

    async fn incr(&self, key: &str, delta: i64, ttl: Duration) -> CoordinationResult<i64> {
        let mut conn = self.conn.clone();
        let value: i64 = Script::new(INCR_SCRIPT)
            .key(key)
            .arg(delta)
            .arg(Self::ttl_secs(ttl))
            .invoke_async(&mut conn)
            .await?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> CoordinationResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> CoordinationResult<usize> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = conn.keys(format!("{prefix}*")).await?;
        if keys.is_empty() {
            return Ok(0);
        }
        let removed: usize = conn.del(&keys).await?;
        Ok(removed)
    }

    async fn ping(&self) -> CoordinationResult<()> {
        let mut conn = self.conn.clone();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        if pong == "PONG" {
            Ok(())
        } else {
            Err(CoordinationError::Corrupt {
                key: "PING".to_string(),
                value: pong,
            })
        }
    }
}
