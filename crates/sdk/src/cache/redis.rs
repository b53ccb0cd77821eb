use std::time::Duration;

use async_trait::async_trait;
use redis::{aio::ConnectionManager, Client};

use super::KeyValueCache;

/// A [`KeyValueCache`] backed by Redis.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    /// Connect to the server at `url`.
    pub async fn connect(url: &str) -> crate::Result<Self> {
        let client = Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    /// Get a handle of the underlying connection.
    pub fn connection(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

fn set_command(key: &str, value: &str, ttl: Option<Duration>) -> redis::Cmd {
    let mut cmd = redis::cmd("SET");
    cmd.arg(key).arg(value);
    if let Some(ttl) = ttl {
        let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
        cmd.arg("PX").arg(millis);
    }
    cmd
}

#[async_trait]
impl KeyValueCache for RedisCache {
    async fn get(&self, key: &str) -> crate::Result<Option<String>> {
        let mut conn = self.conn.clone();
        Ok(redis::cmd("GET").arg(key).query_async(&mut conn).await?)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> crate::Result<()> {
        let mut conn = self.conn.clone();
        set_command(key, value, ttl)
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> crate::Result<bool> {
        let mut conn = self.conn.clone();
        let mut cmd = set_command(key, value, ttl);
        cmd.arg("NX");
        let reply: Option<String> = cmd.query_async(&mut conn).await?;
        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> crate::Result<()> {
        let mut conn = self.conn.clone();
        redis::cmd("DEL")
            .arg(key)
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }
}
