//! Redis-backed implementation of [`RoomCache`].
//!
//! Uses a [`ConnectionManager`] so a dropped connection is re-established
//! transparently; persistent outages surface as [`CacheError::Unavailable`]
//! and flip the application into cache-degraded mode via the supervisor.

use std::time::Duration;

use futures::future::BoxFuture;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};

use crate::cache::{CacheError, CacheResult, RoomCache};

const CONNECTION_TIMEOUT: Duration = Duration::from_millis(500);
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Room cache backed by a shared Redis connection.
#[derive(Clone)]
pub struct RedisRoomCache {
    connection: ConnectionManager,
}

impl RedisRoomCache {
    /// Open a managed connection to the Redis instance at `url`.
    pub async fn connect(url: &str) -> CacheResult<Self> {
        let client = redis::Client::open(url)
            .map_err(|err| CacheError::unavailable(format!("invalid redis url `{url}`"), err))?;

        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(1)
            .set_connection_timeout(CONNECTION_TIMEOUT)
            .set_response_timeout(RESPONSE_TIMEOUT);

        let connection = client
            .get_connection_manager_with_config(config)
            .await
            .map_err(|err| CacheError::unavailable("redis connection failed".into(), err))?;

        Ok(Self { connection })
    }
}

impl RoomCache for RedisRoomCache {
    fn get(&self, key: String) -> BoxFuture<'static, CacheResult<Option<String>>> {
        let mut connection = self.connection.clone();
        Box::pin(async move {
            redis::cmd("GET")
                .arg(&key)
                .query_async(&mut connection)
                .await
                .map_err(|err| CacheError::unavailable(format!("GET {key} failed"), err))
        })
    }

    fn set_with_ttl(
        &self,
        key: String,
        value: String,
        ttl_secs: u64,
    ) -> BoxFuture<'static, CacheResult<()>> {
        let mut connection = self.connection.clone();
        Box::pin(async move {
            redis::cmd("SET")
                .arg(&key)
                .arg(value)
                .arg("EX")
                .arg(ttl_secs)
                .query_async::<()>(&mut connection)
                .await
                .map_err(|err| CacheError::unavailable(format!("SET {key} failed"), err))
        })
    }

    fn delete(&self, key: String) -> BoxFuture<'static, CacheResult<()>> {
        let mut connection = self.connection.clone();
        Box::pin(async move {
            redis::cmd("DEL")
                .arg(&key)
                .query_async::<()>(&mut connection)
                .await
                .map_err(|err| CacheError::unavailable(format!("DEL {key} failed"), err))
        })
    }

    fn keys(&self, pattern: String) -> BoxFuture<'static, CacheResult<Vec<String>>> {
        let mut connection = self.connection.clone();
        Box::pin(async move {
            redis::cmd("KEYS")
                .arg(&pattern)
                .query_async(&mut connection)
                .await
                .map_err(|err| CacheError::unavailable(format!("KEYS {pattern} failed"), err))
        })
    }

    fn health_check(&self) -> BoxFuture<'static, CacheResult<()>> {
        let mut connection = self.connection.clone();
        Box::pin(async move {
            redis::cmd("PING")
                .query_async::<String>(&mut connection)
                .await
                .map(|_| ())
                .map_err(|err| CacheError::unavailable("PING failed".into(), err))
        })
    }
}
