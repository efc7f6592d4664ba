// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! KV backend seam and the Redis implementation.

use crate::store::CacheError;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;

/// The operations the control plane needs from the external KV store.
///
/// The Redis wire surface we rely on: GET, SET, DEL, HSET, KEYS
/// (pattern), EXPIRE, plus INCRBY for counters. Expiry is server-side;
/// a `None` ttl means persistent.
#[async_trait]
pub trait KvBackend: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError>;
    async fn del(&self, key: &str) -> Result<(), CacheError>;
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError>;
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), CacheError>;
    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), CacheError>;
    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, CacheError>;
}

/// Redis-compatible backend over a managed connection.
///
/// `ConnectionManager` reconnects internally; transient failures still
/// surface as errors and are retried by [`crate::Cache`].
#[derive(Clone)]
pub struct RedisBackend {
    conn: ConnectionManager,
}

impl RedisBackend {
    /// Connect to a Redis-compatible server by URL
    /// (e.g. `redis://127.0.0.1:6379/0`).
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url).map_err(CacheError::from)?;
        let conn = ConnectionManager::new(client).await.map_err(CacheError::from)?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl KvBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        match ttl {
            Some(ttl) if !ttl.is_zero() => {
                let ms = ttl.as_millis().min(u64::MAX as u128) as u64;
                conn.pset_ex::<_, _, ()>(key, value, ms).await?;
            }
            _ => conn.set(key, value).await?,
        }
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        let mut conn = self.conn.clone();
        Ok(conn.keys(pattern).await?)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        conn.pexpire::<_, ()>(key, ttl.as_millis().min(i64::MAX as u128) as i64)
            .await?;
        Ok(())
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        conn.hset::<_, _, _, ()>(key, field, value).await?;
        Ok(())
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, CacheError> {
        let mut conn = self.conn.clone();
        Ok(conn.incr(key, delta).await?)
    }
}
