// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cache facade: retry policy and typed JSON helpers over a backend.

use crate::backend::KvBackend;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Cache errors
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("kv backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("value at {key} is not an integer")]
    NotAnInteger { key: String },
}

impl From<redis::RedisError> for CacheError {
    fn from(e: redis::RedisError) -> Self {
        Self::Backend(e.to_string())
    }
}

/// Transient-failure retry cap for KV operations.
const MAX_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(50);

/// Shared cache handle. Cheap to clone.
#[derive(Clone)]
pub struct Cache {
    backend: Arc<dyn KvBackend>,
}

impl Cache {
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self { backend }
    }

    /// Run one backend call with the transient-retry policy.
    async fn with_retry<T, F, Fut>(&self, mut op: F) -> Result<T, CacheError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, CacheError>>,
    {
        let mut last = None;
        for attempt in 1..=MAX_ATTEMPTS {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if attempt < MAX_ATTEMPTS {
                        tracing::debug!(attempt, error = %e, "kv operation failed, retrying");
                        tokio::time::sleep(RETRY_DELAY * attempt).await;
                    }
                    last = Some(e);
                }
            }
        }
        // MAX_ATTEMPTS >= 1, so last is always set on this path.
        Err(last.unwrap_or_else(|| CacheError::Backend("retries exhausted".into())))
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.with_retry(|| self.backend.get(key)).await
    }

    pub async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        self.with_retry(|| self.backend.set(key, value, ttl)).await
    }

    pub async fn del(&self, key: &str) -> Result<(), CacheError> {
        self.with_retry(|| self.backend.del(key)).await
    }

    pub async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        self.with_retry(|| self.backend.keys(pattern)).await
    }

    pub async fn expire(&self, key: &str, ttl: Duration) -> Result<(), CacheError> {
        self.with_retry(|| self.backend.expire(key, ttl)).await
    }

    pub async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), CacheError> {
        self.with_retry(|| self.backend.hset(key, field, value)).await
    }

    pub async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, CacheError> {
        self.with_retry(|| self.backend.incr_by(key, delta)).await
    }

    /// Get and deserialize a JSON value.
    pub async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, CacheError> {
        match self.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Serialize and set a JSON value.
    pub async fn set_json<T: serde::Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let raw = serde_json::to_string(value)?;
        self.set(key, &raw, ttl).await
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
