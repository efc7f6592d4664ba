// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::backend::KvBackend;
use crate::memory::MemoryBackend;
use crate::store::{Cache, CacheError};
use aegis_core::FakeClock;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn cache_with_clock(clock: FakeClock) -> Cache {
    Cache::new(Arc::new(MemoryBackend::with_clock(clock)))
}

#[tokio::test]
async fn set_get_del_round_trip() {
    let cache = cache_with_clock(FakeClock::new());
    cache.set("k", "v", None).await.unwrap();
    assert_eq!(cache.get("k").await.unwrap(), Some("v".into()));
    cache.del("k").await.unwrap();
    assert_eq!(cache.get("k").await.unwrap(), None);
}

#[tokio::test]
async fn entries_with_ttl_are_unreadable_after_expiry() {
    let clock = FakeClock::new();
    let cache = cache_with_clock(clock.clone());

    cache
        .set("k", "v", Some(Duration::from_secs(1)))
        .await
        .unwrap();

    clock.advance(Duration::from_millis(500));
    assert_eq!(cache.get("k").await.unwrap(), Some("v".into()));

    clock.advance(Duration::from_millis(1000));
    assert_eq!(cache.get("k").await.unwrap(), None);
    assert!(cache.keys("*").await.unwrap().is_empty());
}

#[tokio::test]
async fn zero_ttl_means_persistent() {
    let clock = FakeClock::new();
    let cache = cache_with_clock(clock.clone());
    cache.set("k", "v", Some(Duration::ZERO)).await.unwrap();
    clock.advance(Duration::from_secs(3600));
    assert_eq!(cache.get("k").await.unwrap(), Some("v".into()));
}

#[tokio::test]
async fn incr_by_starts_missing_keys_at_zero() {
    let cache = cache_with_clock(FakeClock::new());
    assert_eq!(cache.incr_by("n", 5).await.unwrap(), 5);
    assert_eq!(cache.incr_by("n", -2).await.unwrap(), 3);
}

#[tokio::test]
async fn incr_by_rejects_non_integer_values() {
    let cache = cache_with_clock(FakeClock::new());
    cache.set("n", "not-a-number", None).await.unwrap();
    let err = cache.incr_by("n", 1).await.unwrap_err();
    assert!(matches!(err, CacheError::NotAnInteger { .. }));
}

#[tokio::test]
async fn json_helpers_round_trip() {
    let cache = cache_with_clock(FakeClock::new());
    let value = serde_json::json!({"count": 3, "layer": "Narva_RAAS_v1"});
    cache.set_json("j", &value, None).await.unwrap();
    let back: serde_json::Value = cache.get_json("j").await.unwrap().unwrap();
    assert_eq!(back, value);
}

/// Backend that fails a fixed number of times before succeeding.
struct FlakyBackend {
    inner: MemoryBackend,
    failures_left: AtomicU32,
    calls: AtomicU32,
}

#[async_trait]
impl KvBackend for FlakyBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(CacheError::Backend("transient".into()));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        self.inner.set(key, value, ttl).await
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        self.inner.del(key).await
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        self.inner.keys(pattern).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), CacheError> {
        self.inner.expire(key, ttl).await
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), CacheError> {
        self.inner.hset(key, field, value).await
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, CacheError> {
        self.inner.incr_by(key, delta).await
    }
}

#[tokio::test]
async fn transient_failures_are_retried_up_to_cap() {
    let backend = Arc::new(FlakyBackend {
        inner: MemoryBackend::new(),
        failures_left: AtomicU32::new(2),
        calls: AtomicU32::new(0),
    });
    let cache = Cache::new(backend.clone());
    cache.set("k", "v", None).await.unwrap();

    // Fails twice, succeeds on the third (and final) attempt.
    assert_eq!(cache.get("k").await.unwrap(), Some("v".into()));
    assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn retries_are_capped_at_three_attempts() {
    let backend = Arc::new(FlakyBackend {
        inner: MemoryBackend::new(),
        failures_left: AtomicU32::new(10),
        calls: AtomicU32::new(0),
    });
    let cache = Cache::new(backend.clone());
    assert!(cache.get("k").await.is_err());
    assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
}
