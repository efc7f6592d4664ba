// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory KV backend for tests and standalone runs.
//!
//! TTLs are evaluated lazily against the injected [`Clock`], so tests
//! drive expiry with a `FakeClock` instead of sleeping.

use crate::backend::KvBackend;
use crate::store::CacheError;
use aegis_core::{Clock, SystemClock};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Clone)]
struct Entry {
    value: String,
    /// Epoch ms after which the entry is unreadable. None = persistent.
    expires_at: Option<u64>,
}

/// HashMap-backed [`KvBackend`].
#[derive(Clone)]
pub struct MemoryBackend<C: Clock = SystemClock> {
    entries: std::sync::Arc<Mutex<HashMap<String, Entry>>>,
    hashes: std::sync::Arc<Mutex<HashMap<String, HashMap<String, String>>>>,
    clock: C,
}

impl MemoryBackend<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for MemoryBackend<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> MemoryBackend<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            entries: std::sync::Arc::new(Mutex::new(HashMap::new())),
            hashes: std::sync::Arc::new(Mutex::new(HashMap::new())),
            clock,
        }
    }

    fn live_value(&self, entry: &Entry) -> Option<String> {
        match entry.expires_at {
            Some(deadline) if self.clock.epoch_ms() >= deadline => None,
            _ => Some(entry.value.clone()),
        }
    }
}

/// Match a Redis-style glob pattern (only `*` is supported, which is
/// all the control plane emits).
fn glob_match(pattern: &str, key: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == key;
    }
    let mut rest = key;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            match rest.strip_prefix(part) {
                Some(r) => rest = r,
                None => return false,
            }
        } else if i == parts.len() - 1 && !pattern.ends_with('*') {
            return rest.ends_with(part);
        } else {
            match rest.find(part) {
                Some(pos) => rest = &rest[pos + part.len()..],
                None => return false,
            }
        }
    }
    true
}

#[async_trait]
impl<C: Clock> KvBackend for MemoryBackend<C> {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let entries = self.entries.lock();
        Ok(entries.get(key).and_then(|e| self.live_value(e)))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        let expires_at = match ttl {
            Some(ttl) if !ttl.is_zero() => Some(self.clock.epoch_ms() + ttl.as_millis() as u64),
            _ => None,
        };
        self.entries.lock().insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        self.entries.lock().remove(key);
        self.hashes.lock().remove(key);
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        let entries = self.entries.lock();
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(k, e)| glob_match(pattern, k) && self.live_value(e).is_some())
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), CacheError> {
        let deadline = self.clock.epoch_ms() + ttl.as_millis() as u64;
        if let Some(entry) = self.entries.lock().get_mut(key) {
            entry.expires_at = Some(deadline);
        }
        Ok(())
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), CacheError> {
        self.hashes
            .lock()
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, CacheError> {
        let mut entries = self.entries.lock();
        let current = match entries.get(key).and_then(|e| self.live_value(e)) {
            Some(raw) => raw.parse::<i64>().map_err(|_| CacheError::NotAnInteger {
                key: key.to_string(),
            })?,
            None => 0,
        };
        let next = current + delta;
        let expires_at = entries.get(key).and_then(|e| e.expires_at);
        entries.insert(
            key.to_string(),
            Entry {
                value: next.to_string(),
                expires_at,
            },
        );
        Ok(next)
    }
}
