// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-workflow persistent key/value state.
//!
//! Keys are scoped to one workflow id; a TTL of zero means persistent.
//! State is shared across executions of the same workflow and survives
//! restarts — it lives in the same cache backend as the tracker.

use crate::keys;
use crate::store::{Cache, CacheError};
use aegis_core::WorkflowId;
use std::time::Duration;

/// Handle to one workflow's KV namespace.
#[derive(Clone)]
pub struct WorkflowKv {
    cache: Cache,
    workflow: WorkflowId,
}

impl WorkflowKv {
    pub fn new(cache: Cache, workflow: WorkflowId) -> Self {
        Self { cache, workflow }
    }

    pub fn workflow(&self) -> &WorkflowId {
        &self.workflow
    }

    pub async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, CacheError> {
        self.cache
            .get_json(&keys::workflow_kv(&self.workflow, key))
            .await
    }

    /// Set a value. `ttl` of zero (or `None`) stores persistently.
    pub async fn set(
        &self,
        key: &str,
        value: &serde_json::Value,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let ttl = ttl.filter(|t| !t.is_zero());
        self.cache
            .set_json(&keys::workflow_kv(&self.workflow, key), value, ttl)
            .await
    }

    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.cache.del(&keys::workflow_kv(&self.workflow, key)).await
    }

    /// List bare key names under a prefix, sorted.
    pub async fn list(&self, prefix: &str) -> Result<Vec<String>, CacheError> {
        let full = self
            .cache
            .keys(&keys::workflow_kv_pattern(&self.workflow, prefix))
            .await?;
        let mut bare: Vec<String> = full
            .iter()
            .filter_map(|k| keys::workflow_kv_bare(&self.workflow, k))
            .collect();
        bare.sort();
        Ok(bare)
    }

    /// Atomic integer increment; missing keys start at zero.
    pub async fn incr(&self, key: &str, delta: i64) -> Result<i64, CacheError> {
        self.cache
            .incr_by(&keys::workflow_kv(&self.workflow, key), delta)
            .await
    }
}

#[cfg(test)]
#[path = "workflow_kv_tests.rs"]
mod tests;
