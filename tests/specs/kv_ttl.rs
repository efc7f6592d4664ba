// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow KV TTL semantics against the shared cache backend.

use crate::prelude::*;
use aegis_cache::WorkflowKv;
use serde_json::json;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn kv_entries_expire_at_their_ttl() {
    let h = SpecHarness::start().await;
    let kv = WorkflowKv::new(h.cache.clone(), "wf-kv".into());

    kv.set("k", &json!("v"), Some(Duration::from_secs(1)))
        .await
        .unwrap();

    // t = 0.5s: still readable.
    h.clock.advance(Duration::from_millis(500));
    assert_eq!(kv.get("k").await.unwrap(), Some(json!("v")));

    // t = 1.5s: expired.
    h.clock.advance(Duration::from_millis(1000));
    assert_eq!(kv.get("k").await.unwrap(), None);
    h.supervisor.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn zero_ttl_is_persistent_and_scoped_per_workflow() {
    let h = SpecHarness::start().await;
    let a = WorkflowKv::new(h.cache.clone(), "wf-a".into());
    let b = WorkflowKv::new(h.cache.clone(), "wf-b".into());

    a.set("counter", &json!(1), None).await.unwrap();
    h.clock.advance(Duration::from_secs(86_400));

    assert_eq!(a.get("counter").await.unwrap(), Some(json!(1)));
    assert_eq!(b.get("counter").await.unwrap(), None);
    assert_eq!(a.incr("counter", 2).await.unwrap(), 3);
    h.supervisor.shutdown().await;
}
