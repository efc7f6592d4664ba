// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bus delivery invariants at the supervisor boundary: matching
//! subscribers observe every event in publication order, or the drop
//! shows up in their overflow counter.

use crate::prelude::*;
use aegis_core::{
    EventKind, EventPayload, OverflowPolicy, SubscriptionFilter, SubscriptionOptions,
};

fn broadcast(n: u64) -> aegis_core::Event {
    let mut event = aegis_core::test_support::log_event(
        SERVER,
        EventPayload::LogAdminBroadcast {
            message: format!("msg-{n}"),
            from: "RCON".into(),
        },
    );
    event.seq = n;
    event
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn subscribers_observe_publication_order() {
    let h = SpecHarness::start().await;
    let mut sub = h.bus().subscribe(
        SubscriptionFilter::server_kinds(h.server(), [EventKind::LogAdminBroadcast]),
        SubscriptionOptions::default(),
    );

    for n in 0..50 {
        h.bus().publish(broadcast(n)).await;
    }
    for n in 0..50 {
        let event = sub.recv().await.unwrap();
        assert_eq!(event.seq, n, "subscriber observed out-of-order delivery");
    }
    assert_eq!(sub.dropped(), 0);
    h.supervisor.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn overflow_is_recorded_not_silent() {
    let h = SpecHarness::start().await;
    let mut sub = h.bus().subscribe(
        SubscriptionFilter::server_kinds(h.server(), [EventKind::LogAdminBroadcast]),
        SubscriptionOptions {
            capacity: 8,
            policy: OverflowPolicy::DropOldest,
        },
    );

    let published = 32u64;
    for n in 0..published {
        h.bus().publish(broadcast(n)).await;
    }

    let mut observed = 0u64;
    while sub.try_recv().is_some() {
        observed += 1;
    }
    // Every event was either observed or counted as dropped.
    assert_eq!(observed + sub.dropped(), published);
    assert!(sub.dropped() > 0);
    h.supervisor.shutdown().await;
}
