// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! RCON reconnect: in-flight failure surfaces `DISCONNECTED`, the
//! manager reconnects within backoff, and the next command succeeds.

use crate::prelude::*;
use aegis_rcon::{CommandOptions, RconError};
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn in_flight_disconnect_then_recovery() {
    let h = SpecHarness::start().await;
    let rcon = h.supervisor.rcon();

    // Drop the socket while the next command is in flight.
    h.fake.drop_after(1);
    let err = rcon
        .execute(&h.server(), "AdminListDisconnectedPlayers", CommandOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err, RconError::Disconnected);

    // The manager reconnects with backoff; a subsequent command
    // succeeds against the fresh connection.
    let mut result = Err(RconError::Disconnected);
    for _ in 0..100 {
        result = rcon
            .execute(&h.server(), "ShowCurrentMap", CommandOptions::default())
            .await;
        if result.is_ok() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(result.unwrap(), "ok:ShowCurrentMap");

    let health = rcon.health(&h.server()).unwrap();
    assert!(health.connected);
    h.supervisor.shutdown().await;
}
