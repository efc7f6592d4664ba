// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Trigger conditions fail closed on missing paths.

use crate::prelude::*;
use aegis_storage::Repository;
use serde_json::json;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn condition_on_missing_path_does_not_fire() {
    let h = SpecHarness::start().await;
    h.install_workflow(json!({
        "id": "wf-squad-filter",
        "server_id": SERVER,
        "name": "Only squad 3",
        "enabled": true,
        "version": 1,
        "triggers": [{
            "id": "t1",
            "event_type": "LOG_NEW_GAME",
            "conditions": [
                {"path": "event.player.squad_id", "op": "eq", "value": "3"}
            ],
            "enabled": true
        }],
        "steps": [{
            "id": "never",
            "name": "Should never run",
            "type": "action",
            "config": {
                "action_type": "rcon_command",
                "params": {"command": "AdminBroadcast should-not-happen"}
            }
        }]
    }))
    .await;

    // LOG_NEW_GAME has no player.squad_id: the comparison is false.
    h.bus().publish(new_game_event()).await;
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert!(
        !h.fake.recorded().iter().any(|c| c.contains("should-not-happen")),
        "trigger fired despite missing condition path"
    );
    let executions = h
        .repository
        .list_executions(&"wf-squad-filter".into(), 10)
        .await
        .unwrap();
    assert!(executions.is_empty(), "no execution should have started");
    h.supervisor.shutdown().await;
}
