// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fog-of-war automation: delay before the RCON call, and prompt
//! cancellation while sleeping.

use crate::prelude::*;
use aegis_storage::Repository;
use aegis_workflow::ExecutionStatus;
use serde_json::json;
use std::time::Duration;

fn fog_workflow(delay_ms: u64) -> serde_json::Value {
    json!({
        "id": "wf-fog",
        "server_id": SERVER,
        "name": "Fog of war on new game",
        "enabled": true,
        "version": 1,
        "triggers": [{
            "id": "t1",
            "event_type": "LOG_NEW_GAME",
            "conditions": [],
            "enabled": true
        }],
        "steps": [
            {
                "id": "wait",
                "name": "Wait for spawn wave",
                "type": "delay",
                "config": {"ms": delay_ms},
                "next_steps": ["fog"]
            },
            {
                "id": "fog",
                "name": "Enable fog",
                "type": "action",
                "config": {
                    "action_type": "rcon_command",
                    "params": {"command": "AdminSetFogOfWar 1"}
                }
            }
        ]
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rcon_call_waits_for_the_delay() {
    let h = SpecHarness::start().await;
    h.install_workflow(fog_workflow(1_500)).await;

    h.bus().publish(new_game_event()).await;

    // The executor must not issue the RCON call before the delay.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(
        !h.fake.recorded().iter().any(|c| c.contains("AdminSetFogOfWar")),
        "fog command issued before the delay elapsed"
    );

    let command = h
        .wait_for_command(|c| c.contains("AdminSetFogOfWar"))
        .await;
    assert_eq!(command, "AdminSetFogOfWar 1");
    h.supervisor.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelling_during_the_delay_yields_cancelled() {
    let h = SpecHarness::start().await;
    h.install_workflow(fog_workflow(30_000)).await;

    h.bus().publish(new_game_event()).await;

    // Wait until the execution is recorded as running.
    let mut running = vec![];
    for _ in 0..200 {
        running = h
            .repository
            .list_executions(&"wf-fog".into(), 10)
            .await
            .unwrap();
        if !running.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    assert!(!running.is_empty(), "execution never started");

    // Tearing the server down cancels in-flight executions.
    h.supervisor.remove_server(&h.server()).await;

    let mut status = None;
    for _ in 0..200 {
        let executions = h
            .repository
            .list_executions(&"wf-fog".into(), 10)
            .await
            .unwrap();
        if let Some(done) = executions.iter().find(|e| e.status.is_terminal()) {
            status = Some(done.status);
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    assert_eq!(status, Some(ExecutionStatus::Cancelled));
    assert!(
        !h.fake.recorded().iter().any(|c| c.contains("AdminSetFogOfWar")),
        "cancelled execution still ran its action"
    );
}
