// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Teamkill detection end to end: wounded event → tracker enrichment →
//! trigger condition → warn_player action → RCON AdminWarn.

use crate::prelude::*;
use serde_json::json;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn teamkill_fires_warning_workflow() {
    let h = SpecHarness::start().await;
    h.install_workflow(json!({
        "id": "wf-teamkill",
        "server_id": SERVER,
        "name": "Warn teamkillers",
        "enabled": true,
        "version": 1,
        "triggers": [{
            "id": "t1",
            "event_type": "LOG_PLAYER_WOUNDED",
            "conditions": [
                {"path": "enrichment.teamkill", "op": "eq", "value": true}
            ],
            "enabled": true
        }],
        "steps": [{
            "id": "warn",
            "name": "Warn the attacker",
            "type": "action",
            "config": {
                "action_type": "warn_player",
                "params": {
                    "player": "{{event.enrichment.attacker.eos_id}}",
                    "message": "Teamkilling is not allowed"
                }
            }
        }]
    }))
    .await;

    h.bus().publish(teamkill_wounded_event()).await;

    let command = h
        .wait_for_command(|c| c.starts_with("AdminWarn"))
        .await;
    assert_eq!(
        command,
        format!("AdminWarn \"{EOS_ATTACKER}\" Teamkilling is not allowed")
    );
    h.supervisor.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cross_team_wound_does_not_fire() {
    let h = SpecHarness::start().await;
    h.install_workflow(json!({
        "id": "wf-teamkill",
        "server_id": SERVER,
        "name": "Warn teamkillers",
        "enabled": true,
        "version": 1,
        "triggers": [{
            "id": "t1",
            "event_type": "LOG_PLAYER_WOUNDED",
            "conditions": [
                {"path": "enrichment.teamkill", "op": "eq", "value": true}
            ],
            "enabled": true
        }],
        "steps": [{
            "id": "warn",
            "name": "Warn the attacker",
            "type": "action",
            "config": {
                "action_type": "warn_player",
                "params": {"player": "{{event.enrichment.attacker.eos_id}}", "message": "no"}
            }
        }]
    }))
    .await;

    // Raider (team 1) wounds Ivan (team 2): not a teamkill.
    let mut event = teamkill_wounded_event();
    if let aegis_core::EventPayload::LogPlayerWounded {
        victim_name,
        victim_eos,
        ..
    } = &mut event.payload
    {
        *victim_name = "Ivan".into();
        *victim_eos = Some(EOS_ENEMY.into());
    }
    h.bus().publish(event).await;

    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
    assert!(!h.fake.recorded().iter().any(|c| c.starts_with("AdminWarn")));
    h.supervisor.shutdown().await;
}
