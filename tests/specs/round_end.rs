// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Round-end broadcast through a shared connector.

use crate::prelude::*;
use aegis_core::{Connector, ConnectorError};
use parking_lot::Mutex;
use serde_json::json;
use std::any::Any;
use std::sync::Arc;

struct DiscordDouble {
    sent: Mutex<Vec<serde_json::Value>>,
}

#[async_trait::async_trait]
impl Connector for DiscordDouble {
    fn name(&self) -> &str {
        "discord"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    async fn send(&self, payload: serde_json::Value) -> Result<(), ConnectorError> {
        self.sent.lock().push(payload);
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn round_end_posts_to_discord_connector() {
    let h = SpecHarness::start().await;
    let discord = Arc::new(DiscordDouble {
        sent: Mutex::new(vec![]),
    });
    h.connectors.register(discord.clone());

    h.install_workflow(json!({
        "id": "wf-round-end",
        "server_id": SERVER,
        "name": "Announce round results",
        "enabled": true,
        "version": 1,
        "triggers": [{
            "id": "t1",
            "event_type": "LOG_ROUND_ENDED",
            "conditions": [{"path": "winner", "op": "exists", "value": true}],
            "enabled": true
        }],
        "steps": [{
            "id": "post",
            "name": "Post to Discord",
            "type": "action",
            "config": {
                "action_type": "connector_send",
                "params": {
                    "connector": "discord",
                    "payload": {"content": "{{event.winner}} won on {{event.layer}}"}
                }
            }
        }]
    }))
    .await;

    h.bus().publish(round_ended_event()).await;

    for _ in 0..200 {
        if !discord.sent.lock().is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(25)).await;
    }
    let sent = discord.sent.lock().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["content"], "Team1 won on Narva_RAAS_v1");
    h.supervisor.shutdown().await;
}
