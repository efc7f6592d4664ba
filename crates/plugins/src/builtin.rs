// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Built-in plugins.
//!
//! Registered at startup through their `define()` constructors; same
//! runtime contract as dynamic plugins.

use crate::definition::PluginDefinition;
use crate::host::HostApi;
use crate::plugin::{Plugin, PluginError};
use crate::schema::{ConfigField, FieldType};
use aegis_core::{Event, EventKind, EventPayload};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Warns teamkillers in-game and keeps a per-attacker tally in the
/// plugin's KV namespace.
pub struct TeamkillWarner {
    host: Option<HostApi>,
    warn_message: String,
    broadcast: bool,
}

impl TeamkillWarner {
    /// `define()` entrypoint.
    pub fn define() -> Box<dyn Plugin> {
        Box::new(Self {
            host: None,
            warn_message: String::new(),
            broadcast: false,
        })
    }
}

pub const TEAMKILL_WARNER_ID: &str = "teamkill-warner";

#[async_trait]
impl Plugin for TeamkillWarner {
    fn definition(&self) -> PluginDefinition {
        PluginDefinition {
            id: TEAMKILL_WARNER_ID.into(),
            name: "Teamkill Warner".into(),
            version: "1.1.0".into(),
            author: "squad-aegis".into(),
            allow_multiple_instances: false,
            required_connectors: vec![],
            long_running: false,
            lossless_delivery: false,
            required_features: vec![],
            config_schema: vec![
                ConfigField {
                    name: "warn_message".into(),
                    field_type: FieldType::String,
                    required: false,
                    default: Some("Teamkilling is not allowed".into()),
                    sensitive: false,
                    nested: None,
                },
                ConfigField {
                    name: "broadcast".into(),
                    field_type: FieldType::Bool,
                    required: false,
                    default: Some(false.into()),
                    sensitive: false,
                    nested: None,
                },
            ],
            events: vec![EventKind::LogPlayerWounded, EventKind::LogPlayerDied],
        }
    }

    async fn initialize(
        &mut self,
        config: serde_json::Value,
        host: HostApi,
    ) -> Result<(), PluginError> {
        self.warn_message = config
            .get("warn_message")
            .and_then(|v| v.as_str())
            .unwrap_or("Teamkilling is not allowed")
            .to_string();
        self.broadcast = config
            .get("broadcast")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        self.host = Some(host);
        Ok(())
    }

    async fn start(&mut self, _ctx: CancellationToken) -> Result<(), PluginError> {
        Ok(())
    }

    async fn handle_event(&mut self, event: &Event) -> Result<(), PluginError> {
        let host = self
            .host
            .as_ref()
            .ok_or_else(|| PluginError::Runtime("not initialized".into()))?;

        if event.enrichment.teamkill != Some(true) {
            return Ok(());
        }
        let Some(attacker) = &event.enrichment.attacker else {
            return Ok(());
        };
        let (EventPayload::LogPlayerWounded { .. } | EventPayload::LogPlayerDied { .. }) =
            &event.payload
        else {
            return Ok(());
        };

        host.rcon_command(&format!(
            "AdminWarn \"{}\" {}",
            attacker.eos_id, self.warn_message
        ))
        .await
        .map_err(|e| PluginError::Runtime(e.to_string()))?;

        let count = host
            .kv
            .get(&format!("tk:{}", attacker.eos_id))
            .await
            .ok()
            .flatten()
            .and_then(|raw| raw.parse::<u64>().ok())
            .unwrap_or(0)
            + 1;
        host.kv
            .set(&format!("tk:{}", attacker.eos_id), &count.to_string(), None)
            .await
            .map_err(|e| PluginError::Runtime(e.to_string()))?;

        if self.broadcast {
            host.rcon_command(&format!(
                "AdminBroadcast {} teamkilled ({count} total)",
                attacker.name
            ))
            .await
            .map_err(|e| PluginError::Runtime(e.to_string()))?;
        }
        host.log_info(&format!(
            "warned {} for teamkill ({count} total)",
            attacker.eos_id
        ));
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), PluginError> {
        Ok(())
    }

    async fn update_config(&mut self, config: serde_json::Value) -> Result<(), PluginError> {
        if let Some(message) = config.get("warn_message").and_then(|v| v.as_str()) {
            self.warn_message = message.to_string();
        }
        if let Some(broadcast) = config.get("broadcast").and_then(|v| v.as_bool()) {
            self.broadcast = broadcast;
        }
        Ok(())
    }
}
