// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host-API glue between the plugin runtime and the rest of the stack.

use aegis_plugins::{AdminApi as AdminApiTrait, ServerApi};
use aegis_rcon::{parser, CommandOptions, CommandRunner, Priority, RconError};
use aegis_tracker::PlayerTracker;
use async_trait::async_trait;
use std::sync::Arc;

/// Plugin-facing view of one server, backed by the tracker and the
/// RCON channel.
pub struct TrackerServerApi {
    tracker: Arc<PlayerTracker>,
    runner: Arc<dyn CommandRunner>,
}

impl TrackerServerApi {
    pub fn new(tracker: Arc<PlayerTracker>, runner: Arc<dyn CommandRunner>) -> Self {
        Self { tracker, runner }
    }
}

#[async_trait]
impl ServerApi for TrackerServerApi {
    async fn players(&self) -> Vec<aegis_core::Player> {
        self.tracker.players().await.unwrap_or_default()
    }

    async fn server_info(&self) -> Option<serde_json::Value> {
        let body = self
            .runner
            .run("ShowServerInfo", CommandOptions::default())
            .await
            .ok()?;
        parser::parse_server_info(&body).and_then(|payload| serde_json::to_value(payload).ok())
    }
}

/// Privileged RCON passthrough, handed only to operator-trusted
/// plugins.
pub struct RconAdminApi {
    runner: Arc<dyn CommandRunner>,
}

impl RconAdminApi {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl AdminApiTrait for RconAdminApi {
    async fn execute(&self, command: &str) -> Result<String, RconError> {
        self.runner
            .run(
                command,
                CommandOptions {
                    priority: Priority::High,
                    suppress_empty_response: true,
                    ..Default::default()
                },
            )
            .await
    }
}
