// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host capabilities injected into plugins at `initialize`.
//!
//! Injection is one-way: plugins receive these handles and never
//! reach back into the runtime's internals.

use aegis_cache::{Cache, CacheError};
use aegis_core::{ConnectorRegistry, Player, ServerId};
use aegis_rcon::{CommandOptions, CommandRunner, RconError};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Read access to the server's derived state (backed by the tracker).
#[async_trait]
pub trait ServerApi: Send + Sync + 'static {
    async fn players(&self) -> Vec<Player>;
    async fn server_info(&self) -> Option<serde_json::Value>;
}

/// Privileged operations, granted only to plugins the operator marked
/// as admin-capable.
#[async_trait]
pub trait AdminApi: Send + Sync + 'static {
    async fn execute(&self, command: &str) -> Result<String, RconError>;
}

/// KV access scoped under a plugin's own prefix.
#[derive(Clone)]
pub struct ScopedKv {
    cache: Cache,
    prefix: String,
}

impl ScopedKv {
    pub fn new(cache: Cache, plugin_id: &str) -> Self {
        Self {
            cache,
            prefix: format!("squad-aegis:plugin:{plugin_id}"),
        }
    }

    fn key(&self, key: &str) -> String {
        format!("{}:{key}", self.prefix)
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.cache.get(&self.key(key)).await
    }

    pub async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        self.cache.set(&self.key(key), value, ttl).await
    }

    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.cache.del(&self.key(key)).await
    }
}

/// Everything a plugin may touch.
#[derive(Clone)]
pub struct HostApi {
    pub server: ServerId,
    rcon: Arc<dyn CommandRunner>,
    pub server_api: Arc<dyn ServerApi>,
    pub connectors: ConnectorRegistry,
    pub kv: ScopedKv,
    admin: Option<Arc<dyn AdminApi>>,
    plugin_id: String,
}

impl HostApi {
    pub fn new(
        server: ServerId,
        rcon: Arc<dyn CommandRunner>,
        server_api: Arc<dyn ServerApi>,
        connectors: ConnectorRegistry,
        kv: ScopedKv,
        admin: Option<Arc<dyn AdminApi>>,
        plugin_id: impl Into<String>,
    ) -> Self {
        Self {
            server,
            rcon,
            server_api,
            connectors,
            kv,
            admin,
            plugin_id: plugin_id.into(),
        }
    }

    /// Send an RCON command on the plugin's server.
    pub async fn rcon_command(&self, command: &str) -> Result<String, RconError> {
        self.rcon
            .run(
                command,
                CommandOptions {
                    suppress_empty_response: true,
                    ..Default::default()
                },
            )
            .await
    }

    /// Admin surface; `None` unless the operator granted the privilege.
    pub fn admin(&self) -> Option<Arc<dyn AdminApi>> {
        self.admin.clone()
    }

    pub fn log_debug(&self, message: &str) {
        tracing::debug!(plugin = %self.plugin_id, server = %self.server, "{message}");
    }

    pub fn log_info(&self, message: &str) {
        tracing::info!(plugin = %self.plugin_id, server = %self.server, "{message}");
    }

    pub fn log_warn(&self, message: &str) {
        tracing::warn!(plugin = %self.plugin_id, server = %self.server, "{message}");
    }

    pub fn log_error(&self, message: &str) {
        tracing::error!(plugin = %self.plugin_id, server = %self.server, "{message}");
    }
}
