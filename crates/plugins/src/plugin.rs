// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The plugin contract.

use crate::definition::PluginDefinition;
use crate::host::HostApi;
use aegis_core::Event;
use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Plugin-side failures.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("missing connector: {0}")]
    MissingConnector(String),

    #[error("{0}")]
    Runtime(String),
}

/// One plugin implementation. Built-ins implement this directly;
/// dynamic artifacts export a constructor returning a boxed instance.
///
/// Lifecycle: `initialize(config, host)` → `start(ctx)` → zero or more
/// `handle_event` calls → `stop()`. `update_config` may be hot-applied
/// between events.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn definition(&self) -> PluginDefinition;

    async fn initialize(&mut self, config: serde_json::Value, host: HostApi)
        -> Result<(), PluginError>;

    /// Start background work. `ctx` is cancelled on stop; long-running
    /// plugins spawn their tasks against it.
    async fn start(&mut self, ctx: CancellationToken) -> Result<(), PluginError>;

    async fn handle_event(&mut self, event: &Event) -> Result<(), PluginError>;

    async fn stop(&mut self) -> Result<(), PluginError>;

    /// Re-validated config, hot-applied. Default: accept silently.
    async fn update_config(&mut self, _config: serde_json::Value) -> Result<(), PluginError> {
        Ok(())
    }
}

/// Constructor registered for a built-in plugin (`define()` style).
pub type PluginFactory = fn() -> Box<dyn Plugin>;
