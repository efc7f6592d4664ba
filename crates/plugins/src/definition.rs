// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plugin definitions and instance status.

use crate::schema::ConfigField;
use aegis_core::EventKind;
use serde::{Deserialize, Serialize};

/// What a plugin declares about itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginDefinition {
    pub id: String,
    pub name: String,
    pub version: String,
    pub author: String,
    #[serde(default)]
    pub allow_multiple_instances: bool,
    /// Connector names that must exist before an instance can start.
    #[serde(default)]
    pub required_connectors: Vec<String>,
    /// Long-running plugins keep a background task after `start`.
    #[serde(default)]
    pub long_running: bool,
    /// Subscribe with a blocking queue instead of drop-oldest. Only
    /// for plugins that genuinely cannot lose events.
    #[serde(default)]
    pub lossless_delivery: bool,
    /// Loader capabilities a dynamic artifact needs; unsupported names
    /// reject the load.
    #[serde(default)]
    pub required_features: Vec<String>,
    #[serde(default)]
    pub config_schema: Vec<ConfigField>,
    /// Event kinds delivered to `handle_event`.
    #[serde(default)]
    pub events: Vec<EventKind>,
}

/// Instance lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginStatus {
    Stopped,
    Starting,
    Running,
    Stopping,
    Error,
    Disabled,
}
