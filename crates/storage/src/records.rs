// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Row shapes owned by the repository boundary.

use aegis_core::{PluginInstanceId, ServerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored configuration for one plugin instance.
///
/// The config is an untyped bag at this boundary; the plugin runtime
/// validates and coerces it against the plugin's declared schema on
/// the way in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginInstanceRecord {
    pub id: PluginInstanceId,
    pub server_id: ServerId,
    pub plugin_id: String,
    pub config: serde_json::Value,
    pub enabled: bool,
    /// Path to a signed dynamic artifact (absolute, or relative to
    /// the runtime's plugin directory). `None` means built-in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<std::path::PathBuf>,
    /// Sandbox limit overrides for dynamic instances.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox: Option<SandboxLimits>,
}

/// Per-instance sandbox limits as stored by the admin layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxLimits {
    pub max_memory_mb: u64,
    pub max_tasks: u64,
    pub cpu_time_limit_secs: u64,
}

/// A public key trusted to sign dynamic plugin artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustedKeyRecord {
    pub key_id: String,
    /// PEM-encoded Ed25519 verifying key.
    pub public_key_pem: String,
}

/// One executed RCON command, for the durable audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandHistoryEntry {
    pub server_id: ServerId,
    pub command: String,
    pub succeeded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
    pub executed_at: DateTime<Utc>,
}
