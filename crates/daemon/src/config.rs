// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration (`aegisd.toml`).

use aegis_core::ServerRecord;
use aegis_storage::TrustedKeyRecord;
use serde::Deserialize;
use std::path::PathBuf;

/// Top-level daemon configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Redis-compatible cache URL.
    pub cache_url: String,
    /// State directory for the pid lock and log file.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    /// Managed servers (standalone mode; the admin layer replaces this
    /// list at runtime through the repository).
    #[serde(default)]
    pub servers: Vec<ServerRecord>,
    /// Seconds between player tracker reconciliations.
    #[serde(default = "default_refresh_interval")]
    pub tracker_refresh_secs: u64,
    /// Per-component teardown grace, seconds.
    #[serde(default = "default_component_grace")]
    pub component_grace_secs: u64,
    /// Total workflow drain deadline at shutdown, seconds.
    #[serde(default = "default_drain_deadline")]
    pub drain_deadline_secs: u64,
    /// Directory holding signed dynamic plugin artifacts
    /// (`<name>.so` + detached `<name>.so.sig`). Unset disables
    /// dynamic loading.
    #[serde(default)]
    pub plugin_dir: Option<PathBuf>,
    /// Ed25519 public keys trusted to sign plugin artifacts.
    #[serde(default)]
    pub trusted_keys: Vec<TrustedKeyConfig>,
}

/// One trusted signing key, inline or from a PEM file.
#[derive(Debug, Clone, Deserialize)]
pub struct TrustedKeyConfig {
    pub key_id: String,
    #[serde(default)]
    pub public_key_pem: Option<String>,
    #[serde(default)]
    pub public_key_file: Option<PathBuf>,
}

impl TrustedKeyConfig {
    pub fn resolve(&self) -> Result<TrustedKeyRecord, crate::lifecycle::LifecycleError> {
        let public_key_pem = match (&self.public_key_pem, &self.public_key_file) {
            (Some(pem), _) => pem.clone(),
            (None, Some(path)) => std::fs::read_to_string(path)?,
            (None, None) => {
                return Err(crate::lifecycle::LifecycleError::TrustedKey(
                    self.key_id.clone(),
                ))
            }
        };
        Ok(TrustedKeyRecord {
            key_id: self.key_id.clone(),
            public_key_pem,
        })
    }
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("/var/lib/squad-aegis")
}

fn default_refresh_interval() -> u64 {
    30
}

fn default_component_grace() -> u64 {
    10
}

fn default_drain_deadline() -> u64 {
    30
}

impl Config {
    pub fn load(path: &std::path::Path) -> Result<Self, crate::lifecycle::LifecycleError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.state_dir.join("aegisd.pid")
    }

    pub fn log_path(&self) -> PathBuf {
        self.state_dir.join("aegisd.log")
    }
}
