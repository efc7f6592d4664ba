// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Managed server records.
//!
//! Created/updated/deleted by the external admin layer; the supervisor
//! reacts by wiring or tearing down the per-server component stack.

use crate::id::ServerId;
use serde::{Deserialize, Serialize};

/// One managed game server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerRecord {
    pub id: ServerId,
    pub name: String,
    pub rcon: RconConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_source: Option<LogSourceConfig>,
}

/// RCON endpoint and credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RconConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
}

impl RconConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Where and how to read the server's log stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum LogSourceConfig {
    Local {
        path: String,
        #[serde(default)]
        read_from_start: bool,
    },
    Sftp {
        host: String,
        port: u16,
        username: String,
        password: String,
        path: String,
        /// Poll interval in seconds, clamped to 1..=300.
        #[serde(default = "default_poll_frequency")]
        poll_frequency: u64,
        #[serde(default)]
        read_from_start: bool,
    },
    Ftp {
        host: String,
        port: u16,
        username: String,
        password: String,
        path: String,
        #[serde(default = "default_poll_frequency")]
        poll_frequency: u64,
        #[serde(default)]
        read_from_start: bool,
    },
}

fn default_poll_frequency() -> u64 {
    5
}

impl LogSourceConfig {
    /// Poll interval clamped to the supported range.
    pub fn poll_frequency_secs(&self) -> u64 {
        match self {
            Self::Local { .. } => 1,
            Self::Sftp { poll_frequency, .. } | Self::Ftp { poll_frequency, .. } => {
                (*poll_frequency).clamp(1, 300)
            }
        }
    }

    pub fn read_from_start(&self) -> bool {
        match self {
            Self::Local { read_from_start, .. }
            | Self::Sftp { read_from_start, .. }
            | Self::Ftp { read_from_start, .. } => *read_from_start,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_frequency_is_clamped() {
        let config = LogSourceConfig::Sftp {
            host: "logs.example".into(),
            port: 22,
            username: "squad".into(),
            password: "secret".into(),
            path: "/logs/SquadGame.log".into(),
            poll_frequency: 900,
            read_from_start: false,
        };
        assert_eq!(config.poll_frequency_secs(), 300);
    }

    #[test]
    fn provider_tag_selects_variant() {
        let config: LogSourceConfig = serde_json::from_str(
            r#"{"provider": "local", "path": "/tmp/SquadGame.log", "read_from_start": true}"#,
        )
        .unwrap();
        assert!(matches!(config, LogSourceConfig::Local { .. }));
        assert!(config.read_from_start());
    }

    #[test]
    fn rcon_address_joins_host_and_port() {
        let rcon = RconConfig {
            host: "10.0.0.5".into(),
            port: 21114,
            password: "hunter2".into(),
        };
        assert_eq!(rcon.address(), "10.0.0.5:21114");
    }
}
