// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Player, team, and squad domain model.
//!
//! Identity key is the EOS id; the Steam id is a secondary namespace
//! used during backfill when a log line arrives before the first RCON
//! snapshot. Name, controller, and suffix are lookup indices only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A player as seen by the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub eos_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steam_id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_controller: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_suffix: Option<String>,
    /// Empty string when the player is not on a team.
    #[serde(default)]
    pub team_id: String,
    /// Empty string when the player is unassigned.
    #[serde(default)]
    pub squad_id: String,
    #[serde(default)]
    pub role: String,
    pub connected: bool,
    pub last_updated: DateTime<Utc>,
}

impl Player {
    /// True when both players carry the same non-empty team id.
    pub fn same_team(&self, other: &Player) -> bool {
        !self.team_id.is_empty() && self.team_id == other.team_id
    }
}

/// A team as reported by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub team_id: String,
    pub team_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub faction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tickets: Option<u32>,
}

/// A squad within a team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Squad {
    pub squad_id: String,
    pub team_id: String,
    pub squad_name: String,
    pub size: u32,
    pub max_size: u32,
    pub locked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leader_eos_id: Option<String>,
}

#[cfg(test)]
#[path = "player_tests.rs"]
mod tests;
