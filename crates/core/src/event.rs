// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed event model for the control plane.
//!
//! Every event carries a server id, its source, a per-(server, source)
//! monotonic sequence number, a UTC timestamp, and a typed payload.
//! Serializes with `{"type": "EVENT_NAME", ...fields}` flattened into
//! the envelope, which is also the JSON view that trigger conditions
//! and `{{event.*}}` interpolation resolve against.

use crate::id::ServerId;
use crate::player::Player;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where an event originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
    Rcon,
    Log,
    Derived,
}

/// Routing tag for an event, one per payload variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    RconChatMessage,
    RconPlayerWarned,
    RconPlayerKicked,
    RconPlayerBanned,
    RconSquadCreated,
    RconServerInfo,
    LogPlayerConnected,
    LogJoinSucceeded,
    LogPlayerDisconnected,
    LogPlayerDied,
    LogPlayerWounded,
    LogAdminBroadcast,
    LogNewGame,
    LogRoundEnded,
    LogGameEventUnified,
    PlayerListUpdated,
    Unparsed,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RconChatMessage => "RCON_CHAT_MESSAGE",
            Self::RconPlayerWarned => "RCON_PLAYER_WARNED",
            Self::RconPlayerKicked => "RCON_PLAYER_KICKED",
            Self::RconPlayerBanned => "RCON_PLAYER_BANNED",
            Self::RconSquadCreated => "RCON_SQUAD_CREATED",
            Self::RconServerInfo => "RCON_SERVER_INFO",
            Self::LogPlayerConnected => "LOG_PLAYER_CONNECTED",
            Self::LogJoinSucceeded => "LOG_JOIN_SUCCEEDED",
            Self::LogPlayerDisconnected => "LOG_PLAYER_DISCONNECTED",
            Self::LogPlayerDied => "LOG_PLAYER_DIED",
            Self::LogPlayerWounded => "LOG_PLAYER_WOUNDED",
            Self::LogAdminBroadcast => "LOG_ADMIN_BROADCAST",
            Self::LogNewGame => "LOG_NEW_GAME",
            Self::LogRoundEnded => "LOG_ROUND_ENDED",
            Self::LogGameEventUnified => "LOG_GAME_EVENT_UNIFIED",
            Self::PlayerListUpdated => "PLAYER_LIST_UPDATED",
            Self::Unparsed => "UNPARSED",
        }
    }
}

impl std::str::FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_string()))
            .map_err(|_| UnknownEventKind(s.to_string()))
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for unrecognized event type names.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event type: {0}")]
pub struct UnknownEventKind(pub String);

/// Typed event payload. The `type` tag is part of the wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventPayload {
    // -- rcon push / command sourced --
    RconChatMessage {
        chat_type: String,
        eos_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        steam_id: Option<String>,
        player_name: String,
        message: String,
    },
    RconPlayerWarned {
        player_name: String,
        message: String,
    },
    RconPlayerKicked {
        player_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        eos_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        steam_id: Option<String>,
        player_name: String,
    },
    RconPlayerBanned {
        player_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        steam_id: Option<String>,
        player_name: String,
        interval: String,
    },
    RconSquadCreated {
        player_name: String,
        eos_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        steam_id: Option<String>,
        squad_id: String,
        squad_name: String,
        team_name: String,
    },
    RconServerInfo {
        server_name: String,
        player_count: u32,
        max_players: u32,
        current_layer: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        next_layer: Option<String>,
    },

    // -- log sourced --
    LogPlayerConnected {
        chain_id: String,
        player_controller: String,
        ip: String,
        eos_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        steam_id: Option<String>,
    },
    LogJoinSucceeded {
        chain_id: String,
        player_suffix: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        eos_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        steam_id: Option<String>,
    },
    LogPlayerDisconnected {
        chain_id: String,
        ip: String,
        player_controller: String,
        eos_id: String,
    },
    LogPlayerDied {
        victim_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        victim_eos: Option<String>,
        damage: f64,
        attacker_player_controller: String,
        weapon: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attacker_eos: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attacker_steam: Option<String>,
    },
    LogPlayerWounded {
        victim_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        victim_eos: Option<String>,
        damage: f64,
        attacker_player_controller: String,
        weapon: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attacker_eos: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attacker_steam: Option<String>,
    },
    LogAdminBroadcast {
        message: String,
        from: String,
    },
    LogNewGame {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dlc: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        map_classname: Option<String>,
        layer_classname: String,
    },
    LogRoundEnded {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        winner: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        layer: Option<String>,
    },
    /// Unified shape for round/game transition lines. Emitted in
    /// addition to the legacy payload for the documented subset; the
    /// duplicate emission is part of the contract.
    LogGameEventUnified {
        event_type: String,
        data: serde_json::Value,
    },

    // -- derived --
    PlayerListUpdated {
        player_count: u32,
        team_count: u32,
        squad_count: u32,
    },
    /// A line no pattern matched. Published for debugging; never fatal.
    Unparsed {
        line: String,
    },
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::RconChatMessage { .. } => EventKind::RconChatMessage,
            Self::RconPlayerWarned { .. } => EventKind::RconPlayerWarned,
            Self::RconPlayerKicked { .. } => EventKind::RconPlayerKicked,
            Self::RconPlayerBanned { .. } => EventKind::RconPlayerBanned,
            Self::RconSquadCreated { .. } => EventKind::RconSquadCreated,
            Self::RconServerInfo { .. } => EventKind::RconServerInfo,
            Self::LogPlayerConnected { .. } => EventKind::LogPlayerConnected,
            Self::LogJoinSucceeded { .. } => EventKind::LogJoinSucceeded,
            Self::LogPlayerDisconnected { .. } => EventKind::LogPlayerDisconnected,
            Self::LogPlayerDied { .. } => EventKind::LogPlayerDied,
            Self::LogPlayerWounded { .. } => EventKind::LogPlayerWounded,
            Self::LogAdminBroadcast { .. } => EventKind::LogAdminBroadcast,
            Self::LogNewGame { .. } => EventKind::LogNewGame,
            Self::LogRoundEnded { .. } => EventKind::LogRoundEnded,
            Self::LogGameEventUnified { .. } => EventKind::LogGameEventUnified,
            Self::PlayerListUpdated { .. } => EventKind::PlayerListUpdated,
            Self::Unparsed { .. } => EventKind::Unparsed,
        }
    }
}

/// Player/team/squad context resolved by the tracker when it
/// republishes an event as `Derived`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player: Option<Player>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attacker: Option<Player>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub victim: Option<Player>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teamkill: Option<bool>,
}

impl Enrichment {
    pub fn is_empty(&self) -> bool {
        self.player.is_none()
            && self.attacker.is_none()
            && self.victim.is_none()
            && self.teamkill.is_none()
    }
}

/// One event on the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub server: ServerId,
    pub source: EventSource,
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: EventPayload,
    #[serde(default, skip_serializing_if = "Enrichment::is_empty")]
    pub enrichment: Enrichment,
}

impl Event {
    pub fn new(
        server: ServerId,
        source: EventSource,
        seq: u64,
        timestamp: DateTime<Utc>,
        payload: EventPayload,
    ) -> Self {
        Self {
            server,
            source,
            seq,
            timestamp,
            payload,
            enrichment: Enrichment::default(),
        }
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    /// JSON view used by trigger conditions and template interpolation.
    ///
    /// Payload fields appear at the top level next to `type`, `server`,
    /// `seq`, `timestamp`, and (when present) `enrichment`.
    pub fn view(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Resolves player/team/squad context for an event at consumption
/// time. Implemented by the player tracker; consulted by the workflow
/// scheduler (and anything else that wants enriched views) so that
/// each event fires its consumers exactly once, already enriched.
#[async_trait::async_trait]
pub trait Enricher: Send + Sync + 'static {
    async fn enrich(&self, event: &mut Event);
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
