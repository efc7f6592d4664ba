// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parsers for RCON command responses and push packets.
//!
//! Line formats follow the Squad server verbatim; the regex tables
//! below are declared in match order and pinned by tests. Unmatched
//! push bodies yield `None` and are surfaced by the manager as
//! `Unparsed` events.

use aegis_core::event::EventPayload;
use regex::Regex;
use std::sync::LazyLock;

// Allow expect here as the regexes are compile-time verified to be valid
#[allow(clippy::expect_used)]
fn rx(pattern: &str) -> Regex {
    Regex::new(pattern).expect("constant regex pattern is valid")
}

/// One row of `ListPlayers`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPlayer {
    pub eos_id: String,
    pub steam_id: Option<String>,
    pub name: String,
    pub team_id: String,
    pub squad_id: String,
    pub is_leader: bool,
    pub role: String,
    /// False for rows in the recently-disconnected section.
    pub connected: bool,
}

/// One team header row of `ListSquads`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTeam {
    pub team_id: String,
    pub team_name: String,
}

/// One squad row of `ListSquads`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSquad {
    pub squad_id: String,
    pub team_id: String,
    pub squad_name: String,
    pub size: u32,
    pub locked: bool,
    pub creator_eos: Option<String>,
}

static PLAYER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    rx(r"^ID: (?P<id>\d+) \| Online IDs: EOS: (?P<eos>[0-9a-f]{32})(?: steam: (?P<steam>\d{17}))? \| Name: (?P<name>.+?) \| Team ID: (?P<team>\d+|N/A) \| Squad ID: (?P<squad>\d+|N/A) \| Is Leader: (?P<leader>True|False) \| Role: (?P<role>.+?)\s*$")
});

static DISCONNECTED_PLAYER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    rx(r"^ID: (?P<id>\d+) \| Online IDs: EOS: (?P<eos>[0-9a-f]{32})(?: steam: (?P<steam>\d{17}))? \| Since Disconnect: (?P<since>[^|]+) \| Name: (?P<name>.+?)\s*$")
});

static DISCONNECT_HEADER: LazyLock<Regex> =
    LazyLock::new(|| rx(r"^----- Recently Disconnected Players"));

/// Parse a `ListPlayers` response body.
pub fn parse_list_players(body: &str) -> Vec<ParsedPlayer> {
    let mut players = Vec::new();
    let mut in_disconnected = false;
    for line in body.lines() {
        if DISCONNECT_HEADER.is_match(line) {
            in_disconnected = true;
            continue;
        }
        if in_disconnected {
            if let Some(caps) = DISCONNECTED_PLAYER_LINE.captures(line) {
                players.push(ParsedPlayer {
                    eos_id: caps["eos"].to_string(),
                    steam_id: caps.name("steam").map(|m| m.as_str().to_string()),
                    name: caps["name"].to_string(),
                    team_id: String::new(),
                    squad_id: String::new(),
                    is_leader: false,
                    role: String::new(),
                    connected: false,
                });
            }
            continue;
        }
        if let Some(caps) = PLAYER_LINE.captures(line) {
            players.push(ParsedPlayer {
                eos_id: caps["eos"].to_string(),
                steam_id: caps.name("steam").map(|m| m.as_str().to_string()),
                name: caps["name"].to_string(),
                team_id: normalize_na(&caps["team"]),
                squad_id: normalize_na(&caps["squad"]),
                is_leader: &caps["leader"] == "True",
                role: caps["role"].to_string(),
                connected: true,
            });
        }
    }
    players
}

fn normalize_na(value: &str) -> String {
    if value == "N/A" {
        String::new()
    } else {
        value.to_string()
    }
}

static TEAM_LINE: LazyLock<Regex> =
    LazyLock::new(|| rx(r"^Team ID: (?P<id>\d+) \((?P<name>.+)\)\s*$"));

static SQUAD_LINE: LazyLock<Regex> = LazyLock::new(|| {
    rx(r"^ID: (?P<id>\d+) \| Name: (?P<name>.+?) \| Size: (?P<size>\d+) \| Locked: (?P<locked>True|False) \| Creator Name: (?P<creator>.+?) \| Creator Online IDs: EOS: (?P<eos>[0-9a-f]{32})(?: steam: (?P<steam>\d{17}))?\s*$")
});

/// Parse a `ListSquads` response body. Squad rows bind to the most
/// recent team header.
pub fn parse_list_squads(body: &str) -> (Vec<ParsedTeam>, Vec<ParsedSquad>) {
    let mut teams = Vec::new();
    let mut squads = Vec::new();
    let mut current_team = String::new();
    for line in body.lines() {
        if let Some(caps) = TEAM_LINE.captures(line) {
            current_team = caps["id"].to_string();
            teams.push(ParsedTeam {
                team_id: current_team.clone(),
                team_name: caps["name"].to_string(),
            });
            continue;
        }
        if let Some(caps) = SQUAD_LINE.captures(line) {
            if current_team.is_empty() {
                continue;
            }
            squads.push(ParsedSquad {
                squad_id: caps["id"].to_string(),
                team_id: current_team.clone(),
                squad_name: caps["name"].to_string(),
                size: caps["size"].parse().unwrap_or(0),
                locked: &caps["locked"] == "True",
                creator_eos: Some(caps["eos"].to_string()),
            });
        }
    }
    (teams, squads)
}

/// Parse a `ShowServerInfo` response (JSON document).
pub fn parse_server_info(body: &str) -> Option<EventPayload> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let as_u32 = |v: &serde_json::Value| -> Option<u32> {
        v.as_u64()
            .map(|n| n as u32)
            .or_else(|| v.as_str()?.parse().ok())
    };
    Some(EventPayload::RconServerInfo {
        server_name: value.get("ServerName_s")?.as_str()?.to_string(),
        player_count: value.get("PlayerCount_I").and_then(as_u32).unwrap_or(0),
        max_players: value.get("MaxPlayers").and_then(as_u32).unwrap_or(0),
        current_layer: value
            .get("MapName_s")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        next_layer: value
            .get("NextLayer_s")
            .and_then(|v| v.as_str())
            .map(str::to_string),
    })
}

// Push packet patterns, tried in declared order; first match wins.

static CHAT_MESSAGE: LazyLock<Regex> = LazyLock::new(|| {
    rx(r"^\[(?P<chat>ChatAll|ChatTeam|ChatSquad|ChatAdmin)\] \[Online IDs:EOS: (?P<eos>[0-9a-f]{32})(?: steam: (?P<steam>\d{17}))?\] (?P<name>.+?) : (?P<message>.*)$")
});

static PLAYER_WARNED: LazyLock<Regex> = LazyLock::new(|| {
    rx(r#"^Remote admin has warned player (?P<name>.+)\. Message was "(?P<message>.*)"$"#)
});

static PLAYER_KICKED: LazyLock<Regex> = LazyLock::new(|| {
    rx(r"^Kicked player (?P<id>\d+)\. \[Online IDs= EOS: (?P<eos>[0-9a-f]{32})(?: steam: (?P<steam>\d{17}))?\] (?P<name>.+)$")
});

static PLAYER_BANNED: LazyLock<Regex> = LazyLock::new(|| {
    rx(r"^Banned player (?P<id>\d+)\. \[steamid=(?P<steam>\d{17})\] (?P<name>.+) for interval (?P<interval>.+)$")
});

static SQUAD_CREATED: LazyLock<Regex> = LazyLock::new(|| {
    rx(r"^(?P<name>.+?) \(Online IDs: EOS: (?P<eos>[0-9a-f]{32})(?: steam: (?P<steam>\d{17}))?\) has created Squad (?P<squad>\d+) \(Squad Name: (?P<squadname>.+?)\) on (?P<team>.+)$")
});

/// Parse one push packet body into a typed payload.
pub fn parse_push_packet(body: &str) -> Option<EventPayload> {
    if let Some(caps) = CHAT_MESSAGE.captures(body) {
        return Some(EventPayload::RconChatMessage {
            chat_type: caps["chat"].to_string(),
            eos_id: caps["eos"].to_string(),
            steam_id: caps.name("steam").map(|m| m.as_str().to_string()),
            player_name: caps["name"].to_string(),
            message: caps["message"].to_string(),
        });
    }
    if let Some(caps) = PLAYER_WARNED.captures(body) {
        return Some(EventPayload::RconPlayerWarned {
            player_name: caps["name"].to_string(),
            message: caps["message"].to_string(),
        });
    }
    if let Some(caps) = PLAYER_KICKED.captures(body) {
        return Some(EventPayload::RconPlayerKicked {
            player_id: caps["id"].to_string(),
            eos_id: Some(caps["eos"].to_string()),
            steam_id: caps.name("steam").map(|m| m.as_str().to_string()),
            player_name: caps["name"].to_string(),
        });
    }
    if let Some(caps) = PLAYER_BANNED.captures(body) {
        return Some(EventPayload::RconPlayerBanned {
            player_id: caps["id"].to_string(),
            steam_id: Some(caps["steam"].to_string()),
            player_name: caps["name"].to_string(),
            interval: caps["interval"].to_string(),
        });
    }
    if let Some(caps) = SQUAD_CREATED.captures(body) {
        return Some(EventPayload::RconSquadCreated {
            player_name: caps["name"].to_string(),
            eos_id: caps["eos"].to_string(),
            steam_id: caps.name("steam").map(|m| m.as_str().to_string()),
            squad_id: caps["squad"].to_string(),
            squad_name: caps["squadname"].to_string(),
            team_name: caps["team"].to_string(),
        });
    }
    None
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
