// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Squad log line parser.
//!
//! A fixed pattern table tried in declared order; the first match
//! wins and the table order is pinned by tests. Unmatched lines
//! become `UNPARSED` events (still published, for debugging). Round
//! and game transitions additionally emit `LOG_GAME_EVENT_UNIFIED`
//! with the same payload under a discriminated `event_type`; the
//! duplicate emission is part of the contract.

use aegis_core::event::{Event, EventPayload, EventSource};
use aegis_core::ServerId;
use chrono::{DateTime, NaiveDateTime, Utc};
use regex::{Captures, Regex};
use std::sync::LazyLock;

// Allow expect here as the regexes are compile-time verified to be valid
#[allow(clippy::expect_used)]
fn rx(pattern: &str) -> Regex {
    Regex::new(pattern).expect("constant regex pattern is valid")
}

/// `[2026.01.15-12.00.00:123][ 45]` prefix on every line.
static PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    rx(r"^\[(?P<ts>\d{4}\.\d{2}\.\d{2}-\d{2}\.\d{2}\.\d{2}:\d{3})\]\[ *(?P<chain>\d+)\]")
});

struct Pattern {
    name: &'static str,
    regex: Regex,
    build: fn(&Captures, &str) -> EventPayload,
}

/// The table, in match order. Do not reorder without updating the
/// order-pinning test.
static PATTERNS: LazyLock<Vec<Pattern>> = LazyLock::new(|| {
    vec![
        Pattern {
            name: "player_connected",
            regex: rx(r"LogSquad: PostLogin: NewPlayer: BP_PlayerController_C .+PersistentLevel\.(?P<controller>[^\s]+) \(IP: (?P<ip>[\d.]+) \| Online IDs: EOS: (?P<eos>[0-9a-f]{32})(?: steam: (?P<steam>\d{17}))?\)"),
            build: |caps, chain| EventPayload::LogPlayerConnected {
                chain_id: chain.to_string(),
                player_controller: caps["controller"].to_string(),
                ip: caps["ip"].to_string(),
                eos_id: caps["eos"].to_string(),
                steam_id: caps.name("steam").map(|m| m.as_str().to_string()),
            },
        },
        Pattern {
            name: "join_succeeded",
            regex: rx(r"LogNet: Join succeeded: (?P<suffix>.+)$"),
            build: |caps, chain| EventPayload::LogJoinSucceeded {
                chain_id: chain.to_string(),
                player_suffix: caps["suffix"].trim().to_string(),
                eos_id: None,
                steam_id: None,
            },
        },
        Pattern {
            name: "player_disconnected",
            regex: rx(r"LogNet: UChannel::Close: Sending CloseBunch.*RemoteAddr: (?P<ip>[\d.]+):\d+,.*PC: (?P<controller>[^\s,]+),.*UniqueId: RedpointEOS:(?P<eos>[0-9a-f]{32})"),
            build: |caps, chain| EventPayload::LogPlayerDisconnected {
                chain_id: chain.to_string(),
                ip: caps["ip"].to_string(),
                player_controller: caps["controller"].to_string(),
                eos_id: caps["eos"].to_string(),
            },
        },
        Pattern {
            name: "player_died",
            regex: rx(r"LogSquadTrace: \[DedicatedServer\](?:ASQSoldier::)?Die\(\): Player:(?P<victim>.+?) KillingDamage=(?P<damage>-?[\d.]+) from (?P<controller>[^\s]+) \(Online IDs: EOS: (?P<eos>[0-9a-f]{32})(?: steam: (?P<steam>\d{17}))? \| Contoller ID: [^)]+\) caused by (?P<weapon>[^\s]+)"),
            build: |caps, _| EventPayload::LogPlayerDied {
                victim_name: caps["victim"].to_string(),
                victim_eos: None,
                damage: caps["damage"].parse().unwrap_or(0.0),
                attacker_player_controller: caps["controller"].to_string(),
                weapon: caps["weapon"].to_string(),
                attacker_eos: Some(caps["eos"].to_string()),
                attacker_steam: caps.name("steam").map(|m| m.as_str().to_string()),
            },
        },
        Pattern {
            name: "player_wounded",
            regex: rx(r"LogSquadTrace: \[DedicatedServer\](?:ASQSoldier::)?Wound\(\): Player:(?P<victim>.+?) KillingDamage=(?P<damage>-?[\d.]+) from (?P<controller>[^\s]+) \(Online IDs: EOS: (?P<eos>[0-9a-f]{32})(?: steam: (?P<steam>\d{17}))? \| Contoller ID: [^)]+\) caused by (?P<weapon>[^\s]+)"),
            build: |caps, _| EventPayload::LogPlayerWounded {
                victim_name: caps["victim"].to_string(),
                victim_eos: None,
                damage: caps["damage"].parse().unwrap_or(0.0),
                attacker_player_controller: caps["controller"].to_string(),
                weapon: caps["weapon"].to_string(),
                attacker_eos: Some(caps["eos"].to_string()),
                attacker_steam: caps.name("steam").map(|m| m.as_str().to_string()),
            },
        },
        Pattern {
            name: "admin_broadcast",
            regex: rx(r"LogSquad: ADMIN COMMAND: Message broadcasted <(?P<message>.*)> from (?P<from>.+)$"),
            build: |caps, _| EventPayload::LogAdminBroadcast {
                message: caps["message"].to_string(),
                from: caps["from"].trim().to_string(),
            },
        },
        Pattern {
            name: "new_game",
            regex: rx(r"LogWorld: Bringing World /(?P<dlc>[A-Za-z0-9_-]+)/(?:Maps/)?(?P<map>[A-Za-z0-9_-]+)/(?:.+/)?(?P<layer>[A-Za-z0-9_-]+)\.[A-Za-z0-9_-]+ up for play"),
            build: |caps, _| EventPayload::LogNewGame {
                dlc: Some(caps["dlc"].to_string()),
                map_classname: Some(caps["map"].to_string()),
                layer_classname: caps["layer"].to_string(),
            },
        },
        Pattern {
            name: "round_winner",
            regex: rx(r"LogSquadGameEvents: Display: Team (?P<team>\d), (?P<subfaction>.+?) \( (?P<faction>.+?) \) has won the match with (?P<tickets>\d+) Tickets on layer (?P<layer>[^\s]+) \(level .+\)!"),
            build: |caps, _| EventPayload::LogRoundEnded {
                winner: Some(caps["faction"].to_string()),
                layer: Some(caps["layer"].to_string()),
            },
        },
        Pattern {
            name: "round_ended",
            regex: rx(r"LogGameState: Match State Changed from InProgress to WaitingPostMatch"),
            build: |_, _| EventPayload::LogRoundEnded {
                winner: None,
                layer: None,
            },
        },
    ]
});

/// Stateful per-source parser: assigns the monotonic sequence and
/// normalizes timestamps to UTC.
pub struct LogParser {
    server: ServerId,
    seq: u64,
}

impl LogParser {
    pub fn new(server: ServerId) -> Self {
        Self { server, seq: 0 }
    }

    /// Parse one line into one or two events (unified duplication).
    pub fn parse_line(&mut self, line: &str, fallback_now: DateTime<Utc>) -> Vec<Event> {
        if line.trim().is_empty() {
            return Vec::new();
        }

        let (timestamp, chain, rest) = match PREFIX.captures(line) {
            Some(caps) => {
                let ts = parse_timestamp(&caps["ts"]).unwrap_or(fallback_now);
                let chain = caps["chain"].to_string();
                let rest_start = caps.get(0).map(|m| m.end()).unwrap_or(0);
                (ts, chain, &line[rest_start..])
            }
            None => (fallback_now, String::new(), line),
        };

        let payload = PATTERNS
            .iter()
            .find_map(|p| p.regex.captures(rest).map(|caps| (p, caps)))
            .map(|(p, caps)| (p.build)(&caps, &chain));

        let mut events = Vec::new();
        match payload {
            Some(payload) => {
                if let Some(unified) = unified_duplicate(&payload) {
                    events.push(self.event(timestamp, payload));
                    events.push(self.event(timestamp, unified));
                } else {
                    events.push(self.event(timestamp, payload));
                }
            }
            None => {
                events.push(self.event(
                    timestamp,
                    EventPayload::Unparsed {
                        line: line.to_string(),
                    },
                ));
            }
        }
        events
    }

    fn event(&mut self, timestamp: DateTime<Utc>, payload: EventPayload) -> Event {
        self.seq += 1;
        Event::new(
            self.server.clone(),
            EventSource::Log,
            self.seq,
            timestamp,
            payload,
        )
    }
}

/// Pattern names in declared order (pinned by tests).
pub fn pattern_names() -> Vec<&'static str> {
    PATTERNS.iter().map(|p| p.name).collect()
}

/// The documented subset of game transitions that also emit the
/// unified shape.
fn unified_duplicate(payload: &EventPayload) -> Option<EventPayload> {
    let (event_type, data) = match payload {
        EventPayload::LogNewGame { .. } => ("NEW_GAME", serde_json::to_value(payload)),
        EventPayload::LogRoundEnded { .. } => ("ROUND_ENDED", serde_json::to_value(payload)),
        _ => return None,
    };
    let mut data = data.ok()?;
    if let Some(map) = data.as_object_mut() {
        map.remove("type");
    }
    Some(EventPayload::LogGameEventUnified {
        event_type: event_type.to_string(),
        data,
    })
}

/// Squad timestamps (`2026.01.15-12.00.00:123`) are UTC already.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, "%Y.%m.%d-%H.%M.%S:%3f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
