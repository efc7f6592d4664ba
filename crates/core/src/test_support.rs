// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Builders shared by this crate's tests and (via the `test-support`
//! feature) by other crates' tests.

use crate::event::{Event, EventPayload, EventSource};
use crate::player::Player;
use chrono::{TimeZone, Utc};

/// A log-sourced event with fixed timestamp and zero sequence.
pub fn log_event(server: &str, payload: EventPayload) -> Event {
    Event::new(
        server.into(),
        EventSource::Log,
        0,
        Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).single().unwrap_or_default(),
        payload,
    )
}

/// An RCON-sourced event with fixed timestamp and zero sequence.
pub fn rcon_event(server: &str, payload: EventPayload) -> Event {
    Event {
        source: EventSource::Rcon,
        ..log_event(server, payload)
    }
}

/// A connected player on the given team, identified by EOS id.
pub fn player(eos: &str, team: &str) -> Player {
    Player {
        eos_id: eos.to_string(),
        steam_id: None,
        name: format!("player-{eos}"),
        player_controller: None,
        player_suffix: None,
        team_id: team.to_string(),
        squad_id: String::new(),
        role: String::new(),
        connected: true,
        last_updated: Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).single().unwrap_or_default(),
    }
}
