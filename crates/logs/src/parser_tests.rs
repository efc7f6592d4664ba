// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use aegis_core::EventKind;
use chrono::TimeZone;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).single().unwrap()
}

fn parse_one(line: &str) -> Event {
    let mut parser = LogParser::new("srv-1".into());
    let mut events = parser.parse_line(line, now());
    assert_eq!(events.len(), 1, "expected exactly one event");
    events.remove(0)
}

#[test]
fn pattern_table_order_is_pinned() {
    assert_eq!(
        pattern_names(),
        [
            "player_connected",
            "join_succeeded",
            "player_disconnected",
            "player_died",
            "player_wounded",
            "admin_broadcast",
            "new_game",
            "round_winner",
            "round_ended",
        ]
    );
}

#[test]
fn player_connected_line_parses() {
    let line = "[2026.01.15-11.59.30:123][ 45]LogSquad: PostLogin: NewPlayer: BP_PlayerController_C /Game/Maps/Narva/Narva_RAAS_v1.Narva_RAAS_v1:PersistentLevel.BP_PlayerController_C_2147254223 (IP: 203.0.113.7 | Online IDs: EOS: 0002a10186d9414496bf20d22d3860ba steam: 76561198012345678)";
    let event = parse_one(line);
    assert_eq!(event.kind(), EventKind::LogPlayerConnected);
    let EventPayload::LogPlayerConnected {
        chain_id,
        player_controller,
        ip,
        eos_id,
        steam_id,
    } = &event.payload
    else {
        panic!("wrong payload");
    };
    assert_eq!(chain_id, "45");
    assert_eq!(player_controller, "BP_PlayerController_C_2147254223");
    assert_eq!(ip, "203.0.113.7");
    assert_eq!(eos_id, "0002a10186d9414496bf20d22d3860ba");
    assert_eq!(steam_id.as_deref(), Some("76561198012345678"));
    // Timestamp comes from the line prefix, normalized to UTC.
    assert_eq!(
        event.timestamp,
        Utc.with_ymd_and_hms(2026, 1, 15, 11, 59, 30).single().unwrap()
            + chrono::Duration::milliseconds(123)
    );
}

#[test]
fn join_succeeded_line_parses() {
    let line = "[2026.01.15-11.59.31:000][ 46]LogNet: Join succeeded: Raider Bravo";
    let event = parse_one(line);
    let EventPayload::LogJoinSucceeded {
        chain_id,
        player_suffix,
        ..
    } = &event.payload
    else {
        panic!("wrong payload");
    };
    assert_eq!(chain_id, "46");
    assert_eq!(player_suffix, "Raider Bravo");
}

#[test]
fn disconnect_line_parses() {
    let line = "[2026.01.15-12.10.00:500][900]LogNet: UChannel::Close: Sending CloseBunch. ChIndex == 0. Name: [UChannel] ChIndex: 0, Closing: 0 [UNetConnection] RemoteAddr: 203.0.113.7:50000, Name: EOSIpNetConnection_2147329817, Driver: GameNetDriver EOSNetDriver_2147329920, IsServer: YES, PC: BP_PlayerController_C_2147254223, Owner: BP_PlayerController_C_2147254223, UniqueId: RedpointEOS:0002a10186d9414496bf20d22d3860ba";
    let event = parse_one(line);
    let EventPayload::LogPlayerDisconnected {
        ip,
        player_controller,
        eos_id,
        ..
    } = &event.payload
    else {
        panic!("wrong payload");
    };
    assert_eq!(ip, "203.0.113.7");
    assert_eq!(player_controller, "BP_PlayerController_C_2147254223");
    assert_eq!(eos_id, "0002a10186d9414496bf20d22d3860ba");
}

#[test]
fn wound_line_parses_attacker_weapon_and_damage() {
    let line = "[2026.01.15-12.05.00:250][700]LogSquadTrace: [DedicatedServer]ASQSoldier::Wound(): Player:Victim Name KillingDamage=42.500000 from BP_PlayerController_C_2147254223 (Online IDs: EOS: 0002a10186d9414496bf20d22d3860ba steam: 76561198012345678 | Contoller ID: BP_PlayerController_C_2147254223) caused by BP_M4_Rifle_C_2147254300";
    let event = parse_one(line);
    assert_eq!(event.kind(), EventKind::LogPlayerWounded);
    let EventPayload::LogPlayerWounded {
        victim_name,
        damage,
        weapon,
        attacker_eos,
        ..
    } = &event.payload
    else {
        panic!("wrong payload");
    };
    assert_eq!(victim_name, "Victim Name");
    assert_eq!(*damage, 42.5);
    assert_eq!(weapon, "BP_M4_Rifle_C_2147254300");
    assert_eq!(attacker_eos.as_deref(), Some("0002a10186d9414496bf20d22d3860ba"));
}

#[test]
fn die_line_parses_as_died_not_wounded() {
    let line = "[2026.01.15-12.05.01:000][701]LogSquadTrace: [DedicatedServer]ASQSoldier::Die(): Player:Victim KillingDamage=160.000000 from BP_PlayerController_C_2147254223 (Online IDs: EOS: 0002a10186d9414496bf20d22d3860ba | Contoller ID: BP_PlayerController_C_2147254223) caused by BP_AK74_Rifle_C_2147254301";
    let event = parse_one(line);
    assert_eq!(event.kind(), EventKind::LogPlayerDied);
}

#[test]
fn admin_broadcast_line_parses() {
    let line = "[2026.01.15-12.06.00:000][800]LogSquad: ADMIN COMMAND: Message broadcasted <Server restart in 5 minutes> from RconAdmin";
    let event = parse_one(line);
    let EventPayload::LogAdminBroadcast { message, from } = &event.payload else {
        panic!("wrong payload");
    };
    assert_eq!(message, "Server restart in 5 minutes");
    assert_eq!(from, "RconAdmin");
}

#[test]
fn new_game_emits_legacy_and_unified() {
    let line = "[2026.01.15-12.00.00:000][  1]LogWorld: Bringing World /Game/Maps/Narva/Narva_RAAS_v1.Narva_RAAS_v1 up for play (max tick rate 50) at 2026.01.15-12.00.00";
    let mut parser = LogParser::new("srv-1".into());
    let events = parser.parse_line(line, now());
    assert_eq!(events.len(), 2);

    assert_eq!(events[0].kind(), EventKind::LogNewGame);
    let EventPayload::LogNewGame {
        layer_classname, ..
    } = &events[0].payload
    else {
        panic!("wrong payload");
    };
    assert_eq!(layer_classname, "Narva_RAAS_v1");

    assert_eq!(events[1].kind(), EventKind::LogGameEventUnified);
    let EventPayload::LogGameEventUnified { event_type, data } = &events[1].payload else {
        panic!("wrong payload");
    };
    assert_eq!(event_type, "NEW_GAME");
    assert_eq!(data["layer_classname"], "Narva_RAAS_v1");
    assert!(data.get("type").is_none());

    // Both carry distinct, increasing sequence numbers.
    assert_eq!(events[0].seq + 1, events[1].seq);
}

#[test]
fn round_winner_emits_legacy_and_unified() {
    let line = "[2026.01.15-13.30.00:000][950]LogSquadGameEvents: Display: Team 1, 1st Cavalry Regiment ( United States Army ) has won the match with 150 Tickets on layer Narva_RAAS_v1 (level Narva)!";
    let mut parser = LogParser::new("srv-1".into());
    let events = parser.parse_line(line, now());
    assert_eq!(events.len(), 2);
    let EventPayload::LogRoundEnded { winner, layer } = &events[0].payload else {
        panic!("wrong payload");
    };
    assert_eq!(winner.as_deref(), Some("United States Army"));
    assert_eq!(layer.as_deref(), Some("Narva_RAAS_v1"));
    assert_eq!(events[1].kind(), EventKind::LogGameEventUnified);
}

#[test]
fn match_state_change_is_round_ended_without_winner() {
    let line = "[2026.01.15-13.30.01:000][951]LogGameState: Match State Changed from InProgress to WaitingPostMatch";
    let mut parser = LogParser::new("srv-1".into());
    let events = parser.parse_line(line, now());
    assert_eq!(events[0].kind(), EventKind::LogRoundEnded);
    let EventPayload::LogRoundEnded { winner, .. } = &events[0].payload else {
        panic!("wrong payload");
    };
    assert!(winner.is_none());
}

#[test]
fn unmatched_lines_become_unparsed_events() {
    let line = "[2026.01.15-12.00.00:000][  2]LogEOS: Verbose: something internal";
    let event = parse_one(line);
    assert_eq!(event.kind(), EventKind::Unparsed);
    let EventPayload::Unparsed { line: original } = &event.payload else {
        panic!("wrong payload");
    };
    assert!(original.contains("LogEOS"));
}

#[test]
fn sequence_is_monotonic_across_lines() {
    let mut parser = LogParser::new("srv-1".into());
    let a = parser.parse_line("[2026.01.15-12.00.00:000][ 1]LogNet: Join succeeded: A", now());
    let b = parser.parse_line("[2026.01.15-12.00.01:000][ 2]LogNet: Join succeeded: B", now());
    assert!(b[0].seq > a[0].seq);
}

#[test]
fn line_without_prefix_uses_fallback_timestamp() {
    let event = parse_one("LogNet: Join succeeded: NoPrefix");
    assert_eq!(event.timestamp, now());
    let EventPayload::LogJoinSucceeded { player_suffix, .. } = &event.payload else {
        panic!("wrong payload");
    };
    assert_eq!(player_suffix, "NoPrefix");
}

#[test]
fn blank_lines_produce_no_events() {
    let mut parser = LogParser::new("srv-1".into());
    assert!(parser.parse_line("   ", now()).is_empty());
}
