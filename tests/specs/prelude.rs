// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared spec harness: fake Squad RCON server + full supervisor stack.

use aegis_cache::{Cache, MemoryBackend};
use aegis_core::{ConnectorRegistry, EventBus, FakeClock, RconConfig, ServerId, ServerRecord};
use aegis_daemon::{Supervisor, SupervisorConfig};
use aegis_rcon::packet::{RconPacket, AUTH, AUTH_RESPONSE, RESPONSE_VALUE};
use aegis_storage::{MemoryRepository, Repository};
use bytes::BytesMut;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

pub const SERVER: &str = "srv-spec";
pub const PASSWORD: &str = "spec-password";

pub const EOS_ATTACKER: &str = "0002a10186d9414496bf20d22d3860ba";
pub const EOS_VICTIM: &str = "0002b20297e8525507c031e33e4971cb";
pub const EOS_ENEMY: &str = "0002c30308f9636618d142f44f5a82dc";

/// In-process Squad RCON server with canned list responses.
pub struct FakeSquad {
    pub addr: String,
    pub commands: Arc<Mutex<Vec<String>>>,
    drop_after: Arc<Mutex<Option<usize>>>,
}

impl FakeSquad {
    pub async fn start() -> Arc<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let fake = Arc::new(Self {
            addr,
            commands: Arc::new(Mutex::new(Vec::new())),
            drop_after: Arc::new(Mutex::new(None)),
        });
        let accept = Arc::clone(&fake);
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let conn = Arc::clone(&accept);
                tokio::spawn(async move { conn.serve(stream).await });
            }
        });
        fake
    }

    /// Close the current connection after serving `n` more commands.
    pub fn drop_after(&self, n: usize) {
        *self.drop_after.lock() = Some(n);
    }

    pub fn recorded(&self) -> Vec<String> {
        self.commands.lock().clone()
    }

    async fn serve(&self, mut stream: tokio::net::TcpStream) {
        let mut buf = BytesMut::new();
        let mut served = 0usize;
        loop {
            while let Ok(Some(packet)) = RconPacket::decode(&mut buf) {
                let mut out = BytesMut::new();
                match packet.packet_type {
                    AUTH => {
                        let id = if packet.body == PASSWORD { packet.id } else { -1 };
                        RconPacket::new(id, AUTH_RESPONSE, "").encode(&mut out).unwrap();
                    }
                    _ if !packet.body.is_empty() => {
                        self.commands.lock().push(packet.body.clone());
                        served += 1;
                        let drop_now = {
                            let mut slot = self.drop_after.lock();
                            match *slot {
                                Some(n) if served >= n => {
                                    *slot = None;
                                    true
                                }
                                _ => false,
                            }
                        };
                        if drop_now {
                            return;
                        }
                        let body = respond(&packet.body);
                        RconPacket::new(packet.id, RESPONSE_VALUE, body).encode(&mut out).unwrap();
                    }
                    // Keepalive / sentinel: echo empty.
                    _ => {
                        RconPacket::new(packet.id, RESPONSE_VALUE, "").encode(&mut out).unwrap();
                    }
                }
                if stream.write_all(&out).await.is_err() {
                    return;
                }
            }
            match stream.read_buf(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(_) => {}
            }
        }
    }
}

fn respond(command: &str) -> String {
    match command {
        "ListPlayers" => format!(
            "----- Active Players -----\n\
             ID: 0 | Online IDs: EOS: {EOS_ATTACKER} steam: 76561198012345678 | Name: Raider | Team ID: 1 | Squad ID: 1 | Is Leader: True | Role: USA_SL_01\n\
             ID: 1 | Online IDs: EOS: {EOS_VICTIM} | Name: Bravo | Team ID: 1 | Squad ID: 1 | Is Leader: False | Role: USA_Rifleman_01\n\
             ID: 2 | Online IDs: EOS: {EOS_ENEMY} | Name: Ivan | Team ID: 2 | Squad ID: N/A | Is Leader: False | Role: RGF_Rifleman_01\n"
        ),
        "ListSquads" => "----- Active Squads -----\n\
             Team ID: 1 (United States Army)\n\
             ID: 1 | Name: INF | Size: 2 | Locked: False | Creator Name: Raider | Creator Online IDs: EOS: 0002a10186d9414496bf20d22d3860ba steam: 76561198012345678\n\
             Team ID: 2 (Russian Ground Forces)\n"
            .to_string(),
        "ShowServerInfo" => {
            r#"{"ServerName_s":"Spec Server","PlayerCount_I":"3","MaxPlayers":100,"MapName_s":"Narva_RAAS_v1"}"#.to_string()
        }
        other => format!("ok:{other}"),
    }
}

/// A supervisor wired to the fake server, with fake-clock cache and
/// in-memory repository.
pub struct SpecHarness {
    pub clock: FakeClock,
    pub cache: Cache,
    pub repository: Arc<MemoryRepository>,
    pub supervisor: Arc<Supervisor>,
    pub connectors: ConnectorRegistry,
    pub fake: Arc<FakeSquad>,
}

impl SpecHarness {
    pub async fn start() -> Self {
        let fake = FakeSquad::start().await;
        let clock = FakeClock::new();
        let cache = Cache::new(Arc::new(MemoryBackend::with_clock(clock.clone())));
        let repository = Arc::new(MemoryRepository::new());
        let connectors = ConnectorRegistry::new();
        let supervisor = Supervisor::new(
            cache.clone(),
            repository.clone(),
            connectors.clone(),
            SupervisorConfig {
                component_grace: Duration::from_millis(500),
                drain_deadline: Duration::from_secs(2),
                ..SupervisorConfig::default()
            },
        );

        let (host, port) = fake.addr.rsplit_once(':').unwrap();
        let record = ServerRecord {
            id: SERVER.into(),
            name: "Spec Server".into(),
            rcon: RconConfig {
                host: host.to_string(),
                port: port.parse().unwrap(),
                password: PASSWORD.to_string(),
            },
            log_source: None,
        };
        repository.upsert_server(record.clone()).await.unwrap();
        supervisor.add_server(record).await.unwrap();

        let harness = Self {
            clock,
            cache,
            repository,
            supervisor,
            connectors,
            fake,
        };
        harness.wait_for_tracker().await;
        harness
    }

    pub fn server(&self) -> ServerId {
        SERVER.into()
    }

    pub fn bus(&self) -> EventBus {
        self.supervisor.bus()
    }

    /// Wait for the tracker's first reconciliation so enrichment has
    /// players to resolve.
    async fn wait_for_tracker(&self) {
        let tracker = self.supervisor.tracker(&self.server()).unwrap();
        for _ in 0..200 {
            if tracker.last_refresh().is_some() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("tracker never reconciled against the fake server");
    }

    /// Save a workflow and load it into the scheduler.
    pub async fn install_workflow(&self, raw: serde_json::Value) {
        let definition: aegis_workflow::WorkflowDefinition =
            serde_json::from_value(raw).unwrap();
        self.repository.save_workflow(definition).await.unwrap();
        self.supervisor
            .reload_workflows(&self.server())
            .await
            .unwrap();
    }

    /// Poll until the fake server has seen a command matching the
    /// predicate.
    pub async fn wait_for_command<F: Fn(&str) -> bool>(&self, predicate: F) -> String {
        for _ in 0..200 {
            if let Some(cmd) = self
                .fake
                .recorded()
                .iter()
                .find(|c| predicate(c))
                .cloned()
            {
                return cmd;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!(
            "expected command never arrived; saw {:?}",
            self.fake.recorded()
        );
    }
}

/// A wounded event where Raider (team 1) hit Bravo (team 1).
pub fn teamkill_wounded_event() -> aegis_core::Event {
    aegis_core::test_support::log_event(
        SERVER,
        aegis_core::EventPayload::LogPlayerWounded {
            victim_name: "Bravo".into(),
            victim_eos: Some(EOS_VICTIM.into()),
            damage: 42.0,
            attacker_player_controller: "BP_PlayerController_C_1".into(),
            weapon: "BP_M4_Rifle_C_1".into(),
            attacker_eos: Some(EOS_ATTACKER.into()),
            attacker_steam: None,
        },
    )
}

pub fn new_game_event() -> aegis_core::Event {
    aegis_core::test_support::log_event(
        SERVER,
        aegis_core::EventPayload::LogNewGame {
            dlc: None,
            map_classname: None,
            layer_classname: "Narva_RAAS_v1".into(),
        },
    )
}

pub fn round_ended_event() -> aegis_core::Event {
    aegis_core::test_support::log_event(
        SERVER,
        aegis_core::EventPayload::LogRoundEnded {
            winner: Some("Team1".into()),
            layer: Some("Narva_RAAS_v1".into()),
        },
    )
}
