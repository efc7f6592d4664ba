// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Player tracker implementation.
//!
//! Locking policy: the short `RwLock` guards only the in-memory
//! bookkeeping (`last_refresh`, the chain-id correlation map). Every
//! KV read and write happens outside the lock, and no lock is ever
//! held across an await.

use aegis_cache::{keys, Cache, CacheError};
use aegis_core::event::{Enricher, Event, EventPayload, EventSource};
use aegis_core::{EventBus, Player, ServerId, Squad, Team};
use aegis_rcon::{CommandOptions, CommandRunner, RconError};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Tracker errors
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("rcon error: {0}")]
    Rcon(#[from] RconError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
}

/// Tracker tuning.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub refresh_interval: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(30),
        }
    }
}

#[derive(Default)]
struct Bookkeeping {
    last_refresh: Option<DateTime<Utc>>,
    /// Log chain id → EOS id, for join-succeeded correlation.
    chains: HashMap<String, String>,
}

/// Derived player/team/squad view for one server.
pub struct PlayerTracker {
    server: ServerId,
    cache: Cache,
    runner: Arc<dyn CommandRunner>,
    bus: EventBus,
    config: TrackerConfig,
    inner: RwLock<Bookkeeping>,
}

impl PlayerTracker {
    pub fn new(
        server: ServerId,
        cache: Cache,
        runner: Arc<dyn CommandRunner>,
        bus: EventBus,
        config: TrackerConfig,
    ) -> Self {
        Self {
            server,
            cache,
            runner,
            bus,
            config,
            inner: RwLock::new(Bookkeeping::default()),
        }
    }

    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.inner.read().last_refresh
    }

    /// Periodic reconciliation loop. Runs until cancelled.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.refresh_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = interval.tick() => {
                    if let Err(e) = self.reconcile().await {
                        tracing::warn!(server = %self.server, error = %e, "player reconciliation failed");
                    }
                }
            }
        }
    }

    /// One reconciliation pass: enumerate teams → squads → players via
    /// RCON, rewrite team/squad keys (delete-then-set, idempotent),
    /// upsert players preserving log-sourced fields, mark absentees
    /// disconnected, publish `PLAYER_LIST_UPDATED`.
    pub async fn reconcile(&self) -> Result<(), TrackerError> {
        let squads_body = self
            .runner
            .run("ListSquads", CommandOptions::default())
            .await?;
        let players_body = self
            .runner
            .run("ListPlayers", CommandOptions::default())
            .await?;

        let (teams, squads) = aegis_rcon::parser::parse_list_squads(&squads_body);
        let parsed_players = aegis_rcon::parser::parse_list_players(&players_body);
        let now = Utc::now();

        // Teams: delete-then-set.
        for key in self.cache.keys(&keys::team_pattern(&self.server)).await? {
            self.cache.del(&key).await?;
        }
        for team in &teams {
            let record = Team {
                team_id: team.team_id.clone(),
                team_name: team.team_name.clone(),
                faction: None,
                tickets: None,
            };
            self.cache
                .set_json(&keys::team(&self.server, &team.team_id), &record, None)
                .await?;
        }

        // Squads: delete-then-set.
        for key in self.cache.keys(&keys::squad_pattern(&self.server)).await? {
            self.cache.del(&key).await?;
        }
        for squad in &squads {
            let record = Squad {
                squad_id: squad.squad_id.clone(),
                team_id: squad.team_id.clone(),
                squad_name: squad.squad_name.clone(),
                size: squad.size,
                max_size: 9,
                locked: squad.locked,
                leader_eos_id: squad.creator_eos.clone(),
            };
            self.cache
                .set_json(
                    &keys::squad(&self.server, &squad.team_id, &squad.squad_id),
                    &record,
                    None,
                )
                .await?;
        }

        // Players: upsert, preserving fields RCON does not know about.
        let mut seen = std::collections::HashSet::new();
        let mut connected_count = 0u32;
        for parsed in &parsed_players {
            seen.insert(parsed.eos_id.clone());
            if parsed.connected {
                connected_count += 1;
            }
            let key = keys::player(&self.server, &parsed.eos_id);
            let existing: Option<Player> = self.cache.get_json(&key).await?;
            let merged = Player {
                eos_id: parsed.eos_id.clone(),
                steam_id: parsed
                    .steam_id
                    .clone()
                    .or_else(|| existing.as_ref().and_then(|p| p.steam_id.clone())),
                name: parsed.name.clone(),
                player_controller: existing.as_ref().and_then(|p| p.player_controller.clone()),
                player_suffix: existing.as_ref().and_then(|p| p.player_suffix.clone()),
                team_id: parsed.team_id.clone(),
                squad_id: parsed.squad_id.clone(),
                role: parsed.role.clone(),
                connected: parsed.connected,
                last_updated: now,
            };
            self.write_player(&merged).await?;
        }

        // Present before, absent now: retained but marked disconnected.
        for key in self.cache.keys(&keys::player_pattern(&self.server)).await? {
            let Some(mut player) = self.cache.get_json::<Player>(&key).await? else {
                continue;
            };
            if !seen.contains(&player.eos_id) && player.connected {
                player.connected = false;
                player.last_updated = now;
                self.cache.set_json(&key, &player, None).await?;
            }
        }

        self.inner.write().last_refresh = Some(now);

        self.bus
            .publish(Event::new(
                self.server.clone(),
                EventSource::Derived,
                now.timestamp_millis() as u64,
                now,
                EventPayload::PlayerListUpdated {
                    player_count: connected_count,
                    team_count: teams.len() as u32,
                    squad_count: squads.len() as u32,
                },
            ))
            .await;

        // Server info rides on the same refresh cadence. Parse
        // failures are tolerated: older server builds answer with a
        // different document.
        if let Ok(body) = self
            .runner
            .run("ShowServerInfo", CommandOptions::default())
            .await
        {
            if let Some(payload) = aegis_rcon::parser::parse_server_info(&body) {
                self.bus
                    .publish(Event::new(
                        self.server.clone(),
                        EventSource::Rcon,
                        now.timestamp_millis() as u64,
                        now,
                        payload,
                    ))
                    .await;
            }
        }

        Ok(())
    }

    async fn write_player(&self, player: &Player) -> Result<(), TrackerError> {
        self.cache
            .set_json(&keys::player(&self.server, &player.eos_id), player, None)
            .await?;
        self.cache
            .set(
                &keys::index_name(&self.server, &player.name),
                &player.eos_id,
                None,
            )
            .await?;
        if let Some(controller) = &player.player_controller {
            self.cache
                .set(
                    &keys::index_controller(&self.server, controller),
                    &player.eos_id,
                    None,
                )
                .await?;
        }
        if let Some(steam) = &player.steam_id {
            self.cache
                .set(&keys::index_steam(&self.server, steam), &player.eos_id, None)
                .await?;
        }
        if let Some(suffix) = &player.player_suffix {
            self.cache
                .set(&keys::index_name(&self.server, suffix), &player.eos_id, None)
                .await?;
        }
        Ok(())
    }

    /// Apply one incremental log event.
    pub async fn apply_log_event(&self, event: &Event) -> Result<(), TrackerError> {
        match &event.payload {
            EventPayload::LogPlayerConnected {
                chain_id,
                player_controller,
                ip: _,
                eos_id,
                steam_id,
            } => {
                {
                    let mut inner = self.inner.write();
                    inner.chains.insert(chain_id.clone(), eos_id.clone());
                }
                let existing = self.get_by_eos(eos_id).await?;
                // EOS unknown but the Steam identity was seen before:
                // rebind the prior record to this EOS.
                let prior = match (&existing, steam_id) {
                    (None, Some(steam)) => self.rebind_by_steam(steam, eos_id).await?,
                    _ => None,
                };
                let base = existing.or(prior);
                let player = Player {
                    eos_id: eos_id.clone(),
                    steam_id: steam_id.clone().or_else(|| base.as_ref().and_then(|p| p.steam_id.clone())),
                    name: base.as_ref().map(|p| p.name.clone()).unwrap_or_default(),
                    player_controller: Some(player_controller.clone()),
                    player_suffix: base.as_ref().and_then(|p| p.player_suffix.clone()),
                    team_id: base.as_ref().map(|p| p.team_id.clone()).unwrap_or_default(),
                    squad_id: base.as_ref().map(|p| p.squad_id.clone()).unwrap_or_default(),
                    role: base.as_ref().map(|p| p.role.clone()).unwrap_or_default(),
                    connected: true,
                    last_updated: event.timestamp,
                };
                self.write_player(&player).await?;
            }

            EventPayload::LogJoinSucceeded {
                chain_id,
                player_suffix,
                ..
            } => {
                let eos = { self.inner.read().chains.get(chain_id).cloned() };
                if let Some(eos) = eos {
                    if let Some(mut player) = self.get_by_eos(&eos).await? {
                        player.player_suffix = Some(player_suffix.clone());
                        if player.name.is_empty() {
                            player.name = player_suffix.clone();
                        }
                        player.last_updated = event.timestamp;
                        self.write_player(&player).await?;
                    }
                }
            }

            EventPayload::LogPlayerDisconnected { eos_id, chain_id, .. } => {
                {
                    self.inner.write().chains.remove(chain_id);
                }
                if let Some(mut player) = self.get_by_eos(eos_id).await? {
                    player.connected = false;
                    player.last_updated = event.timestamp;
                    self.write_player(&player).await?;
                }
            }

            _ => {}
        }
        Ok(())
    }

    async fn rebind_by_steam(
        &self,
        steam: &str,
        new_eos: &str,
    ) -> Result<Option<Player>, TrackerError> {
        let Some(old_eos) = self.cache.get(&keys::index_steam(&self.server, steam)).await? else {
            return Ok(None);
        };
        if old_eos == new_eos {
            return Ok(None);
        }
        let old_key = keys::player(&self.server, &old_eos);
        let prior: Option<Player> = self.cache.get_json(&old_key).await?;
        if prior.is_some() {
            self.cache.del(&old_key).await?;
        }
        Ok(prior)
    }

    // -- lookups: each returns an owned snapshot --

    pub async fn get_by_eos(&self, eos_id: &str) -> Result<Option<Player>, TrackerError> {
        Ok(self
            .cache
            .get_json(&keys::player(&self.server, eos_id))
            .await?)
    }

    pub async fn get_by_steam(&self, steam_id: &str) -> Result<Option<Player>, TrackerError> {
        match self.cache.get(&keys::index_steam(&self.server, steam_id)).await? {
            Some(eos) => self.get_by_eos(&eos).await,
            None => Ok(None),
        }
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<Player>, TrackerError> {
        match self.cache.get(&keys::index_name(&self.server, name)).await? {
            Some(eos) => self.get_by_eos(&eos).await,
            None => Ok(None),
        }
    }

    pub async fn get_by_controller(
        &self,
        controller: &str,
    ) -> Result<Option<Player>, TrackerError> {
        match self
            .cache
            .get(&keys::index_controller(&self.server, controller))
            .await?
        {
            Some(eos) => self.get_by_eos(&eos).await,
            None => Ok(None),
        }
    }

    pub async fn players(&self) -> Result<Vec<Player>, TrackerError> {
        let mut players = Vec::new();
        for key in self.cache.keys(&keys::player_pattern(&self.server)).await? {
            if let Some(player) = self.cache.get_json::<Player>(&key).await? {
                players.push(player);
            }
        }
        players.sort_by(|a, b| a.eos_id.cmp(&b.eos_id));
        Ok(players)
    }

    pub async fn players_by_team(&self, team_id: &str) -> Result<Vec<Player>, TrackerError> {
        Ok(self
            .players()
            .await?
            .into_iter()
            .filter(|p| p.team_id == team_id)
            .collect())
    }

    pub async fn players_by_squad(
        &self,
        team_id: &str,
        squad_id: &str,
    ) -> Result<Vec<Player>, TrackerError> {
        Ok(self
            .players()
            .await?
            .into_iter()
            .filter(|p| p.team_id == team_id && p.squad_id == squad_id)
            .collect())
    }

    pub async fn teams(&self) -> Result<Vec<Team>, TrackerError> {
        let mut teams = Vec::new();
        for key in self.cache.keys(&keys::team_pattern(&self.server)).await? {
            if let Some(team) = self.cache.get_json::<Team>(&key).await? {
                teams.push(team);
            }
        }
        teams.sort_by(|a, b| a.team_id.cmp(&b.team_id));
        Ok(teams)
    }

    pub async fn squads(&self) -> Result<Vec<Squad>, TrackerError> {
        let mut squads = Vec::new();
        for key in self.cache.keys(&keys::squad_pattern(&self.server)).await? {
            if let Some(squad) = self.cache.get_json::<Squad>(&key).await? {
                squads.push(squad);
            }
        }
        squads.sort_by(|a, b| (a.team_id.clone(), a.squad_id.clone()).cmp(&(b.team_id.clone(), b.squad_id.clone())));
        Ok(squads)
    }

    /// `(true, attacker, victim)` iff both are known, distinct, and
    /// share a non-empty team id.
    pub async fn check_teamkill(
        &self,
        attacker_eos: &str,
        victim_eos: &str,
    ) -> Result<(bool, Option<Player>, Option<Player>), TrackerError> {
        if attacker_eos == victim_eos {
            return Ok((false, None, None));
        }
        let attacker = self.get_by_eos(attacker_eos).await?;
        let victim = self.get_by_eos(victim_eos).await?;
        match (attacker, victim) {
            (Some(a), Some(v)) if a.same_team(&v) => Ok((true, Some(a), Some(v))),
            _ => Ok((false, None, None)),
        }
    }
}

#[async_trait::async_trait]
impl Enricher for PlayerTracker {
    async fn enrich(&self, event: &mut Event) {
        if event.server != self.server {
            return;
        }
        let result: Result<(), TrackerError> = async {
            match &event.payload {
                EventPayload::LogPlayerWounded {
                    victim_name,
                    victim_eos,
                    attacker_eos,
                    ..
                }
                | EventPayload::LogPlayerDied {
                    victim_name,
                    victim_eos,
                    attacker_eos,
                    ..
                } => {
                    let attacker = match attacker_eos {
                        Some(eos) => self.get_by_eos(eos).await?,
                        None => None,
                    };
                    let victim = match victim_eos {
                        Some(eos) => self.get_by_eos(eos).await?,
                        None => self.get_by_name(victim_name).await?,
                    };
                    let teamkill = match (&attacker, &victim) {
                        (Some(a), Some(v)) => Some(a.eos_id != v.eos_id && a.same_team(v)),
                        _ => None,
                    };
                    event.enrichment.attacker = attacker;
                    event.enrichment.victim = victim;
                    event.enrichment.teamkill = teamkill;
                }
                EventPayload::RconChatMessage { eos_id, .. } => {
                    event.enrichment.player = self.get_by_eos(eos_id).await?;
                }
                _ => {}
            }
            Ok(())
        }
        .await;
        if let Err(e) = result {
            tracing::debug!(server = %self.server, error = %e, "event enrichment failed");
        }
    }
}

#[cfg(test)]
#[path = "tracker_tests.rs"]
mod tests;
