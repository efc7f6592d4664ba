// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-process supervisor.
//!
//! Owns the shared fabric (event bus, cache, repository, connector
//! registry, RCON manager) and one component stack per managed
//! server. Server add wires components through the bus; server remove
//! tears them down in reverse order with a bounded grace period;
//! process shutdown drains workflow executions up to a deadline and
//! then force-terminates.

use crate::server_api::{RconAdminApi, TrackerServerApi};
use aegis_cache::Cache;
use aegis_core::{
    ConnectorRegistry, EventBus, EventKind, ServerId, ServerRecord, SubscriptionFilter,
    SubscriptionOptions,
};
use aegis_engine::{ActionRegistry, SchedulerConfig, WorkflowScheduler};
use aegis_logs::{ftp::FtpConfig, ftp::FtpSource, sftp::SftpConfig, sftp::SftpSource};
use aegis_logs::{LocalSource, LogPipeline, LogSource};
use aegis_plugins::{builtin, DynamicLoader, PluginRuntime};
use aegis_rcon::RconManager;
use aegis_storage::Repository;
use aegis_tracker::{PlayerTracker, TrackerConfig};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Supervisor errors
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("storage error: {0}")]
    Storage(#[from] aegis_storage::StorageError),

    #[error("engine error: {0}")]
    Engine(#[from] aegis_engine::EngineError),

    #[error("server {0} is not managed")]
    UnknownServer(ServerId),
}

/// Supervisor tuning.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub tracker: TrackerConfig,
    pub scheduler: SchedulerConfig,
    /// Per-component teardown grace.
    pub component_grace: Duration,
    /// Total workflow drain deadline at shutdown.
    pub drain_deadline: Duration,
    /// Directory of signed dynamic plugin artifacts; `None` disables
    /// dynamic loading.
    pub plugin_dir: Option<std::path::PathBuf>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            tracker: TrackerConfig::default(),
            scheduler: SchedulerConfig::default(),
            component_grace: Duration::from_secs(10),
            drain_deadline: Duration::from_secs(30),
            plugin_dir: None,
        }
    }
}

struct ServerStack {
    cancel: CancellationToken,
    tracker: Arc<PlayerTracker>,
    scheduler: Arc<WorkflowScheduler>,
    plugins: Arc<PluginRuntime>,
}

/// One control plane instance. Everything hangs off this value.
pub struct Supervisor {
    bus: EventBus,
    cache: Cache,
    repository: Arc<dyn Repository>,
    connectors: ConnectorRegistry,
    actions: Arc<ActionRegistry>,
    rcon: Arc<RconManager>,
    config: SupervisorConfig,
    servers: Mutex<HashMap<ServerId, ServerStack>>,
    root_cancel: CancellationToken,
}

impl Supervisor {
    pub fn new(
        cache: Cache,
        repository: Arc<dyn Repository>,
        connectors: ConnectorRegistry,
        config: SupervisorConfig,
    ) -> Arc<Self> {
        let bus = EventBus::new();
        let rcon = Arc::new(RconManager::new(bus.clone(), Some(Arc::clone(&repository))));
        Arc::new(Self {
            bus,
            cache,
            repository,
            connectors,
            actions: Arc::new(ActionRegistry::with_builtins()),
            rcon,
            config,
            servers: Mutex::new(HashMap::new()),
            root_cancel: CancellationToken::new(),
        })
    }

    pub fn bus(&self) -> EventBus {
        self.bus.clone()
    }

    pub fn connectors(&self) -> ConnectorRegistry {
        self.connectors.clone()
    }

    pub fn rcon(&self) -> Arc<RconManager> {
        Arc::clone(&self.rcon)
    }

    /// Wire the full component stack for one server.
    pub async fn add_server(&self, record: ServerRecord) -> Result<(), SupervisorError> {
        self.remove_server(&record.id).await;
        let server = record.id.clone();
        let cancel = self.root_cancel.child_token();

        // 1. RCON client + command queue.
        let handle = self.rcon.add_server(server.clone(), record.rcon.clone());
        let runner: Arc<dyn aegis_rcon::CommandRunner> = Arc::new(handle.clone());

        // 2. Player tracker: periodic reconciliation plus incremental
        //    log-event application.
        let tracker = Arc::new(PlayerTracker::new(
            server.clone(),
            self.cache.clone(),
            Arc::clone(&runner),
            self.bus.clone(),
            self.config.tracker.clone(),
        ));
        tokio::spawn(Arc::clone(&tracker).run(cancel.child_token()));
        self.spawn_tracker_feed(&server, Arc::clone(&tracker), cancel.child_token());

        // 3. Log pipeline, when a source is configured.
        if let Some(source_config) = &record.log_source {
            let offset = if source_config.read_from_start() {
                0
            } else {
                self.repository.load_log_offset(&server).await?.unwrap_or(0)
            };
            let source = build_source(source_config, offset);
            let pipeline = LogPipeline::new(
                server.clone(),
                self.bus.clone(),
                Arc::clone(&self.repository),
                Duration::from_secs(source_config.poll_frequency_secs()),
                cancel.child_token(),
            );
            tokio::spawn(pipeline.run(source));
        }

        // 4. Workflow scheduler, enriching through the tracker.
        let scheduler = WorkflowScheduler::new(
            server.clone(),
            self.bus.clone(),
            Arc::clone(&self.repository),
            Arc::clone(&self.actions),
            self.cache.clone(),
            Arc::clone(&runner),
            self.connectors.clone(),
            Some(Arc::clone(&tracker) as Arc<dyn aegis_core::Enricher>),
            self.config.scheduler.clone(),
        );
        scheduler.reload().await?;
        tokio::spawn(Arc::clone(&scheduler).run(cancel.child_token()));

        // 5. Plugin runtime with built-ins, the signed dynamic loader
        //    (when a plugin directory is configured), and stored
        //    instances.
        let plugins = PluginRuntime::new(
            server.clone(),
            self.bus.clone(),
            Arc::clone(&runner),
            Arc::new(TrackerServerApi::new(Arc::clone(&tracker), Arc::clone(&runner))),
            self.connectors.clone(),
            self.cache.clone(),
            Some(Arc::new(RconAdminApi::new(Arc::clone(&runner)))),
        );
        plugins.register(builtin::TEAMKILL_WARNER_ID, builtin::TeamkillWarner::define);
        if let Some(dir) = &self.config.plugin_dir {
            let trusted = self.repository.trusted_keys().await?;
            if trusted.is_empty() {
                tracing::warn!(
                    server = %server,
                    "plugin_dir configured without trusted keys; dynamic loads will be rejected"
                );
            }
            plugins.enable_dynamic(dir.clone(), DynamicLoader::new(trusted));
        }
        let plugins = Arc::new(plugins);
        for instance in self.repository.list_plugin_instances(&server).await? {
            if let Err(e) = plugins.start_instance(instance).await {
                tracing::warn!(server = %server, error = %e, "plugin instance failed to start");
            }
        }

        self.servers.lock().insert(
            server.clone(),
            ServerStack {
                cancel,
                tracker,
                scheduler,
                plugins,
            },
        );
        tracing::info!(server = %server, "server stack wired");
        Ok(())
    }

    /// Subscribe the tracker to the log events it folds in. The
    /// subscription lives in its own task so tracker KV I/O never
    /// blocks other subscribers.
    fn spawn_tracker_feed(
        &self,
        server: &ServerId,
        tracker: Arc<PlayerTracker>,
        cancel: CancellationToken,
    ) {
        let mut sub = self.bus.subscribe(
            SubscriptionFilter::server_kinds(
                server.clone(),
                [
                    EventKind::LogPlayerConnected,
                    EventKind::LogJoinSucceeded,
                    EventKind::LogPlayerDisconnected,
                ],
            ),
            SubscriptionOptions::default(),
        );
        let server = server.clone();
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = cancel.cancelled() => return,
                    event = sub.recv() => match event {
                        Some(event) => event,
                        None => return,
                    },
                };
                if let Err(e) = tracker.apply_log_event(&event).await {
                    tracing::warn!(%server, error = %e, "tracker failed to apply log event");
                }
            }
        });
    }

    /// Tear down one server's stack, reverse wiring order.
    pub async fn remove_server(&self, server: &ServerId) {
        let Some(stack) = self.servers.lock().remove(server) else {
            return;
        };
        tracing::info!(%server, "tearing down server stack");

        // Plugins first: they depend on everything below them.
        stack.plugins.shutdown(self.config.component_grace).await;
        // Scheduler, tracker, and log pipeline share the stack token.
        stack.cancel.cancel();
        // RCON last: components above may have been mid-command.
        self.rcon.remove_server(server);
    }

    /// Reload one server's workflow definitions (admin write hook).
    pub async fn reload_workflows(&self, server: &ServerId) -> Result<usize, SupervisorError> {
        let scheduler = {
            let servers = self.servers.lock();
            let stack = servers
                .get(server)
                .ok_or_else(|| SupervisorError::UnknownServer(server.clone()))?;
            Arc::clone(&stack.scheduler)
        };
        Ok(scheduler.reload().await?)
    }

    /// Scheduler handle for one server (manual execution, admin API).
    pub fn scheduler(&self, server: &ServerId) -> Option<Arc<WorkflowScheduler>> {
        self.servers.lock().get(server).map(|s| Arc::clone(&s.scheduler))
    }

    /// Tracker handle for one server (admin API lookups).
    pub fn tracker(&self, server: &ServerId) -> Option<Arc<PlayerTracker>> {
        self.servers.lock().get(server).map(|s| Arc::clone(&s.tracker))
    }

    /// Plugin runtime for one server (admin API).
    pub fn plugins(&self, server: &ServerId) -> Option<Arc<PluginRuntime>> {
        self.servers.lock().get(server).map(|s| Arc::clone(&s.plugins))
    }

    pub fn managed_servers(&self) -> Vec<ServerId> {
        let mut ids: Vec<ServerId> = self.servers.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Process shutdown: stop intake, drain active executions up to
    /// the deadline, then cancel everything.
    pub async fn shutdown(&self) {
        tracing::info!("supervisor shutting down");
        let servers: Vec<ServerId> = self.managed_servers();

        // Drain running workflow executions first, bounded.
        let deadline = tokio::time::Instant::now() + self.config.drain_deadline;
        loop {
            let active: usize = {
                let stacks = self.servers.lock();
                stacks.values().map(|s| s.scheduler.running_executions()).sum()
            };
            if active == 0 || tokio::time::Instant::now() >= deadline {
                if active > 0 {
                    tracing::warn!(active, "drain deadline reached, force-terminating executions");
                }
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        for server in servers {
            self.remove_server(&server).await;
        }
        self.root_cancel.cancel();
    }
}

fn build_source(
    config: &aegis_core::LogSourceConfig,
    offset: u64,
) -> Box<dyn LogSource> {
    match config {
        aegis_core::LogSourceConfig::Local { path, .. } => {
            Box::new(LocalSource::new(path.clone(), offset))
        }
        aegis_core::LogSourceConfig::Sftp {
            host,
            port,
            username,
            password,
            path,
            ..
        } => Box::new(SftpSource::new(
            SftpConfig {
                host: host.clone(),
                port: *port,
                username: username.clone(),
                password: password.clone(),
                path: path.clone(),
            },
            offset,
        )),
        aegis_core::LogSourceConfig::Ftp {
            host,
            port,
            username,
            password,
            path,
            ..
        } => Box::new(FtpSource::new(
            FtpConfig {
                host: host.clone(),
                port: *port,
                username: username.clone(),
                password: password.clone(),
                path: path.clone(),
            },
            offset,
        )),
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
