// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-server RCON connection management.
//!
//! Each managed server gets one connection task owning a client, a
//! bounded FIFO command queue with a separate high-priority lane, and
//! the reconnect loop. At most one command is in flight per
//! connection; high priority jumps the queue head but never preempts
//! an in-flight command. Push packets are parsed and published on the
//! event bus as RCON-sourced events.

use crate::backoff;
use crate::client::RconClient;
use crate::error::RconError;
use crate::packet::RconPacket;
use crate::parser;
use aegis_core::event::{Event, EventPayload, EventSource};
use aegis_core::{EventBus, RconConfig, ServerId};
use aegis_storage::{CommandHistoryEntry, Repository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// Default per-command timeout.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);
/// Keepalive cadence; two consecutive failures drop the connection.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);
const KEEPALIVE_FAILURE_LIMIT: u32 = 2;
/// Bound for each command lane.
const QUEUE_CAPACITY: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    #[default]
    Normal,
    High,
}

/// Options for one command submission.
#[derive(Debug, Clone, Default)]
pub struct CommandOptions {
    pub timeout: Option<Duration>,
    pub priority: Priority,
    /// Keep the command queued across a reconnect instead of failing it.
    pub retry_on_reconnect: bool,
    /// Accept an empty body as success.
    pub suppress_empty_response: bool,
    /// Coalescing hint: while a command with the same key is queued,
    /// further submissions complete immediately with an empty body.
    pub dedup_key: Option<String>,
}

/// Health snapshot for one server's control channel.
#[derive(Debug, Clone, Default)]
pub struct Health {
    pub connected: bool,
    pub last_ok_at: Option<DateTime<Utc>>,
    pub queue_depth: usize,
    pub consecutive_failures: u32,
    /// Set when authentication failed; cleared only by configuration
    /// change (server re-add).
    pub auth_failed: bool,
}

/// Anything that can run an RCON command for a server. The tracker and
/// the workflow action handlers depend on this seam, not the manager.
#[async_trait]
pub trait CommandRunner: Send + Sync + 'static {
    async fn run(&self, command: &str, options: CommandOptions) -> Result<String, RconError>;
}

struct QueuedCommand {
    command: String,
    options: CommandOptions,
    responder: oneshot::Sender<Result<String, RconError>>,
}

struct HandleShared {
    health: Mutex<Health>,
    queue_depth: AtomicUsize,
    /// Dedup keys currently sitting in a lane.
    queued_keys: Mutex<std::collections::HashSet<String>>,
}

/// Cloneable handle to one server's command queue.
#[derive(Clone)]
pub struct ServerHandle {
    server: ServerId,
    normal_tx: mpsc::Sender<QueuedCommand>,
    high_tx: mpsc::Sender<QueuedCommand>,
    shared: Arc<HandleShared>,
    cancel: CancellationToken,
}

impl ServerHandle {
    pub fn server(&self) -> &ServerId {
        &self.server
    }

    /// Submit a command and wait for its full response body.
    pub async fn execute(
        &self,
        command: &str,
        options: CommandOptions,
    ) -> Result<String, RconError> {
        if self.shared.health.lock().auth_failed {
            return Err(RconError::AuthFailed);
        }
        if let Some(key) = &options.dedup_key {
            if !self.shared.queued_keys.lock().insert(key.clone()) {
                return Ok(String::new());
            }
        }
        let (done_tx, done_rx) = oneshot::channel();
        let queued = QueuedCommand {
            command: command.to_string(),
            options: options.clone(),
            responder: done_tx,
        };
        let lane = match options.priority {
            Priority::High => &self.high_tx,
            Priority::Normal => &self.normal_tx,
        };
        lane.send(queued)
            .await
            .map_err(|_| RconError::Disconnected)?;
        self.shared.queue_depth.fetch_add(1, Ordering::Relaxed);
        done_rx.await.map_err(|_| RconError::Disconnected)?
    }

    pub fn health(&self) -> Health {
        let mut health = self.shared.health.lock().clone();
        health.queue_depth = self.shared.queue_depth.load(Ordering::Relaxed);
        health
    }
}

#[async_trait]
impl CommandRunner for ServerHandle {
    async fn run(&self, command: &str, options: CommandOptions) -> Result<String, RconError> {
        self.execute(command, options).await
    }
}

/// Registry of per-server connection tasks.
pub struct RconManager {
    bus: EventBus,
    repository: Option<Arc<dyn Repository>>,
    servers: Mutex<HashMap<ServerId, ServerHandle>>,
}

impl RconManager {
    pub fn new(bus: EventBus, repository: Option<Arc<dyn Repository>>) -> Self {
        Self {
            bus,
            repository,
            servers: Mutex::new(HashMap::new()),
        }
    }

    /// Start managing a server. Replaces any existing registration.
    pub fn add_server(&self, server: ServerId, config: RconConfig) -> ServerHandle {
        self.remove_server(&server);

        let (normal_tx, normal_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (high_tx, high_rx) = mpsc::channel(QUEUE_CAPACITY);
        let shared = Arc::new(HandleShared {
            health: Mutex::new(Health::default()),
            queue_depth: AtomicUsize::new(0),
            queued_keys: Mutex::new(std::collections::HashSet::new()),
        });
        let cancel = CancellationToken::new();

        let handle = ServerHandle {
            server: server.clone(),
            normal_tx,
            high_tx,
            shared: Arc::clone(&shared),
            cancel: cancel.clone(),
        };

        tokio::spawn(connection_task(ConnectionTask {
            server: server.clone(),
            config,
            normal_rx,
            high_rx,
            normal_tx: handle.normal_tx.clone(),
            high_tx: handle.high_tx.clone(),
            shared,
            cancel,
            bus: self.bus.clone(),
            repository: self.repository.clone(),
        }));

        self.servers.lock().insert(server, handle.clone());
        handle
    }

    /// Stop managing a server; queued commands fail with `Disconnected`.
    pub fn remove_server(&self, server: &ServerId) {
        if let Some(handle) = self.servers.lock().remove(server) {
            handle.cancel.cancel();
        }
    }

    pub fn handle(&self, server: &ServerId) -> Option<ServerHandle> {
        self.servers.lock().get(server).cloned()
    }

    pub fn health(&self, server: &ServerId) -> Option<Health> {
        self.handle(server).map(|h| h.health())
    }

    pub async fn execute(
        &self,
        server: &ServerId,
        command: &str,
        options: CommandOptions,
    ) -> Result<String, RconError> {
        let handle = self.handle(server).ok_or(RconError::Disconnected)?;
        handle.execute(command, options).await
    }
}

struct ConnectionTask {
    server: ServerId,
    config: RconConfig,
    normal_rx: mpsc::Receiver<QueuedCommand>,
    high_rx: mpsc::Receiver<QueuedCommand>,
    /// Loopback senders used to requeue `retry_on_reconnect` commands.
    normal_tx: mpsc::Sender<QueuedCommand>,
    high_tx: mpsc::Sender<QueuedCommand>,
    shared: Arc<HandleShared>,
    cancel: CancellationToken,
    bus: EventBus,
    repository: Option<Arc<dyn Repository>>,
}

async fn connection_task(mut task: ConnectionTask) {
    let mut attempt: u32 = 0;
    let mut push_seq: u64 = 0;
    loop {
        if task.cancel.is_cancelled() {
            break;
        }
        let address = task.config.address();
        let connected = tokio::select! {
            _ = task.cancel.cancelled() => break,
            result = RconClient::connect(&address, &task.config.password) => result,
        };
        match connected {
            Ok((client, push_rx)) => {
                attempt = 0;
                {
                    let mut health = task.shared.health.lock();
                    health.connected = true;
                    health.consecutive_failures = 0;
                }
                tracing::info!(server = %task.server, "rcon connected");
                run_connection(&mut task, client, push_rx, &mut push_seq).await;
                task.shared.health.lock().connected = false;
                tracing::info!(server = %task.server, "rcon connection ended");
                requeue_or_fail(&mut task).await;
            }
            Err(RconError::AuthFailed) => {
                let mut health = task.shared.health.lock();
                health.connected = false;
                health.auth_failed = true;
                drop(health);
                tracing::error!(
                    server = %task.server,
                    "rcon authentication failed; waiting for configuration change"
                );
                fail_all_queued(&mut task, RconError::AuthFailed);
                break;
            }
            Err(e) => {
                task.shared.health.lock().consecutive_failures += 1;
                tracing::warn!(server = %task.server, error = %e, "rcon connect failed");
            }
        }

        if task.cancel.is_cancelled() {
            break;
        }
        let delay = backoff::reconnect_delay(attempt);
        attempt = attempt.saturating_add(1);
        tokio::select! {
            _ = task.cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }
    fail_all_queued(&mut task, RconError::Disconnected);
}

async fn run_connection(
    task: &mut ConnectionTask,
    client: RconClient,
    mut push_rx: mpsc::Receiver<RconPacket>,
    push_seq: &mut u64,
) {
    let disconnected = client.disconnected();
    let mut keepalive = tokio::time::interval(KEEPALIVE_INTERVAL);
    keepalive.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    keepalive.tick().await; // consume the immediate first tick
    let mut keepalive_failures: u32 = 0;

    loop {
        tokio::select! {
            biased;

            _ = task.cancel.cancelled() => {
                client.close().await;
                return;
            }

            _ = disconnected.cancelled() => {
                return;
            }

            Some(packet) = push_rx.recv() => {
                *push_seq += 1;
                publish_push(task, packet, *push_seq).await;
            }

            Some(cmd) = task.high_rx.recv() => {
                if run_command(task, &client, cmd).await.is_err() {
                    return;
                }
            }

            Some(cmd) = task.normal_rx.recv() => {
                if run_command(task, &client, cmd).await.is_err() {
                    return;
                }
            }

            _ = keepalive.tick() => {
                let ping = client.execute("", DEFAULT_COMMAND_TIMEOUT).await;
                match ping {
                    Ok(_) => {
                        keepalive_failures = 0;
                        let mut health = task.shared.health.lock();
                        health.consecutive_failures = 0;
                        health.last_ok_at = Some(Utc::now());
                    }
                    Err(e) => {
                        keepalive_failures += 1;
                        task.shared.health.lock().consecutive_failures += 1;
                        tracing::warn!(
                            server = %task.server,
                            error = %e,
                            failures = keepalive_failures,
                            "rcon keepalive failed"
                        );
                        if keepalive_failures >= KEEPALIVE_FAILURE_LIMIT {
                            client.close().await;
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// Execute one dequeued command. Returns `Err(())` when the connection
/// must be torn down.
async fn run_command(
    task: &ConnectionTask,
    client: &RconClient,
    cmd: QueuedCommand,
) -> Result<(), ()> {
    task.shared.queue_depth.fetch_sub(1, Ordering::Relaxed);
    if let Some(key) = &cmd.options.dedup_key {
        task.shared.queued_keys.lock().remove(key);
    }
    let timeout = cmd.options.timeout.unwrap_or(DEFAULT_COMMAND_TIMEOUT);
    let started = std::time::Instant::now();

    let mut result = client.execute(&cmd.command, timeout).await;
    if let Ok(body) = &result {
        if body.is_empty() && !cmd.options.suppress_empty_response {
            result = Err(RconError::EmptyResponse);
        }
    }

    record_history(task, &cmd.command, &result, started.elapsed());

    {
        let mut health = task.shared.health.lock();
        match &result {
            Ok(_) | Err(RconError::EmptyResponse) => {
                health.consecutive_failures = 0;
                health.last_ok_at = Some(Utc::now());
            }
            Err(_) => health.consecutive_failures += 1,
        }
    }

    let disconnected = matches!(result, Err(RconError::Disconnected));
    let _ = cmd.responder.send(result);
    if disconnected {
        Err(())
    } else {
        Ok(())
    }
}

fn record_history(
    task: &ConnectionTask,
    command: &str,
    result: &Result<String, RconError>,
    elapsed: Duration,
) {
    // Keepalives are noise in the audit trail.
    if command.is_empty() {
        return;
    }
    let Some(repository) = task.repository.clone() else {
        return;
    };
    let entry = CommandHistoryEntry {
        server_id: task.server.clone(),
        command: command.to_string(),
        succeeded: result.is_ok(),
        error: result.as_ref().err().map(|e| e.to_string()),
        duration_ms: elapsed.as_millis() as u64,
        executed_at: Utc::now(),
    };
    tokio::spawn(async move {
        if let Err(e) = repository.record_command(entry).await {
            tracing::debug!(error = %e, "failed to record rcon command history");
        }
    });
}

async fn publish_push(task: &ConnectionTask, packet: RconPacket, seq: u64) {
    let payload = parser::parse_push_packet(&packet.body).unwrap_or(EventPayload::Unparsed {
        line: packet.body.clone(),
    });
    let event = Event::new(
        task.server.clone(),
        EventSource::Rcon,
        seq,
        Utc::now(),
        payload,
    );
    task.bus.publish(event).await;
}

/// After a connection drop: commands queued with `retry_on_reconnect`
/// stay queued (in order); the rest fail with `Disconnected`.
async fn requeue_or_fail(task: &mut ConnectionTask) {
    let mut keep_high = Vec::new();
    let mut keep_normal = Vec::new();
    while let Ok(cmd) = task.high_rx.try_recv() {
        if cmd.options.retry_on_reconnect {
            keep_high.push(cmd);
        } else {
            drop_queued(task, &cmd);
            let _ = cmd.responder.send(Err(RconError::Disconnected));
        }
    }
    while let Ok(cmd) = task.normal_rx.try_recv() {
        if cmd.options.retry_on_reconnect {
            keep_normal.push(cmd);
        } else {
            drop_queued(task, &cmd);
            let _ = cmd.responder.send(Err(RconError::Disconnected));
        }
    }
    // The lanes were just drained, so these sends cannot block.
    for cmd in keep_high {
        let _ = task.high_tx.send(cmd).await;
    }
    for cmd in keep_normal {
        let _ = task.normal_tx.send(cmd).await;
    }
}

fn fail_all_queued(task: &mut ConnectionTask, error: RconError) {
    while let Ok(cmd) = task.high_rx.try_recv() {
        drop_queued(task, &cmd);
        let _ = cmd.responder.send(Err(error.clone()));
    }
    while let Ok(cmd) = task.normal_rx.try_recv() {
        drop_queued(task, &cmd);
        let _ = cmd.responder.send(Err(error.clone()));
    }
}

fn drop_queued(task: &ConnectionTask, cmd: &QueuedCommand) {
    task.shared.queue_depth.fetch_sub(1, Ordering::Relaxed);
    if let Some(key) = &cmd.options.dedup_key {
        task.shared.queued_keys.lock().remove(key);
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
