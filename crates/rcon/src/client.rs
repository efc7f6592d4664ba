// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-connection RCON client.
//!
//! Owns one TCP connection: auth handshake, request ids, multi-packet
//! response stitching via the empty sentinel, and routing of push
//! packets to a channel. Queuing and reconnect policy live in the
//! manager; the client assumes at most one command in flight.

use crate::error::RconError;
use crate::packet::{RconPacket, AUTH_RESPONSE, CHAT_VALUE, RESPONSE_VALUE};
use bytes::BytesMut;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// Connection lifecycle. Commands may be queued only in `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Authenticating,
    Ready,
    Draining,
    Closed,
}

enum PendingMode {
    Auth,
    Command,
}

struct Pending {
    id: i32,
    mode: PendingMode,
    parts: Vec<String>,
    done: oneshot::Sender<Result<String, RconError>>,
}

struct Shared {
    pending: Mutex<Option<Pending>>,
    state: Mutex<ConnectionState>,
    /// Cancelled when the reader exits; the manager watches this.
    disconnected: CancellationToken,
}

/// One authenticated RCON connection.
pub struct RconClient {
    writer: tokio::sync::Mutex<OwnedWriteHalf>,
    shared: Arc<Shared>,
    next_id: AtomicI32,
    reader: tokio::task::JoinHandle<()>,
}

/// Default handshake timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

impl RconClient {
    /// Connect and authenticate. Returns the client plus the push
    /// packet stream (chat, kicks, bans, squad notices).
    pub async fn connect(
        address: &str,
        password: &str,
    ) -> Result<(Self, mpsc::Receiver<RconPacket>), RconError> {
        let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(address))
            .await
            .map_err(|_| RconError::Timeout)?
            .map_err(|e| RconError::Protocol(format!("connect {address}: {e}")))?;
        let _ = stream.set_nodelay(true);
        let (read_half, write_half) = stream.into_split();

        let (push_tx, push_rx) = mpsc::channel(256);
        let shared = Arc::new(Shared {
            pending: Mutex::new(None),
            state: Mutex::new(ConnectionState::Authenticating),
            disconnected: CancellationToken::new(),
        });

        let reader = tokio::spawn(read_loop(read_half, Arc::clone(&shared), push_tx));

        let client = Self {
            writer: tokio::sync::Mutex::new(write_half),
            shared,
            next_id: AtomicI32::new(1),
            reader,
        };

        client.authenticate(password).await?;
        *client.shared.state.lock() = ConnectionState::Ready;
        Ok((client, push_rx))
    }

    async fn authenticate(&self, password: &str) -> Result<(), RconError> {
        let id = self.take_id();
        let (done_tx, done_rx) = oneshot::channel();
        *self.shared.pending.lock() = Some(Pending {
            id,
            mode: PendingMode::Auth,
            parts: Vec::new(),
            done: done_tx,
        });

        self.write_packet(&RconPacket::auth(id, password)).await?;

        match tokio::time::timeout(CONNECT_TIMEOUT, done_rx).await {
            Ok(Ok(result)) => result.map(|_| ()),
            Ok(Err(_)) => Err(RconError::Disconnected),
            Err(_) => {
                self.shared.pending.lock().take();
                Err(RconError::Timeout)
            }
        }
    }

    /// Execute one command and return the complete concatenated body.
    pub async fn execute(&self, command: &str, timeout: Duration) -> Result<String, RconError> {
        if self.state() != ConnectionState::Ready {
            return Err(RconError::Disconnected);
        }
        let id = self.take_id();
        let (done_tx, done_rx) = oneshot::channel();
        {
            let mut pending = self.shared.pending.lock();
            if pending.is_some() {
                return Err(RconError::Protocol("command already in flight".into()));
            }
            *pending = Some(Pending {
                id,
                mode: PendingMode::Command,
                parts: Vec::new(),
                done: done_tx,
            });
        }

        let write = async {
            self.write_packet(&RconPacket::command(id, command)).await?;
            // The echoed empty frame with this id marks end-of-response.
            self.write_packet(&RconPacket::sentinel(id)).await
        };
        if let Err(e) = write.await {
            self.shared.pending.lock().take();
            return Err(e);
        }

        match tokio::time::timeout(timeout, done_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(RconError::Disconnected),
            Err(_) => {
                self.shared.pending.lock().take();
                Err(RconError::Timeout)
            }
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.lock()
    }

    /// Resolved when the connection drops for any reason.
    pub fn disconnected(&self) -> CancellationToken {
        self.shared.disconnected.clone()
    }

    /// Drain and close the connection.
    pub async fn close(self) {
        *self.shared.state.lock() = ConnectionState::Draining;
        let mut writer = self.writer.lock().await;
        let _ = writer.shutdown().await;
        *self.shared.state.lock() = ConnectionState::Closed;
        self.reader.abort();
    }

    fn take_id(&self) -> i32 {
        // Ids 0 (push) and -1 (auth failure) are reserved; wrap to 1.
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if id <= 0 {
            self.next_id.store(2, Ordering::Relaxed);
            1
        } else {
            id
        }
    }

    async fn write_packet(&self, packet: &RconPacket) -> Result<(), RconError> {
        let mut buf = BytesMut::new();
        packet.encode(&mut buf)?;
        let mut writer = self.writer.lock().await;
        writer
            .write_all(&buf)
            .await
            .map_err(|_| RconError::Disconnected)
    }
}

impl Drop for RconClient {
    fn drop(&mut self) {
        self.reader.abort();
        self.shared.disconnected.cancel();
    }
}

async fn read_loop(
    mut read_half: OwnedReadHalf,
    shared: Arc<Shared>,
    push_tx: mpsc::Sender<RconPacket>,
) {
    let mut buf = BytesMut::with_capacity(8 * 1024);
    'outer: loop {
        // Drain every complete frame already buffered.
        loop {
            match RconPacket::decode(&mut buf) {
                Ok(Some(packet)) => dispatch(&shared, &push_tx, packet).await,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "rcon frame decode failed, dropping connection");
                    fail_pending(&shared, RconError::Protocol(e.to_string()));
                    break 'outer;
                }
            }
        }

        match read_half.read_buf(&mut buf).await {
            Ok(0) => {
                fail_pending(&shared, RconError::Disconnected);
                break;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(error = %e, "rcon socket read failed");
                fail_pending(&shared, RconError::Disconnected);
                break;
            }
        }
    }
    *shared.state.lock() = ConnectionState::Disconnected;
    shared.disconnected.cancel();
}

async fn dispatch(shared: &Shared, push_tx: &mpsc::Sender<RconPacket>, packet: RconPacket) {
    if packet.packet_type == CHAT_VALUE {
        if push_tx.send(packet).await.is_err() {
            tracing::debug!("push receiver dropped, discarding rcon push packet");
        }
        return;
    }

    let mut pending_slot = shared.pending.lock();
    let Some(pending) = pending_slot.as_mut() else {
        // Unsolicited frame (e.g. keepalive echo after timeout); drop.
        return;
    };

    match pending.mode {
        PendingMode::Auth => match packet.packet_type {
            AUTH_RESPONSE => {
                let result = if packet.id == pending.id {
                    Ok(String::new())
                } else {
                    // Failed auth echoes -1.
                    Err(RconError::AuthFailed)
                };
                if let Some(p) = pending_slot.take() {
                    let _ = p.done.send(result);
                }
            }
            // Servers may echo an empty RESPONSE_VALUE before the auth
            // response; it is not the result.
            _ => {}
        },
        PendingMode::Command => {
            if packet.id != pending.id || packet.packet_type != RESPONSE_VALUE {
                return;
            }
            if packet.is_empty_body() && !pending.parts.is_empty() {
                if let Some(p) = pending_slot.take() {
                    let _ = p.done.send(Ok(p.parts.concat()));
                }
            } else if packet.is_empty_body() {
                // Empty body and nothing stitched: completed empty
                // response (the sentinel echo arrived first).
                if let Some(p) = pending_slot.take() {
                    let _ = p.done.send(Ok(String::new()));
                }
            } else {
                pending.parts.push(packet.body);
            }
        }
    }
}

fn fail_pending(shared: &Shared, error: RconError) {
    if let Some(pending) = shared.pending.lock().take() {
        let _ = pending.done.send(Err(error));
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
