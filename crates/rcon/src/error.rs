// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! RCON error kinds.

use thiserror::Error;

/// Errors surfaced to command callers and the manager.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RconError {
    /// Wrong password. Fatal for the connection; not retried until the
    /// server configuration changes.
    #[error("rcon authentication failed")]
    AuthFailed,

    #[error("rcon command timed out")]
    Timeout,

    /// The connection dropped while the command was in flight.
    #[error("rcon connection lost")]
    Disconnected,

    #[error("rcon protocol error: {0}")]
    Protocol(String),

    /// A frame exceeded the protocol's size bound.
    #[error("rcon frame size {size} outside allowed range")]
    SizeLimit { size: i32 },

    /// The command produced an empty body and the caller did not opt
    /// into empty responses.
    #[error("rcon command returned an empty response")]
    EmptyResponse,
}
