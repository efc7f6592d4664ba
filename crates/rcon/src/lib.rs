// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! aegis-rcon: the live control channel to a Squad server.
//!
//! One pooled TCP connection per server speaks the Source-style RCON
//! framing with Squad's `CHAT_VALUE` push packets. The client owns a
//! single connection and the request/response stitching; the manager
//! owns queuing, health, reconnect, and fan-out of push packets as
//! typed events.

pub mod backoff;
pub mod client;
pub mod error;
pub mod manager;
pub mod packet;
pub mod parser;

pub use client::{ConnectionState, RconClient};
pub use error::RconError;
pub use manager::{
    CommandOptions, CommandRunner, Health, Priority, RconManager, ServerHandle,
};
pub use packet::{RconPacket, AUTH, AUTH_RESPONSE, CHAT_VALUE, EXEC_COMMAND, RESPONSE_VALUE};
