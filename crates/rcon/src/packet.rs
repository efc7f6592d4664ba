// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! RCON wire framing.
//!
//! Frame layout, all little-endian:
//! `[size: i32][id: i32][type: i32][body: bytes][NUL][NUL]`
//! where `size` counts everything after itself. The minimum is 10
//! (id + type + two NULs); bodies above 4096 bytes are rejected.

use crate::error::RconError;
use bytes::{Buf, BufMut, BytesMut};

/// Client → server authentication request.
pub const AUTH: i32 = 3;
/// Server → client authentication result (id echoes, or -1 on failure).
pub const AUTH_RESPONSE: i32 = 2;
/// Client → server command. Shares the value 2 with AUTH_RESPONSE; the
/// direction disambiguates.
pub const EXEC_COMMAND: i32 = 2;
/// Server → client command output.
pub const RESPONSE_VALUE: i32 = 0;
/// Squad-specific push packet (chat, admin actions, squad notices).
pub const CHAT_VALUE: i32 = 1;

/// Maximum body size the protocol allows per frame.
pub const MAX_BODY: usize = 4096;

/// Size of the fields `size` counts, excluding the body.
const FRAME_OVERHEAD: i32 = 10;

/// One decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RconPacket {
    pub id: i32,
    pub packet_type: i32,
    pub body: String,
}

impl RconPacket {
    pub fn new(id: i32, packet_type: i32, body: impl Into<String>) -> Self {
        Self {
            id,
            packet_type,
            body: body.into(),
        }
    }

    pub fn auth(id: i32, password: &str) -> Self {
        Self::new(id, AUTH, password)
    }

    pub fn command(id: i32, command: &str) -> Self {
        Self::new(id, EXEC_COMMAND, command)
    }

    /// The empty sentinel sent after each command; the echo with a
    /// matching id marks end-of-response.
    pub fn sentinel(id: i32) -> Self {
        Self::new(id, RESPONSE_VALUE, "")
    }

    pub fn is_empty_body(&self) -> bool {
        // Squad echoes the sentinel with a 0x00 0x01 marker body.
        self.body.is_empty() || self.body.as_bytes() == [0x00, 0x01]
    }

    /// Append the encoded frame to `buf`.
    pub fn encode(&self, buf: &mut BytesMut) -> Result<(), RconError> {
        let body = self.body.as_bytes();
        if body.len() > MAX_BODY {
            return Err(RconError::SizeLimit {
                size: body.len() as i32 + FRAME_OVERHEAD,
            });
        }
        let size = body.len() as i32 + FRAME_OVERHEAD;
        buf.reserve(size as usize + 4);
        buf.put_i32_le(size);
        buf.put_i32_le(self.id);
        buf.put_i32_le(self.packet_type);
        buf.put_slice(body);
        buf.put_u8(0);
        buf.put_u8(0);
        Ok(())
    }

    /// Try to decode one frame from the front of `buf`.
    ///
    /// Returns `Ok(None)` when more bytes are needed; consumes the
    /// frame from `buf` on success.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<RconPacket>, RconError> {
        if buf.len() < 4 {
            return Ok(None);
        }
        let size = i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        if !(FRAME_OVERHEAD..=MAX_BODY as i32 + FRAME_OVERHEAD).contains(&size) {
            return Err(RconError::SizeLimit { size });
        }
        let total = size as usize + 4;
        if buf.len() < total {
            return Ok(None);
        }

        buf.advance(4);
        let id = buf.get_i32_le();
        let packet_type = buf.get_i32_le();
        let body_len = size as usize - FRAME_OVERHEAD as usize;
        let body_bytes = buf.split_to(body_len);
        let nul1 = buf.get_u8();
        let nul2 = buf.get_u8();
        if nul1 != 0 || nul2 != 0 {
            return Err(RconError::Protocol(format!(
                "frame id {id} missing trailing NULs"
            )));
        }
        let body = String::from_utf8_lossy(&body_bytes).into_owned();

        Ok(Some(RconPacket {
            id,
            packet_type,
            body,
        }))
    }
}

#[cfg(test)]
#[path = "packet_tests.rs"]
mod tests;
