// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The log source contract.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Log source errors
#[derive(Debug, Error)]
pub enum LogSourceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("remote file not found: {0}")]
    NotFound(String),
}

/// Lines produced by one poll.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct LogBatch {
    /// Complete lines, in file order. Partial trailing data stays
    /// buffered in the source until a newline arrives.
    pub lines: Vec<String>,
    /// Byte offset after consuming `lines`.
    pub offset: u64,
    /// True when rotation/truncation was detected before this batch.
    pub rotated: bool,
}

/// An incremental reader over a server's log stream.
///
/// Implementations never drop their offset on transient failure; the
/// pipeline persists it only after a batch has been parsed and
/// published.
#[async_trait]
pub trait LogSource: Send + 'static {
    /// Read complete lines appended since the previous poll.
    async fn poll(&mut self) -> Result<LogBatch, LogSourceError>;

    /// Current byte offset (for health/debug surfaces).
    fn offset(&self) -> u64;

    /// Wait until new data is plausible, up to `max_wait`. Sources
    /// with change notification return earlier.
    async fn idle(&mut self, max_wait: Duration) {
        tokio::time::sleep(max_wait).await;
    }
}

/// Split a chunk read at `base_offset` into complete lines, carrying
/// partial trailing data in `buffer` across polls.
pub(crate) fn split_lines(buffer: &mut String, chunk: &str) -> Vec<String> {
    buffer.push_str(chunk);
    let mut lines = Vec::new();
    while let Some(pos) = buffer.find('\n') {
        let mut line: String = buffer.drain(..=pos).collect();
        line.pop(); // trailing \n
        if line.ends_with('\r') {
            line.pop();
        }
        lines.push(line);
    }
    lines
}
