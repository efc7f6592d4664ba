// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-server log ingestion loop.
//!
//! Polls a source, parses each line, publishes the resulting events,
//! then persists the offset — in that order, so a crash between
//! publish and persist re-reads at most one batch and never skips
//! lines. Source errors back off exponentially and never reset the
//! offset.

use crate::parser::LogParser;
use crate::source::{LogSource, LogSourceError};
use aegis_core::{EventBus, ServerId};
use aegis_storage::Repository;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Backoff bounds for source failures.
const ERROR_BACKOFF_BASE: Duration = Duration::from_secs(1);
const ERROR_BACKOFF_CAP: Duration = Duration::from_secs(60);
/// Unparsed-line warnings are rate limited to one per minute.
const UNPARSED_WARN_INTERVAL: Duration = Duration::from_secs(60);

/// Drives one source → parser → bus pipeline.
pub struct LogPipeline {
    server: ServerId,
    bus: EventBus,
    repository: Arc<dyn Repository>,
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl LogPipeline {
    pub fn new(
        server: ServerId,
        bus: EventBus,
        repository: Arc<dyn Repository>,
        poll_interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            server,
            bus,
            repository,
            poll_interval,
            cancel,
        }
    }

    /// Run until cancelled. Consumes the source.
    pub async fn run(self, mut source: Box<dyn LogSource>) {
        let mut parser = LogParser::new(self.server.clone());
        let mut error_streak: u32 = 0;
        let mut last_unparsed_warn: Option<std::time::Instant> = None;

        loop {
            if self.cancel.is_cancelled() {
                return;
            }

            match source.poll().await {
                Ok(batch) => {
                    error_streak = 0;
                    if batch.rotated {
                        // Offset reset must be durable before new lines
                        // are attributed to the fresh file.
                        if let Err(e) = self.repository.save_log_offset(&self.server, 0).await {
                            tracing::warn!(server = %self.server, error = %e, "failed to persist rotated offset");
                        }
                    }
                    if !batch.lines.is_empty() {
                        let now = Utc::now();
                        let mut unparsed = 0usize;
                        for line in &batch.lines {
                            for event in parser.parse_line(line, now) {
                                if matches!(
                                    event.kind(),
                                    aegis_core::EventKind::Unparsed
                                ) {
                                    unparsed += 1;
                                }
                                self.bus.publish(event).await;
                            }
                        }
                        if unparsed > 0 {
                            let due = last_unparsed_warn
                                .is_none_or(|t| t.elapsed() >= UNPARSED_WARN_INTERVAL);
                            if due {
                                last_unparsed_warn = Some(std::time::Instant::now());
                                tracing::warn!(
                                    server = %self.server,
                                    count = unparsed,
                                    "log lines did not match any pattern"
                                );
                            }
                        }
                        if let Err(e) = self
                            .repository
                            .save_log_offset(&self.server, batch.offset)
                            .await
                        {
                            tracing::warn!(server = %self.server, error = %e, "failed to persist log offset");
                        }
                    }
                }
                Err(e) => {
                    error_streak = error_streak.saturating_add(1);
                    let backoff = error_backoff(error_streak);
                    log_source_error(&self.server, &e, error_streak);
                    tokio::select! {
                        _ = self.cancel.cancelled() => return,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    continue;
                }
            }

            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = source.idle(self.poll_interval) => {}
            }
        }
    }
}

fn error_backoff(streak: u32) -> Duration {
    let ms = ERROR_BACKOFF_BASE.as_millis() as u64 * 2u64.saturating_pow(streak.min(10) - 1);
    Duration::from_millis(ms.min(ERROR_BACKOFF_CAP.as_millis() as u64))
}

fn log_source_error(server: &ServerId, error: &LogSourceError, streak: u32) {
    tracing::warn!(server = %server, error = %error, streak, "log source poll failed");
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
