// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reconnect backoff: bounded exponential with jitter.

use rand::Rng;
use std::time::Duration;

/// Base delay for the first reconnect attempt.
pub const BASE: Duration = Duration::from_secs(1);
/// Delay ceiling.
pub const CAP: Duration = Duration::from_secs(60);
/// Jitter fraction applied around the computed delay.
const JITTER: f64 = 0.2;

/// Delay before reconnect attempt `attempt` (0-based), jittered ±20%.
pub fn reconnect_delay(attempt: u32) -> Duration {
    let exp = BASE.as_millis() as u64 * 2u64.saturating_pow(attempt.min(16));
    let capped = exp.min(CAP.as_millis() as u64);
    jittered(Duration::from_millis(capped))
}

/// Retry delay for workflow steps: `base * 2^attempt`, capped at
/// `base * 2^max`, jittered.
pub fn retry_delay(base_ms: u64, attempt: u32) -> Duration {
    let ms = base_ms.saturating_mul(2u64.saturating_pow(attempt.min(16)));
    jittered(Duration::from_millis(ms))
}

fn jittered(base: Duration) -> Duration {
    let ms = base.as_millis() as f64;
    let factor = 1.0 + rand::rng().random_range(-JITTER..=JITTER);
    Duration::from_millis((ms * factor).max(0.0) as u64)
}
