// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource monitoring for sandboxed (dynamic) plugin instances.
//!
//! A monitor polls the instance's usage probe every 5 seconds; any
//! limit violation cancels the instance context so the runtime's
//! shutdown hook runs. Built-in plugins are trusted and not monitored.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Per-instance sandbox limits.
#[derive(Debug, Clone)]
pub struct ResourceLimits {
    pub max_memory_mb: u64,
    pub max_tasks: u64,
    pub cpu_time_limit: Duration,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_memory_mb: 256,
            max_tasks: 64,
            cpu_time_limit: Duration::from_secs(60),
        }
    }
}

/// A point-in-time usage reading.
#[derive(Debug, Clone, Copy, Default)]
pub struct UsageSample {
    pub memory_bytes: u64,
    pub tasks: u64,
    pub cpu_time: Duration,
}

/// Where usage numbers come from. Dynamic artifacts export a stats
/// hook the loader wires up; tests use fakes.
pub trait UsageProbe: Send + Sync + 'static {
    fn sample(&self) -> UsageSample;
}

/// Poll cadence.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Watches one instance. Cancelling the returned token stops the
/// monitor; the monitor cancelling `instance_ctx` signals a violation.
pub struct ResourceMonitor {
    limits: ResourceLimits,
    probe: Arc<dyn UsageProbe>,
}

impl ResourceMonitor {
    pub fn new(limits: ResourceLimits, probe: Arc<dyn UsageProbe>) -> Self {
        Self { limits, probe }
    }

    /// Spawn the polling task.
    pub fn spawn(self, instance: String, instance_ctx: CancellationToken) -> CancellationToken {
        let stop = CancellationToken::new();
        let monitor_stop = stop.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(POLL_INTERVAL);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = monitor_stop.cancelled() => return,
                    _ = instance_ctx.cancelled() => return,
                    _ = interval.tick() => {}
                }
                let sample = self.probe.sample();
                if let Some(violation) = self.check(&sample) {
                    tracing::error!(
                        %instance,
                        violation,
                        memory_bytes = sample.memory_bytes,
                        tasks = sample.tasks,
                        cpu_ms = sample.cpu_time.as_millis() as u64,
                        "plugin resource limit violated, cancelling instance"
                    );
                    instance_ctx.cancel();
                    return;
                }
            }
        });
        stop
    }

    fn check(&self, sample: &UsageSample) -> Option<&'static str> {
        if sample.memory_bytes > self.limits.max_memory_mb * 1024 * 1024 {
            return Some("memory");
        }
        if sample.tasks > self.limits.max_tasks {
            return Some("tasks");
        }
        if sample.cpu_time > self.limits.cpu_time_limit {
            return Some("cpu");
        }
        None
    }
}
