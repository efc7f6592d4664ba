// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! aegis-engine: runs workflows.
//!
//! The scheduler loads definitions, indexes triggers by event kind,
//! matches incoming bus events (enriched first), and spawns executions
//! under per-workflow concurrency caps. The executor owns one
//! execution: variable scope, step dispatch, retries, cancellation,
//! and history persistence. Action handlers and the Lua sandbox do
//! the outward-facing work.

pub mod actions;
pub mod error;
pub mod executor;
pub mod lua;
pub mod scheduler;
pub mod scope;

#[cfg(test)]
pub mod test_helpers;

pub use actions::{ActionContext, ActionHandler, ActionRegistry};
pub use error::EngineError;
pub use executor::{ExecutionDeps, Executor, ExecutorConfig};
pub use scheduler::{SchedulerConfig, WorkflowScheduler};
pub use scope::VariableScope;
