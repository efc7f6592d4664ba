// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error types.

use thiserror::Error;

/// Errors surfaced by the scheduler and executor.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] aegis_storage::StorageError),

    #[error("invalid workflow: {0}")]
    Invalid(#[from] aegis_workflow::ValidateError),

    #[error("workflow {0} not found")]
    WorkflowNotFound(aegis_core::WorkflowId),

    #[error("step {step}: {message}")]
    Step {
        step: aegis_core::StepId,
        message: String,
    },
}

/// Failures inside one action handler invocation.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("invalid parameter {0}: {1}")]
    InvalidParam(&'static str, String),

    #[error("rcon error: {0}")]
    Rcon(#[from] aegis_rcon::RconError),

    #[error("http error: {0}")]
    Http(String),

    #[error("connector error: {0}")]
    Connector(#[from] aegis_core::ConnectorError),

    #[error("kv error: {0}")]
    Cache(#[from] aegis_cache::CacheError),

    #[error("lua error: {0}")]
    Lua(String),
}
