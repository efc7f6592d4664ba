// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The repository trait.

use crate::records::{CommandHistoryEntry, PluginInstanceRecord, TrustedKeyRecord};
use aegis_core::{ExecutionId, ServerId, ServerRecord, WorkflowId};
use aegis_workflow::{WorkflowDefinition, WorkflowExecution};
use async_trait::async_trait;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("execution {0} is terminal and immutable")]
    ExecutionImmutable(ExecutionId),
}

/// Everything the core persists through the admin layer's database.
#[async_trait]
pub trait Repository: Send + Sync + 'static {
    // -- servers --
    async fn list_servers(&self) -> Result<Vec<ServerRecord>, StorageError>;
    async fn get_server(&self, id: &ServerId) -> Result<Option<ServerRecord>, StorageError>;
    async fn upsert_server(&self, record: ServerRecord) -> Result<(), StorageError>;
    async fn delete_server(&self, id: &ServerId) -> Result<(), StorageError>;

    // -- workflows --
    async fn list_workflows(&self, server: &ServerId)
        -> Result<Vec<WorkflowDefinition>, StorageError>;
    async fn get_workflow(&self, id: &WorkflowId)
        -> Result<Option<WorkflowDefinition>, StorageError>;
    async fn save_workflow(&self, definition: WorkflowDefinition) -> Result<(), StorageError>;
    async fn delete_workflow(&self, id: &WorkflowId) -> Result<(), StorageError>;

    // -- executions --
    /// Insert or replace an execution record. Replacing a terminal
    /// record is rejected with [`StorageError::ExecutionImmutable`].
    async fn record_execution(&self, execution: WorkflowExecution) -> Result<(), StorageError>;
    async fn get_execution(
        &self,
        id: &ExecutionId,
    ) -> Result<Option<WorkflowExecution>, StorageError>;
    async fn list_executions(
        &self,
        workflow: &WorkflowId,
        limit: usize,
    ) -> Result<Vec<WorkflowExecution>, StorageError>;

    // -- plugins --
    async fn list_plugin_instances(
        &self,
        server: &ServerId,
    ) -> Result<Vec<PluginInstanceRecord>, StorageError>;
    async fn save_plugin_instance(&self, record: PluginInstanceRecord)
        -> Result<(), StorageError>;
    async fn trusted_keys(&self) -> Result<Vec<TrustedKeyRecord>, StorageError>;

    // -- log offsets --
    async fn load_log_offset(&self, server: &ServerId) -> Result<Option<u64>, StorageError>;
    async fn save_log_offset(&self, server: &ServerId, offset: u64) -> Result<(), StorageError>;

    // -- rcon history --
    async fn record_command(&self, entry: CommandHistoryEntry) -> Result<(), StorageError>;
}
