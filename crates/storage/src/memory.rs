// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory repository for tests and standalone runs.

use crate::records::{CommandHistoryEntry, PluginInstanceRecord, TrustedKeyRecord};
use crate::repository::{Repository, StorageError};
use aegis_core::{ExecutionId, ServerId, ServerRecord, WorkflowId};
use aegis_workflow::{WorkflowDefinition, WorkflowExecution};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

/// HashMap-backed [`Repository`].
#[derive(Default)]
pub struct MemoryRepository {
    servers: Mutex<HashMap<ServerId, ServerRecord>>,
    workflows: Mutex<HashMap<WorkflowId, WorkflowDefinition>>,
    executions: Mutex<HashMap<ExecutionId, WorkflowExecution>>,
    /// Insertion order per workflow, newest last.
    execution_order: Mutex<Vec<ExecutionId>>,
    plugin_instances: Mutex<HashMap<String, PluginInstanceRecord>>,
    trusted: Mutex<Vec<TrustedKeyRecord>>,
    log_offsets: Mutex<HashMap<ServerId, u64>>,
    command_history: Mutex<Vec<CommandHistoryEntry>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_trusted_key(&self, record: TrustedKeyRecord) {
        self.trusted.lock().push(record);
    }

    /// Recorded RCON commands, oldest first (test inspection).
    pub fn command_history(&self) -> Vec<CommandHistoryEntry> {
        self.command_history.lock().clone()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn list_servers(&self) -> Result<Vec<ServerRecord>, StorageError> {
        let mut servers: Vec<ServerRecord> = self.servers.lock().values().cloned().collect();
        servers.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(servers)
    }

    async fn get_server(&self, id: &ServerId) -> Result<Option<ServerRecord>, StorageError> {
        Ok(self.servers.lock().get(id).cloned())
    }

    async fn upsert_server(&self, record: ServerRecord) -> Result<(), StorageError> {
        self.servers.lock().insert(record.id.clone(), record);
        Ok(())
    }

    async fn delete_server(&self, id: &ServerId) -> Result<(), StorageError> {
        self.servers.lock().remove(id);
        Ok(())
    }

    async fn list_workflows(
        &self,
        server: &ServerId,
    ) -> Result<Vec<WorkflowDefinition>, StorageError> {
        let mut defs: Vec<WorkflowDefinition> = self
            .workflows
            .lock()
            .values()
            .filter(|d| &d.server_id == server)
            .cloned()
            .collect();
        defs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(defs)
    }

    async fn get_workflow(
        &self,
        id: &WorkflowId,
    ) -> Result<Option<WorkflowDefinition>, StorageError> {
        Ok(self.workflows.lock().get(id).cloned())
    }

    async fn save_workflow(&self, definition: WorkflowDefinition) -> Result<(), StorageError> {
        self.workflows
            .lock()
            .insert(definition.id.clone(), definition);
        Ok(())
    }

    async fn delete_workflow(&self, id: &WorkflowId) -> Result<(), StorageError> {
        self.workflows.lock().remove(id);
        Ok(())
    }

    async fn record_execution(&self, execution: WorkflowExecution) -> Result<(), StorageError> {
        let mut executions = self.executions.lock();
        if let Some(existing) = executions.get(&execution.execution_id) {
            if existing.status.is_terminal() {
                return Err(StorageError::ExecutionImmutable(
                    execution.execution_id.clone(),
                ));
            }
        } else {
            self.execution_order
                .lock()
                .push(execution.execution_id.clone());
        }
        executions.insert(execution.execution_id.clone(), execution);
        Ok(())
    }

    async fn get_execution(
        &self,
        id: &ExecutionId,
    ) -> Result<Option<WorkflowExecution>, StorageError> {
        Ok(self.executions.lock().get(id).cloned())
    }

    async fn list_executions(
        &self,
        workflow: &WorkflowId,
        limit: usize,
    ) -> Result<Vec<WorkflowExecution>, StorageError> {
        let executions = self.executions.lock();
        let order = self.execution_order.lock();
        let mut out: Vec<WorkflowExecution> = order
            .iter()
            .rev()
            .filter_map(|id| executions.get(id))
            .filter(|e| &e.workflow_id == workflow)
            .take(limit)
            .cloned()
            .collect();
        out.reverse();
        Ok(out)
    }

    async fn list_plugin_instances(
        &self,
        server: &ServerId,
    ) -> Result<Vec<PluginInstanceRecord>, StorageError> {
        let mut records: Vec<PluginInstanceRecord> = self
            .plugin_instances
            .lock()
            .values()
            .filter(|r| &r.server_id == server)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }

    async fn save_plugin_instance(
        &self,
        record: PluginInstanceRecord,
    ) -> Result<(), StorageError> {
        self.plugin_instances
            .lock()
            .insert(record.id.to_string(), record);
        Ok(())
    }

    async fn trusted_keys(&self) -> Result<Vec<TrustedKeyRecord>, StorageError> {
        Ok(self.trusted.lock().clone())
    }

    async fn load_log_offset(&self, server: &ServerId) -> Result<Option<u64>, StorageError> {
        Ok(self.log_offsets.lock().get(server).copied())
    }

    async fn save_log_offset(&self, server: &ServerId, offset: u64) -> Result<(), StorageError> {
        self.log_offsets.lock().insert(server.clone(), offset);
        Ok(())
    }

    async fn record_command(&self, entry: CommandHistoryEntry) -> Result<(), StorageError> {
        self.command_history.lock().push(entry);
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
