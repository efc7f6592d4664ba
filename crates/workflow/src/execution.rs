// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution records.
//!
//! One record per workflow run. Once a record reaches a terminal
//! status it is immutable; `completed_at` is always at or after
//! `started_at`.

use aegis_core::{ExecutionId, StepId, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
    /// Dropped before starting because the per-workflow concurrency
    /// queue was full.
    Throttled,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Outcome of one step attempt chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResultRecord {
    pub step_id: StepId,
    pub step_name: String,
    pub succeeded: bool,
    /// Total attempts, including the successful one.
    pub attempts: u32,
    /// Rendered action parameters with sensitive values masked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    /// Rendered result, truncated to the per-step bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// One run of a workflow from trigger to terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub execution_id: ExecutionId,
    pub workflow_id: WorkflowId,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// View of the event that matched the trigger.
    pub trigger_event: serde_json::Value,
    /// Final variable scope.
    #[serde(default)]
    pub variables: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub step_results: Vec<StepResultRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkflowExecution {
    pub fn started(
        execution_id: ExecutionId,
        workflow_id: WorkflowId,
        trigger_event: serde_json::Value,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            execution_id,
            workflow_id,
            status: ExecutionStatus::Running,
            started_at,
            completed_at: None,
            trigger_event,
            variables: serde_json::Map::new(),
            step_results: Vec::new(),
            error: None,
        }
    }

    /// Transition to a terminal status, clamping `completed_at` so it
    /// never precedes `started_at`.
    pub fn finish(
        &mut self,
        status: ExecutionStatus,
        completed_at: DateTime<Utc>,
        error: Option<String>,
    ) {
        debug_assert!(status.is_terminal());
        self.status = status;
        self.completed_at = Some(completed_at.max(self.started_at));
        self.error = error;
    }
}
