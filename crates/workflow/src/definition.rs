// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow definition model.
//!
//! Definitions arrive as JSON from the admin layer and are immutable
//! per version: every edit bumps `version` and replaces the whole
//! document. Field order here is the export order, so keep struct
//! fields stable.

use aegis_core::{EventKind, ServerId, StepId, TriggerId, WorkflowId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A user-defined, event-triggered automation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: WorkflowId,
    pub server_id: ServerId,
    pub name: String,
    pub enabled: bool,
    pub version: u32,
    pub triggers: Vec<Trigger>,
    /// Variable defaults, in declaration order.
    #[serde(default)]
    pub variables: IndexMap<String, serde_json::Value>,
    pub steps: Vec<Step>,
    #[serde(default)]
    pub error_handling: ErrorPolicy,
}

impl WorkflowDefinition {
    pub fn step(&self, id: &StepId) -> Option<&Step> {
        self.steps.iter().find(|s| &s.id == id)
    }
}

/// Starts an execution when a matching event arrives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub id: TriggerId,
    pub event_type: EventKind,
    #[serde(default)]
    pub conditions: Vec<TriggerCondition>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// One predicate over a dotted path in the event view.
///
/// All conditions in a trigger are ANDed; across triggers, ORed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerCondition {
    pub path: String,
    pub op: ConditionOp,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// Comparison operators for trigger and condition-step predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    Startswith,
    Endswith,
    Regex,
    In,
    Exists,
}

/// One node in the step DAG.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(flatten)]
    pub config: StepConfig,
    /// Overrides the workflow-level error policy for this step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_error: Option<ErrorPolicy>,
    /// Explicit successors. Empty means fall through to the next step
    /// in declared order.
    #[serde(default)]
    pub next_steps: Vec<StepId>,
}

/// Step kind and its kind-specific configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "lowercase")]
pub enum StepConfig {
    Action {
        action_type: String,
        #[serde(default)]
        params: serde_json::Map<String, serde_json::Value>,
    },
    Condition {
        conditions: Vec<TriggerCondition>,
        #[serde(default)]
        on_true: Vec<StepId>,
        #[serde(default)]
        on_false: Vec<StepId>,
    },
    Variable {
        name: String,
        value: serde_json::Value,
        #[serde(default)]
        op: VariableOp,
    },
    Delay {
        ms: u64,
    },
    Lua {
        script: String,
    },
}

impl StepConfig {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Action { .. } => "action",
            Self::Condition { .. } => "condition",
            Self::Variable { .. } => "variable",
            Self::Delay { .. } => "delay",
            Self::Lua { .. } => "lua",
        }
    }
}

/// Mutation applied by a `variable` step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableOp {
    #[default]
    Set,
    Inc,
    Dec,
    Append,
}

/// What to do when a step fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPolicy {
    #[serde(default)]
    pub action: ErrorAction,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_step: Option<StepId>,
}

fn default_retry_delay_ms() -> u64 {
    1000
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        Self {
            action: ErrorAction::default(),
            max_retries: 0,
            retry_delay_ms: default_retry_delay_ms(),
            fallback_step: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorAction {
    #[default]
    Stop,
    Continue,
    Retry,
}

#[cfg(test)]
#[path = "definition_tests.rs"]
mod tests;
