// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! aegis-workflow: workflow definitions and their static semantics.
//!
//! A workflow is an immutable versioned document: triggers (event type
//! + conditions), variables with defaults, and a step DAG. This crate
//! owns the definition model, condition evaluation, `{{path}}`
//! template interpolation, load-time validation, JSON import/export,
//! and the execution record types. Running workflows is the engine
//! crate's job.

pub mod condition;
pub mod definition;
pub mod execution;
pub mod import;
pub mod template;
pub mod validate;

pub use condition::{CompiledCondition, ConditionError};
pub use definition::{
    ConditionOp, ErrorAction, ErrorPolicy, Step, StepConfig, Trigger, TriggerCondition,
    VariableOp, WorkflowDefinition,
};
pub use execution::{ExecutionStatus, StepResultRecord, WorkflowExecution};
pub use import::{export_json, import_json, ImportError};
pub use validate::{validate, ActionSchema, ParamKind, ParamSpec, ValidateError};
