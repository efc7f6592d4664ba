// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow JSON import/export.
//!
//! Export → import → export is byte-stable modulo map key ordering:
//! step and variable order is preserved via declaration-ordered
//! containers, and exports render with a fixed field order (struct
//! declaration order).

use crate::definition::WorkflowDefinition;
use crate::validate::{validate, ActionSchema, ValidateError};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("workflow JSON is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error(transparent)]
    Invalid(#[from] ValidateError),
}

/// Render a definition as pretty JSON.
pub fn export_json(definition: &WorkflowDefinition) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(definition)
}

/// Parse and validate a definition from JSON.
pub fn import_json(
    raw: &str,
    actions: &HashMap<&'static str, ActionSchema>,
) -> Result<WorkflowDefinition, ImportError> {
    let definition: WorkflowDefinition = serde_json::from_str(raw)?;
    validate(&definition, actions)?;
    Ok(definition)
}

#[cfg(test)]
#[path = "import_tests.rs"]
mod tests;
