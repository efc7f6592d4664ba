// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Condition evaluation over event views.
//!
//! Missing intermediate nodes make `exists` false and every comparison
//! false (fail-closed). When both sides parse as numbers, comparisons
//! are numeric; otherwise `eq`/`neq` fall back to structural equality
//! and the ordering operators fail closed. Regexes are compiled once
//! at load time, not per event.

use crate::definition::{ConditionOp, TriggerCondition};
use aegis_core::path;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

/// Errors surfaced at compile (load) time.
#[derive(Debug, Error)]
pub enum ConditionError {
    #[error("invalid regex in condition on {path}: {source}")]
    Regex {
        path: String,
        #[source]
        source: regex::Error,
    },

    #[error("regex condition on {path} requires a string value")]
    RegexValueNotString { path: String },
}

/// A condition with its regex (when any) pre-compiled.
#[derive(Debug, Clone)]
pub struct CompiledCondition {
    path: String,
    op: ConditionOp,
    value: Value,
    regex: Option<Regex>,
}

impl CompiledCondition {
    pub fn compile(condition: &TriggerCondition) -> Result<Self, ConditionError> {
        let regex = match condition.op {
            ConditionOp::Regex => {
                let pattern = condition.value.as_str().ok_or_else(|| {
                    ConditionError::RegexValueNotString {
                        path: condition.path.clone(),
                    }
                })?;
                Some(Regex::new(pattern).map_err(|source| ConditionError::Regex {
                    path: condition.path.clone(),
                    source,
                })?)
            }
            _ => None,
        };
        Ok(Self {
            path: condition.path.clone(),
            op: condition.op,
            value: condition.value.clone(),
            regex,
        })
    }

    /// Compile a whole condition list; the list is ANDed at eval time.
    pub fn compile_all(
        conditions: &[TriggerCondition],
    ) -> Result<Vec<CompiledCondition>, ConditionError> {
        conditions.iter().map(Self::compile).collect()
    }

    /// Evaluate against an event view.
    ///
    /// Condition paths address the event payload directly; a leading
    /// `event.` segment is accepted for symmetry with interpolation.
    pub fn matches(&self, view: &Value) -> bool {
        let path_str = self.path.strip_prefix("event.").unwrap_or(&self.path);
        let actual = path::lookup(view, path_str);

        if self.op == ConditionOp::Exists {
            let wanted = self.value.as_bool().unwrap_or(true);
            return actual.is_some() == wanted;
        }

        // Fail closed on missing paths for every comparison.
        let Some(actual) = actual else {
            return false;
        };

        match self.op {
            ConditionOp::Eq => equals(actual, &self.value),
            ConditionOp::Neq => !equals(actual, &self.value),
            ConditionOp::Gt => numeric(actual, &self.value).is_some_and(|(a, b)| a > b),
            ConditionOp::Gte => numeric(actual, &self.value).is_some_and(|(a, b)| a >= b),
            ConditionOp::Lt => numeric(actual, &self.value).is_some_and(|(a, b)| a < b),
            ConditionOp::Lte => numeric(actual, &self.value).is_some_and(|(a, b)| a <= b),
            ConditionOp::Contains => contains(actual, &self.value),
            ConditionOp::Startswith => both_strings(actual, &self.value)
                .is_some_and(|(a, b)| a.starts_with(b)),
            ConditionOp::Endswith => {
                both_strings(actual, &self.value).is_some_and(|(a, b)| a.ends_with(b))
            }
            ConditionOp::Regex => self
                .regex
                .as_ref()
                .is_some_and(|re| re.is_match(&path::to_display(actual))),
            ConditionOp::In => match &self.value {
                Value::Array(items) => items.iter().any(|item| equals(actual, item)),
                _ => false,
            },
            // Handled before the lookup.
            ConditionOp::Exists => false,
        }
    }
}

/// AND over a compiled condition list. An empty list matches.
pub fn all_match(conditions: &[CompiledCondition], view: &Value) -> bool {
    conditions.iter().all(|c| c.matches(view))
}

fn equals(actual: &Value, expected: &Value) -> bool {
    if let Some((a, b)) = numeric(actual, expected) {
        return a == b;
    }
    actual == expected
}

fn numeric(actual: &Value, expected: &Value) -> Option<(f64, f64)> {
    Some((path::as_number(actual)?, path::as_number(expected)?))
}

fn both_strings<'a>(actual: &'a Value, expected: &'a Value) -> Option<(&'a str, &'a str)> {
    Some((actual.as_str()?, expected.as_str()?))
}

fn contains(actual: &Value, expected: &Value) -> bool {
    match actual {
        Value::String(haystack) => expected
            .as_str()
            .map(|needle| haystack.contains(needle))
            .unwrap_or(false),
        Value::Array(items) => items.iter().any(|item| equals(item, expected)),
        _ => false,
    }
}

#[cfg(test)]
#[path = "condition_tests.rs"]
mod tests;
