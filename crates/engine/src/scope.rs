// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution-local variable scope.
//!
//! Seeded from the workflow's variable defaults, with the triggering
//! event view under `event` and prior step results under
//! `steps.<id>.result`. The JSON projection is what templates and
//! condition steps resolve against.

use aegis_core::{path, StepId};
use aegis_workflow::VariableOp;
use serde_json::{Map, Value};

#[derive(Debug, Clone)]
pub struct VariableScope {
    vars: Map<String, Value>,
    event: Value,
    steps: Map<String, Value>,
}

impl VariableScope {
    pub fn new(
        defaults: &indexmap::IndexMap<String, Value>,
        event_view: Value,
    ) -> Self {
        Self {
            vars: defaults
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            event: event_view,
            steps: Map::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.vars.insert(name.to_string(), value);
    }

    /// Apply a `variable` step mutation. `inc`/`dec` coerce both sides
    /// to numbers; non-numeric current values restart from zero.
    pub fn apply(&mut self, name: &str, op: VariableOp, value: &Value) {
        match op {
            VariableOp::Set => {
                self.set(name, value.clone());
            }
            VariableOp::Inc | VariableOp::Dec => {
                let current = self.vars.get(name).and_then(path::as_number).unwrap_or(0.0);
                let delta = path::as_number(value).unwrap_or(0.0);
                let next = if op == VariableOp::Inc {
                    current + delta
                } else {
                    current - delta
                };
                // Keep integers integral so comparisons stay intuitive.
                let next = if next.fract() == 0.0 && next.abs() < i64::MAX as f64 {
                    Value::from(next as i64)
                } else {
                    serde_json::Number::from_f64(next)
                        .map(Value::Number)
                        .unwrap_or(Value::Null)
                };
                self.set(name, next);
            }
            VariableOp::Append => {
                let current = self.vars.get(name).cloned();
                let next = match current {
                    Some(Value::Array(mut items)) => {
                        items.push(value.clone());
                        Value::Array(items)
                    }
                    Some(Value::String(s)) => {
                        Value::String(format!("{s}{}", path::to_display(value)))
                    }
                    Some(other) => Value::Array(vec![other, value.clone()]),
                    None => Value::Array(vec![value.clone()]),
                };
                self.set(name, next);
            }
        }
    }

    pub fn record_step_result(&mut self, step: &StepId, result: Value) {
        let mut entry = Map::new();
        entry.insert("result".to_string(), result);
        self.steps.insert(step.to_string(), Value::Object(entry));
    }

    /// Scope for `{{path}}` interpolation: variables at the top level,
    /// `event` and `steps` as subtrees.
    pub fn template_view(&self) -> Value {
        let mut root = self.vars.clone();
        root.insert("event".to_string(), self.event.clone());
        root.insert("steps".to_string(), Value::Object(self.steps.clone()));
        Value::Object(root)
    }

    /// Scope for condition-step evaluation: like the template view,
    /// but event fields are also merged at the top level so the
    /// trigger-condition path style (`enrichment.teamkill`) and the
    /// `event.`-prefixed style both resolve.
    pub fn condition_view(&self) -> Value {
        let mut root = Map::new();
        if let Value::Object(event_fields) = &self.event {
            for (k, v) in event_fields {
                root.insert(k.clone(), v.clone());
            }
        }
        for (k, v) in &self.vars {
            root.insert(k.clone(), v.clone());
        }
        root.insert("event".to_string(), self.event.clone());
        root.insert("steps".to_string(), Value::Object(self.steps.clone()));
        Value::Object(root)
    }

    /// Final variable state for the execution record.
    pub fn into_variables(self) -> Map<String, Value> {
        self.vars
    }

    pub fn variables(&self) -> &Map<String, Value> {
        &self.vars
    }

    pub fn event(&self) -> &Value {
        &self.event
    }
}

#[cfg(test)]
#[path = "scope_tests.rs"]
mod tests;
