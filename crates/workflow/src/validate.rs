// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Load-time validation of workflow definitions.
//!
//! Rejected documents never reach the scheduler: duplicate or unknown
//! step references, step cycles, bad condition regexes, and action
//! parameters that fail their handler's schema all fail the save.

use crate::condition::CompiledCondition;
use crate::definition::{Step, StepConfig, WorkflowDefinition};
use aegis_core::StepId;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Validation failures.
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error("workflow has no steps")]
    NoSteps,

    #[error("duplicate step id: {0}")]
    DuplicateStep(StepId),

    #[error("step {step} references unknown step {target}")]
    UnknownStepRef { step: StepId, target: StepId },

    #[error("fallback step {target} on {step} does not exist")]
    UnknownFallback { step: StepId, target: StepId },

    #[error("step cycle detected involving {0}")]
    Cycle(StepId),

    #[error("trigger {trigger}: {source}")]
    Condition {
        trigger: String,
        #[source]
        source: crate::condition::ConditionError,
    },

    #[error("step {step}: unknown action type {action_type}")]
    UnknownAction { step: StepId, action_type: String },

    #[error("step {step}: missing required parameter {param}")]
    MissingParam { step: StepId, param: String },

    #[error("step {step}: parameter {param} expects {expected}")]
    ParamType {
        step: StepId,
        param: String,
        expected: &'static str,
    },
}

/// Parameter value shape accepted by an action handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Number,
    Bool,
    Object,
    Any,
}

impl ParamKind {
    fn accepts(&self, value: &Value) -> bool {
        match self {
            // Templated strings may render to anything; numbers also
            // arrive as numeric strings from the admin layer.
            Self::String => value.is_string(),
            Self::Number => {
                value.is_number() || value.as_str().is_some_and(|s| s.contains("{{") || s.trim().parse::<f64>().is_ok())
            }
            Self::Bool => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Any => true,
        }
    }

    fn expected(&self) -> &'static str {
        match self {
            Self::String => "a string",
            Self::Number => "a number",
            Self::Bool => "a boolean",
            Self::Object => "an object",
            Self::Any => "any value",
        }
    }
}

/// One declared handler parameter.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
}

/// Parameter schema an action handler registers at startup.
#[derive(Debug, Clone)]
pub struct ActionSchema {
    pub action_type: &'static str,
    pub params: Vec<ParamSpec>,
}

impl ActionSchema {
    fn check(&self, step: &StepId, params: &serde_json::Map<String, Value>) -> Result<(), ValidateError> {
        for spec in &self.params {
            match params.get(spec.name) {
                None if spec.required => {
                    return Err(ValidateError::MissingParam {
                        step: step.clone(),
                        param: spec.name.to_string(),
                    });
                }
                Some(value) if !spec.kind.accepts(value) => {
                    return Err(ValidateError::ParamType {
                        step: step.clone(),
                        param: spec.name.to_string(),
                        expected: spec.kind.expected(),
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Validate a definition against the registered action schemas.
pub fn validate(
    definition: &WorkflowDefinition,
    actions: &HashMap<&'static str, ActionSchema>,
) -> Result<(), ValidateError> {
    if definition.steps.is_empty() {
        return Err(ValidateError::NoSteps);
    }

    let mut ids = HashSet::new();
    for step in &definition.steps {
        if !ids.insert(step.id.clone()) {
            return Err(ValidateError::DuplicateStep(step.id.clone()));
        }
    }

    for trigger in &definition.triggers {
        CompiledCondition::compile_all(&trigger.conditions).map_err(|source| {
            ValidateError::Condition {
                trigger: trigger.id.to_string(),
                source,
            }
        })?;
    }

    for step in &definition.steps {
        for target in step_successors(step) {
            if !ids.contains(target) {
                return Err(ValidateError::UnknownStepRef {
                    step: step.id.clone(),
                    target: target.clone(),
                });
            }
        }
        if let Some(policy) = &step.on_error {
            if let Some(fallback) = &policy.fallback_step {
                if !ids.contains(fallback) {
                    return Err(ValidateError::UnknownFallback {
                        step: step.id.clone(),
                        target: fallback.clone(),
                    });
                }
            }
        }
        if let StepConfig::Condition { conditions, .. } = &step.config {
            CompiledCondition::compile_all(conditions).map_err(|source| {
                ValidateError::Condition {
                    trigger: step.id.to_string(),
                    source,
                }
            })?;
        }
        if let StepConfig::Action {
            action_type,
            params,
        } = &step.config
        {
            let schema =
                actions
                    .get(action_type.as_str())
                    .ok_or_else(|| ValidateError::UnknownAction {
                        step: step.id.clone(),
                        action_type: action_type.clone(),
                    })?;
            schema.check(&step.id, params)?;
        }
    }

    check_acyclic(definition)
}

/// Explicit successors of a step (declared-order fallthrough is not an
/// edge for cycle purposes — it cannot go backwards).
fn step_successors(step: &Step) -> Vec<&StepId> {
    let mut targets: Vec<&StepId> = step.next_steps.iter().collect();
    if let StepConfig::Condition {
        on_true, on_false, ..
    } = &step.config
    {
        targets.extend(on_true.iter());
        targets.extend(on_false.iter());
    }
    targets
}

/// Depth-first cycle check over explicit edges.
fn check_acyclic(definition: &WorkflowDefinition) -> Result<(), ValidateError> {
    let index: HashMap<&StepId, &Step> =
        definition.steps.iter().map(|s| (&s.id, s)).collect();

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    fn visit<'a>(
        step: &'a Step,
        index: &HashMap<&StepId, &'a Step>,
        marks: &mut HashMap<&'a StepId, Mark>,
    ) -> Result<(), ValidateError> {
        match marks.get(&step.id) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => return Err(ValidateError::Cycle(step.id.clone())),
            None => {}
        }
        marks.insert(&step.id, Mark::Visiting);
        for target in step_successors(step) {
            if let Some(next) = index.get(target) {
                visit(next, index, marks)?;
            }
        }
        marks.insert(&step.id, Mark::Done);
        Ok(())
    }

    let mut marks = HashMap::new();
    for step in &definition.steps {
        visit(step, &index, &mut marks)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
