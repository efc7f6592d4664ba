// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow execution.
//!
//! One executor run owns one execution: the variable scope, the step
//! worklist, per-step retry policy, cancellation, and persistence of
//! the execution record at every step boundary (crash-recovery
//! friendly) plus once at the terminal state.

use crate::actions::{ActionContext, ActionRegistry};
use crate::error::ActionError;
use crate::lua::{run_script, LuaContext, LuaLimits};
use crate::scope::VariableScope;
use aegis_core::{Event, ExecutionId, StepId};
use aegis_storage::Repository;
use aegis_workflow::{
    condition, CompiledCondition, ErrorAction, ExecutionStatus, Step, StepConfig,
    StepResultRecord, WorkflowDefinition, WorkflowExecution,
};
use chrono::Utc;
use rand::Rng;
use serde_json::{Map, Value};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Executor tuning.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Whole-execution wall-clock budget.
    pub wall_clock_budget: Duration,
    /// Per-step recorded result bound.
    pub max_step_result_bytes: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            wall_clock_budget: Duration::from_secs(300),
            max_step_result_bytes: 64 * 1024,
        }
    }
}

/// Shared dependencies for running executions.
#[derive(Clone)]
pub struct ExecutionDeps {
    pub repository: Arc<dyn Repository>,
    pub actions: Arc<ActionRegistry>,
    pub ctx: ActionContext,
}

pub struct Executor {
    deps: ExecutionDeps,
    config: ExecutorConfig,
}

enum StepOutcome {
    /// Result plus explicit successors (condition branches). `None`
    /// successors means declared-order fallthrough applies.
    Done {
        result: Option<Value>,
        successors: Option<Vec<StepId>>,
    },
    Cancelled,
}

impl Executor {
    pub fn new(deps: ExecutionDeps, config: ExecutorConfig) -> Self {
        Self { deps, config }
    }

    /// Run one execution to a terminal state and return the record.
    pub async fn run(
        &self,
        definition: Arc<WorkflowDefinition>,
        event: &Event,
        cancel: CancellationToken,
    ) -> WorkflowExecution {
        let execution_id = ExecutionId::generate();
        let span = tracing::info_span!(
            "execution",
            workflow = %definition.id,
            execution = %execution_id
        );
        let _guard = span.enter();

        let mut execution = WorkflowExecution::started(
            execution_id,
            definition.id.clone(),
            event.view(),
            Utc::now(),
        );
        let mut scope = VariableScope::new(&definition.variables, event.view());
        self.persist(&execution, &scope).await;

        // The budget watchdog cancels the same token external stops use.
        let exec_cancel = cancel.child_token();
        let watchdog = {
            let exec_cancel = exec_cancel.clone();
            let budget = self.config.wall_clock_budget;
            tokio::spawn(async move {
                tokio::select! {
                    _ = exec_cancel.cancelled() => {}
                    _ = tokio::time::sleep(budget) => exec_cancel.cancel(),
                }
            })
        };

        let status = self
            .run_steps(&definition, &mut execution, &mut scope, &exec_cancel)
            .await;

        watchdog.abort();
        let error = execution.error.clone();
        execution.finish(status, Utc::now(), error);
        execution.variables = scope.into_variables();
        self.deps
            .repository
            .record_execution(execution.clone())
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to persist terminal execution");
            });
        tracing::info!(status = ?execution.status, "execution finished");
        execution
    }

    async fn run_steps(
        &self,
        definition: &WorkflowDefinition,
        execution: &mut WorkflowExecution,
        scope: &mut VariableScope,
        cancel: &CancellationToken,
    ) -> ExecutionStatus {
        let mut queue: VecDeque<StepId> = VecDeque::new();
        if let Some(first) = definition.steps.first() {
            queue.push_back(first.id.clone());
        }
        let mut executed: HashSet<StepId> = HashSet::new();

        while let Some(step_id) = queue.pop_front() {
            if cancel.is_cancelled() {
                return ExecutionStatus::Cancelled;
            }
            if executed.contains(&step_id) {
                continue;
            }
            let Some(step) = definition.step(&step_id) else {
                // Unreachable after validation; fail loudly if it happens.
                execution.error = Some(format!("step {step_id} vanished from definition"));
                return ExecutionStatus::Failed;
            };
            executed.insert(step_id.clone());

            if !step.enabled {
                enqueue(&mut queue, fallthrough(definition, step));
                continue;
            }

            let policy = step
                .on_error
                .clone()
                .unwrap_or_else(|| definition.error_handling.clone());
            let started_at = Utc::now();
            let mut attempts: u32 = 0;
            let rendered_params = self.rendered_params(step, scope);

            let outcome = loop {
                attempts += 1;
                match self.run_step(step, scope, cancel).await {
                    Ok(outcome) => break Ok(outcome),
                    Err(e) => {
                        if cancel.is_cancelled() {
                            break Ok(StepOutcome::Cancelled);
                        }
                        let retries_left = policy.action == ErrorAction::Retry
                            && attempts <= policy.max_retries;
                        if retries_left {
                            tracing::debug!(
                                step = %step.id,
                                attempt = attempts,
                                error = %e,
                                "step failed, retrying"
                            );
                            tokio::select! {
                                _ = cancel.cancelled() => break Ok(StepOutcome::Cancelled),
                                _ = tokio::time::sleep(retry_delay(policy.retry_delay_ms, attempts - 1)) => {}
                            }
                            continue;
                        }
                        break Err(e);
                    }
                }
            };

            match outcome {
                Ok(StepOutcome::Cancelled) => return ExecutionStatus::Cancelled,
                Ok(StepOutcome::Done { result, successors }) => {
                    let bounded = result.map(|r| self.bound_result(r));
                    if let Some(result) = &bounded {
                        scope.record_step_result(&step.id, result.clone());
                    }
                    execution.step_results.push(StepResultRecord {
                        step_id: step.id.clone(),
                        step_name: step.name.clone(),
                        succeeded: true,
                        attempts,
                        params: rendered_params,
                        result: bounded,
                        error: None,
                        started_at,
                        completed_at: Utc::now(),
                    });
                    self.persist(execution, scope).await;
                    match successors {
                        Some(explicit) => enqueue(&mut queue, explicit),
                        None => enqueue(&mut queue, fallthrough(definition, step)),
                    }
                }
                Err(error) => {
                    execution.step_results.push(StepResultRecord {
                        step_id: step.id.clone(),
                        step_name: step.name.clone(),
                        succeeded: false,
                        attempts,
                        params: rendered_params,
                        result: None,
                        error: Some(error.to_string()),
                        started_at,
                        completed_at: Utc::now(),
                    });
                    self.persist(execution, scope).await;

                    if let Some(fallback) = &policy.fallback_step {
                        tracing::debug!(step = %step.id, fallback = %fallback, "jumping to fallback step");
                        queue.clear();
                        queue.push_back(fallback.clone());
                        continue;
                    }
                    match policy.action {
                        ErrorAction::Continue => {
                            tracing::debug!(step = %step.id, error = %error, "continuing past failed step");
                            enqueue(&mut queue, fallthrough(definition, step));
                        }
                        ErrorAction::Stop | ErrorAction::Retry => {
                            execution.error =
                                Some(format!("step {} failed: {error}", step.id));
                            return ExecutionStatus::Failed;
                        }
                    }
                }
            }
        }

        ExecutionStatus::Completed
    }

    async fn run_step(
        &self,
        step: &Step,
        scope: &mut VariableScope,
        cancel: &CancellationToken,
    ) -> Result<StepOutcome, ActionError> {
        match &step.config {
            StepConfig::Action {
                action_type,
                params,
            } => {
                let handler = self.deps.actions.get(action_type).ok_or_else(|| {
                    ActionError::InvalidParam("action_type", format!("unknown: {action_type}"))
                })?;
                let rendered = render_params(params, scope);
                let result = handler.execute(&self.deps.ctx, &rendered, scope).await?;
                Ok(StepOutcome::Done {
                    result: Some(result),
                    successors: None,
                })
            }

            StepConfig::Condition {
                conditions,
                on_true,
                on_false,
            } => {
                let compiled = CompiledCondition::compile_all(conditions)
                    .map_err(|e| ActionError::InvalidParam("conditions", e.to_string()))?;
                let matched = condition::all_match(&compiled, &scope.condition_view());
                let branch = if matched { on_true } else { on_false };
                Ok(StepOutcome::Done {
                    result: Some(Value::Bool(matched)),
                    successors: Some(branch.clone()),
                })
            }

            StepConfig::Variable { name, value, op } => {
                let rendered =
                    aegis_workflow::template::interpolate_value(value, &scope.template_view());
                scope.apply(name, *op, &rendered);
                Ok(StepOutcome::Done {
                    result: Some(rendered),
                    successors: None,
                })
            }

            StepConfig::Delay { ms } => {
                tokio::select! {
                    _ = cancel.cancelled() => Ok(StepOutcome::Cancelled),
                    _ = tokio::time::sleep(Duration::from_millis(*ms)) => Ok(StepOutcome::Done {
                        result: None,
                        successors: None,
                    }),
                }
            }

            StepConfig::Lua { script } => {
                let outcome = run_script(
                    script.clone(),
                    LuaContext {
                        vars: Value::Object(scope.variables().clone()),
                        event: scope.event().clone(),
                        kv: self.deps.ctx.kv.clone(),
                        runner: Arc::clone(&self.deps.ctx.runner),
                        http: self.deps.ctx.http.clone(),
                    },
                    LuaLimits::default(),
                )
                .await?;
                for (name, value) in outcome.var_sets {
                    scope.set(&name, value);
                }
                Ok(StepOutcome::Done {
                    result: Some(outcome.result),
                    successors: None,
                })
            }
        }
    }

    fn rendered_params(&self, step: &Step, scope: &VariableScope) -> Option<Value> {
        match &step.config {
            StepConfig::Action { params, .. } => {
                Some(mask_sensitive(Value::Object(render_params(params, scope))))
            }
            _ => None,
        }
    }

    fn bound_result(&self, result: Value) -> Value {
        let serialized = result.to_string();
        if serialized.len() <= self.config.max_step_result_bytes {
            return result;
        }
        let mut truncated: String = serialized
            .chars()
            .take(self.config.max_step_result_bytes / 2)
            .collect();
        truncated.push_str("…(truncated)");
        Value::String(truncated)
    }

    async fn persist(&self, execution: &WorkflowExecution, scope: &VariableScope) {
        let mut snapshot = execution.clone();
        snapshot.variables = scope.variables().clone();
        if let Err(e) = self.deps.repository.record_execution(snapshot).await {
            tracing::warn!(error = %e, "failed to persist execution snapshot");
        }
    }
}

fn render_params(params: &Map<String, Value>, scope: &VariableScope) -> Map<String, Value> {
    let view = scope.template_view();
    params
        .iter()
        .map(|(k, v)| (k.clone(), aegis_workflow::template::interpolate_value(v, &view)))
        .collect()
}

/// Successors when a step declares none: the next step in declared
/// order.
fn fallthrough(definition: &WorkflowDefinition, step: &Step) -> Vec<StepId> {
    if !step.next_steps.is_empty() {
        return step.next_steps.clone();
    }
    definition
        .steps
        .iter()
        .skip_while(|s| s.id != step.id)
        .nth(1)
        .map(|s| vec![s.id.clone()])
        .unwrap_or_default()
}

fn enqueue(queue: &mut VecDeque<StepId>, successors: Vec<StepId>) {
    for id in successors {
        queue.push_back(id);
    }
}

/// `retry_delay_ms * 2^n`, jittered downward so the cap holds.
fn retry_delay(base_ms: u64, attempt: u32) -> Duration {
    let cap = base_ms.saturating_mul(2u64.saturating_pow(attempt.min(16)));
    let factor = rand::rng().random_range(0.8..=1.0);
    Duration::from_millis((cap as f64 * factor) as u64)
}

/// Mask values whose key looks credential-shaped.
fn mask_sensitive(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| {
                    let lowered = k.to_lowercase();
                    let sensitive = ["password", "secret", "token", "api_key", "apikey"]
                        .iter()
                        .any(|m| lowered.contains(m));
                    if sensitive {
                        (k, Value::String("***".into()))
                    } else {
                        (k, mask_sensitive(v))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(mask_sensitive).collect()),
        other => other,
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
