// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow registry and trigger matching.
//!
//! Loads enabled definitions for one server, compiles their triggers,
//! and indexes them by event kind. The trigger index is rebuilt under
//! an exclusive lock on reload; matching takes the shared lock.
//! Matches spawn executions under a per-workflow concurrency cap with
//! a bounded FIFO overflow queue; beyond that, the run is recorded as
//! `THROTTLED` and dropped.

use crate::actions::{ActionContext, ActionRegistry};
use crate::error::EngineError;
use crate::executor::{ExecutionDeps, Executor, ExecutorConfig};
use aegis_cache::{Cache, WorkflowKv};
use aegis_core::event::Enricher;
use aegis_core::{
    ConnectorRegistry, Event, EventBus, EventKind, ExecutionId, ServerId, SubscriptionFilter,
    SubscriptionOptions, WorkflowId,
};
use aegis_rcon::CommandRunner;
use aegis_storage::Repository;
use aegis_workflow::{
    condition, validate, CompiledCondition, ExecutionStatus, WorkflowDefinition, WorkflowExecution,
};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Scheduler tuning.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub max_concurrent_per_workflow: usize,
    pub overflow_queue_bound: usize,
    pub executor: ExecutorConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_per_workflow: 16,
            overflow_queue_bound: 64,
            executor: ExecutorConfig::default(),
        }
    }
}

struct CompiledTrigger {
    event_type: EventKind,
    conditions: Vec<CompiledCondition>,
}

struct LoadedWorkflow {
    definition: Arc<WorkflowDefinition>,
    triggers: Vec<CompiledTrigger>,
}

#[derive(Default)]
struct WorkflowRuntime {
    running: usize,
    queued: VecDeque<Arc<Event>>,
}

/// Per-server workflow scheduler.
pub struct WorkflowScheduler {
    server: ServerId,
    bus: EventBus,
    repository: Arc<dyn Repository>,
    actions: Arc<ActionRegistry>,
    cache: Cache,
    runner: Arc<dyn CommandRunner>,
    connectors: ConnectorRegistry,
    http: reqwest::Client,
    enricher: Option<Arc<dyn Enricher>>,
    config: SchedulerConfig,
    /// Kind → workflows with at least one trigger on that kind.
    index: RwLock<HashMap<EventKind, Vec<Arc<LoadedWorkflow>>>>,
    runtime: Mutex<HashMap<WorkflowId, WorkflowRuntime>>,
    exec_cancel: CancellationToken,
}

impl WorkflowScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        server: ServerId,
        bus: EventBus,
        repository: Arc<dyn Repository>,
        actions: Arc<ActionRegistry>,
        cache: Cache,
        runner: Arc<dyn CommandRunner>,
        connectors: ConnectorRegistry,
        enricher: Option<Arc<dyn Enricher>>,
        config: SchedulerConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            server,
            bus,
            repository,
            actions,
            cache,
            runner,
            connectors,
            // Redirects are capped for action handlers per policy.
            http: reqwest::Client::builder()
                .redirect(reqwest::redirect::Policy::limited(5))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            enricher,
            config,
            index: RwLock::new(HashMap::new()),
            runtime: Mutex::new(HashMap::new()),
            exec_cancel: CancellationToken::new(),
        })
    }

    /// (Re)load enabled workflow definitions and rebuild the trigger
    /// index. Invalid definitions are skipped with a warning — one bad
    /// workflow must not take down the rest.
    pub async fn reload(&self) -> Result<usize, EngineError> {
        let definitions = self.repository.list_workflows(&self.server).await?;
        let schemas = self.actions.schemas();

        let mut loaded = Vec::new();
        for definition in definitions.into_iter().filter(|d| d.enabled) {
            if let Err(e) = validate(&definition, &schemas) {
                tracing::warn!(workflow = %definition.id, error = %e, "skipping invalid workflow");
                continue;
            }
            let mut triggers = Vec::new();
            for trigger in definition.triggers.iter().filter(|t| t.enabled) {
                // Validation already compiled these once.
                match CompiledCondition::compile_all(&trigger.conditions) {
                    Ok(conditions) => triggers.push(CompiledTrigger {
                        event_type: trigger.event_type,
                        conditions,
                    }),
                    Err(e) => {
                        tracing::warn!(workflow = %definition.id, trigger = %trigger.id, error = %e, "skipping trigger");
                    }
                }
            }
            loaded.push(Arc::new(LoadedWorkflow {
                definition: Arc::new(definition),
                triggers,
            }));
        }

        let mut index: HashMap<EventKind, Vec<Arc<LoadedWorkflow>>> = HashMap::new();
        for workflow in &loaded {
            for trigger in &workflow.triggers {
                index
                    .entry(trigger.event_type)
                    .or_default()
                    .push(Arc::clone(workflow));
            }
        }

        let count = loaded.len();
        *self.index.write() = index;
        tracing::info!(server = %self.server, workflows = count, "workflow index rebuilt");
        Ok(count)
    }

    /// Consume bus events until cancelled.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut sub = self.bus.subscribe(
            SubscriptionFilter::server(self.server.clone()),
            SubscriptionOptions::default(),
        );
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = sub.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            let mut event = (*event).clone();
            if let Some(enricher) = &self.enricher {
                enricher.enrich(&mut event).await;
            }
            self.handle_event(Arc::new(event));
        }
        self.exec_cancel.cancel();
    }

    /// Match one event against the trigger index and start executions.
    pub fn handle_event(self: &Arc<Self>, event: Arc<Event>) {
        let candidates: Vec<Arc<LoadedWorkflow>> = {
            let index = self.index.read();
            index.get(&event.kind()).cloned().unwrap_or_default()
        };
        if candidates.is_empty() {
            return;
        }

        let view = event.view();
        for workflow in candidates {
            // Conditions AND within a trigger; triggers OR per workflow.
            let matched = workflow.triggers.iter().any(|t| {
                t.event_type == event.kind() && condition::all_match(&t.conditions, &view)
            });
            if matched {
                self.try_start(workflow, Arc::clone(&event));
            }
        }
    }

    fn try_start(self: &Arc<Self>, workflow: Arc<LoadedWorkflow>, event: Arc<Event>) {
        let id = workflow.definition.id.clone();
        let mut runtime = self.runtime.lock();
        let entry = runtime.entry(id.clone()).or_default();
        if entry.running < self.config.max_concurrent_per_workflow {
            entry.running += 1;
            drop(runtime);
            self.spawn_execution(workflow, event);
        } else if entry.queued.len() < self.config.overflow_queue_bound {
            entry.queued.push_back(event);
        } else {
            drop(runtime);
            tracing::warn!(workflow = %id, "execution queue full, recording throttled run");
            let scheduler = Arc::clone(self);
            tokio::spawn(async move {
                scheduler.record_throttled(&workflow.definition.id, &event).await;
            });
        }
    }

    fn spawn_execution(self: &Arc<Self>, workflow: Arc<LoadedWorkflow>, event: Arc<Event>) {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let executor = scheduler.executor_for(&workflow.definition.id);
            let cancel = scheduler.exec_cancel.child_token();
            executor
                .run(Arc::clone(&workflow.definition), &event, cancel)
                .await;
            scheduler.finish_one(workflow);
        });
    }

    fn finish_one(self: &Arc<Self>, workflow: Arc<LoadedWorkflow>) {
        let next = {
            let mut runtime = self.runtime.lock();
            let entry = runtime.entry(workflow.definition.id.clone()).or_default();
            match entry.queued.pop_front() {
                Some(event) => Some(event),
                None => {
                    entry.running = entry.running.saturating_sub(1);
                    None
                }
            }
        };
        if let Some(event) = next {
            self.spawn_execution(workflow, event);
        }
    }

    /// Manual execution entry point (admin API). Bypasses trigger
    /// matching and the concurrency cap; runs to completion.
    pub async fn execute_now(
        &self,
        workflow_id: &WorkflowId,
        event: &Event,
    ) -> Result<WorkflowExecution, EngineError> {
        let definition = self
            .repository
            .get_workflow(workflow_id)
            .await?
            .ok_or_else(|| EngineError::WorkflowNotFound(workflow_id.clone()))?;
        validate(&definition, &self.actions.schemas())?;
        let executor = self.executor_for(workflow_id);
        Ok(executor
            .run(
                Arc::new(definition),
                event,
                self.exec_cancel.child_token(),
            )
            .await)
    }

    fn executor_for(&self, workflow_id: &WorkflowId) -> Executor {
        Executor::new(
            ExecutionDeps {
                repository: Arc::clone(&self.repository),
                actions: Arc::clone(&self.actions),
                ctx: ActionContext {
                    server: self.server.clone(),
                    runner: Arc::clone(&self.runner),
                    kv: WorkflowKv::new(self.cache.clone(), workflow_id.clone()),
                    connectors: self.connectors.clone(),
                    http: self.http.clone(),
                },
            },
            self.config.executor.clone(),
        )
    }

    async fn record_throttled(&self, workflow_id: &WorkflowId, event: &Event) {
        let mut record = WorkflowExecution::started(
            ExecutionId::generate(),
            workflow_id.clone(),
            event.view(),
            Utc::now(),
        );
        record.finish(
            ExecutionStatus::Throttled,
            Utc::now(),
            Some("concurrency cap and overflow queue exhausted".into()),
        );
        if let Err(e) = self.repository.record_execution(record).await {
            tracing::warn!(error = %e, "failed to record throttled execution");
        }
    }

    /// Number of currently running executions (health surface).
    pub fn running_executions(&self) -> usize {
        self.runtime.lock().values().map(|r| r.running).sum()
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
