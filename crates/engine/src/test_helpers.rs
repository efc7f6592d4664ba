// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared builders for engine tests.

use crate::actions::{ActionContext, ActionRegistry};
use crate::executor::{ExecutionDeps, Executor, ExecutorConfig};
use aegis_cache::{Cache, MemoryBackend, WorkflowKv};
use aegis_core::{ConnectorRegistry, FakeClock};
use aegis_rcon::{CommandOptions, CommandRunner, RconError};
use aegis_storage::MemoryRepository;
use aegis_workflow::{
    ErrorPolicy, Step, StepConfig, Trigger, WorkflowDefinition,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Records commands; optionally fails the first N calls.
pub struct FakeRunner {
    pub commands: Mutex<Vec<String>>,
    pub fail_first: AtomicU32,
}

impl FakeRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            commands: Mutex::new(Vec::new()),
            fail_first: AtomicU32::new(0),
        })
    }

    pub fn failing_first(n: u32) -> Arc<Self> {
        Arc::new(Self {
            commands: Mutex::new(Vec::new()),
            fail_first: AtomicU32::new(n),
        })
    }

    pub fn recorded(&self) -> Vec<String> {
        self.commands.lock().clone()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, command: &str, _options: CommandOptions) -> Result<String, RconError> {
        if self
            .fail_first
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(RconError::Timeout);
        }
        self.commands.lock().push(command.to_string());
        Ok(format!("ok:{command}"))
    }
}

pub struct Harness {
    pub repository: Arc<MemoryRepository>,
    pub runner: Arc<FakeRunner>,
    pub cache: Cache,
    pub connectors: ConnectorRegistry,
    pub actions: Arc<ActionRegistry>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_runner(FakeRunner::new())
    }

    pub fn with_runner(runner: Arc<FakeRunner>) -> Self {
        Self {
            repository: Arc::new(MemoryRepository::new()),
            runner,
            cache: Cache::new(Arc::new(MemoryBackend::with_clock(FakeClock::new()))),
            connectors: ConnectorRegistry::new(),
            actions: Arc::new(ActionRegistry::with_builtins()),
        }
    }

    pub fn context(&self, workflow: &str) -> ActionContext {
        ActionContext {
            server: "srv-1".into(),
            runner: self.runner.clone(),
            kv: WorkflowKv::new(self.cache.clone(), workflow.into()),
            connectors: self.connectors.clone(),
            http: reqwest::Client::new(),
        }
    }

    pub fn executor(&self, workflow: &str) -> Executor {
        self.executor_with_config(workflow, ExecutorConfig::default())
    }

    pub fn executor_with_config(&self, workflow: &str, config: ExecutorConfig) -> Executor {
        Executor::new(
            ExecutionDeps {
                repository: self.repository.clone(),
                actions: self.actions.clone(),
                ctx: self.context(workflow),
            },
            config,
        )
    }
}

pub fn action_step(id: &str, action_type: &str, params: serde_json::Value) -> Step {
    Step {
        id: id.into(),
        name: id.into(),
        enabled: true,
        config: StepConfig::Action {
            action_type: action_type.into(),
            params: params.as_object().cloned().unwrap_or_default(),
        },
        on_error: None,
        next_steps: vec![],
    }
}

pub fn delay_step(id: &str, ms: u64) -> Step {
    Step {
        id: id.into(),
        name: id.into(),
        enabled: true,
        config: StepConfig::Delay { ms },
        on_error: None,
        next_steps: vec![],
    }
}

pub fn definition(id: &str, triggers: Vec<Trigger>, steps: Vec<Step>) -> WorkflowDefinition {
    WorkflowDefinition {
        id: id.into(),
        server_id: "srv-1".into(),
        name: id.into(),
        enabled: true,
        version: 1,
        triggers,
        variables: Default::default(),
        steps,
        error_handling: ErrorPolicy::default(),
    }
}
