// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plugin lifecycle and event routing for one server.
//!
//! Each instance runs `initialize → start → handle_event* → stop`
//! with its own cancellation context and bus subscription. Handler
//! errors are logged and counted; crossing the threshold moves the
//! instance to `error` and unsubscribes it — other plugins are never
//! affected.

use crate::definition::{PluginDefinition, PluginStatus};
use crate::host::{AdminApi, HostApi, ScopedKv, ServerApi};
use crate::loader::{DynamicLoader, LoaderError};
use crate::monitor::{ResourceLimits, ResourceMonitor, UsageProbe};
use crate::plugin::{Plugin, PluginError, PluginFactory};
use crate::schema::{mask_config, validate_config, SchemaError};
use aegis_cache::Cache;
use aegis_core::{
    ConnectorRegistry, EventBus, PluginInstanceId, ServerId, SubscriptionFilter,
    SubscriptionOptions,
};
use aegis_rcon::CommandRunner;
use aegis_storage::{PluginInstanceRecord, SandboxLimits};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Runtime failures.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("unknown plugin id: {0}")]
    UnknownPlugin(String),

    #[error("plugin {0} does not allow multiple instances")]
    DuplicateInstance(String),

    #[error("plugin {plugin} requires connector {connector}")]
    MissingConnector { plugin: String, connector: String },

    #[error("instance {0} not found")]
    InstanceNotFound(PluginInstanceId),

    #[error("instance {0} references a dynamic artifact but dynamic loading is not enabled")]
    DynamicDisabled(PluginInstanceId),

    #[error(transparent)]
    Loader(#[from] LoaderError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Plugin(#[from] PluginError),
}

/// Consecutive handler errors before an instance is parked in `error`.
const ERROR_THRESHOLD: u32 = 5;

struct InstanceHandle {
    plugin_id: String,
    definition: PluginDefinition,
    status: Arc<Mutex<PluginStatus>>,
    last_error: Arc<Mutex<Option<String>>>,
    cancel: CancellationToken,
    plugin: Arc<tokio::sync::Mutex<Box<dyn Plugin>>>,
    task: Option<tokio::task::JoinHandle<()>>,
    /// Stops the sandbox monitor; set only for dynamic instances.
    monitor_stop: Option<CancellationToken>,
}

/// Where signed artifacts live and how they are verified.
struct DynamicPlugins {
    dir: PathBuf,
    loader: DynamicLoader,
}

/// Per-server plugin runtime.
pub struct PluginRuntime {
    server: ServerId,
    bus: EventBus,
    runner: Arc<dyn CommandRunner>,
    server_api: Arc<dyn ServerApi>,
    connectors: ConnectorRegistry,
    cache: Cache,
    admin: Option<Arc<dyn AdminApi>>,
    factories: Mutex<HashMap<String, PluginFactory>>,
    dynamic: Mutex<Option<DynamicPlugins>>,
    instances: Mutex<HashMap<PluginInstanceId, InstanceHandle>>,
}

impl PluginRuntime {
    pub fn new(
        server: ServerId,
        bus: EventBus,
        runner: Arc<dyn CommandRunner>,
        server_api: Arc<dyn ServerApi>,
        connectors: ConnectorRegistry,
        cache: Cache,
        admin: Option<Arc<dyn AdminApi>>,
    ) -> Self {
        Self {
            server,
            bus,
            runner,
            server_api,
            connectors,
            cache,
            admin,
            factories: Mutex::new(HashMap::new()),
            dynamic: Mutex::new(None),
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Register a built-in plugin constructor.
    pub fn register(&self, plugin_id: impl Into<String>, factory: PluginFactory) {
        self.factories.lock().insert(plugin_id.into(), factory);
    }

    /// Allow dynamic artifacts from `dir`, verified by `loader`.
    pub fn enable_dynamic(&self, dir: PathBuf, loader: DynamicLoader) {
        *self.dynamic.lock() = Some(DynamicPlugins { dir, loader });
    }

    /// Registered plugin ids, sorted (admin surface).
    pub fn available_plugins(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.factories.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Resolve the plugin implementation: a signed artifact when the
    /// record names one, otherwise a registered built-in factory.
    fn resolve_plugin(
        &self,
        record: &PluginInstanceRecord,
    ) -> Result<(Box<dyn Plugin>, Option<Arc<dyn UsageProbe>>), RuntimeError> {
        if let Some(artifact) = &record.artifact {
            let dynamic = self.dynamic.lock();
            let Some(dynamic) = dynamic.as_ref() else {
                return Err(RuntimeError::DynamicDisabled(record.id.clone()));
            };
            let artifact_path = if artifact.is_absolute() {
                artifact.clone()
            } else {
                dynamic.dir.join(artifact)
            };
            let sig_path = PathBuf::from(format!("{}.sig", artifact_path.display()));
            let loaded = dynamic.loader.load(&artifact_path, &sig_path)?;
            return Ok((loaded.plugin, Some(loaded.probe)));
        }
        let factories = self.factories.lock();
        let factory = *factories
            .get(&record.plugin_id)
            .ok_or_else(|| RuntimeError::UnknownPlugin(record.plugin_id.clone()))?;
        Ok((factory(), None))
    }

    /// Create and start an instance from its stored record.
    pub async fn start_instance(&self, record: PluginInstanceRecord) -> Result<(), RuntimeError> {
        let (mut plugin, probe) = self.resolve_plugin(&record)?;
        let definition = plugin.definition();

        if !definition.allow_multiple_instances {
            let instances = self.instances.lock();
            if instances
                .values()
                .any(|h| h.plugin_id == record.plugin_id)
            {
                return Err(RuntimeError::DuplicateInstance(record.plugin_id.clone()));
            }
        }
        for connector in &definition.required_connectors {
            if self.connectors.get(connector).is_none() {
                return Err(RuntimeError::MissingConnector {
                    plugin: record.plugin_id.clone(),
                    connector: connector.clone(),
                });
            }
        }

        let status = Arc::new(Mutex::new(PluginStatus::Stopped));
        let last_error = Arc::new(Mutex::new(None));
        let cancel = CancellationToken::new();

        if !record.enabled {
            *status.lock() = PluginStatus::Disabled;
            self.instances.lock().insert(
                record.id.clone(),
                InstanceHandle {
                    plugin_id: record.plugin_id.clone(),
                    definition,
                    status,
                    last_error,
                    cancel,
                    plugin: Arc::new(tokio::sync::Mutex::new(plugin)),
                    task: None,
                    monitor_stop: None,
                },
            );
            return Ok(());
        }

        let config = validate_config(&definition.config_schema, &record.config)?;
        let host = HostApi::new(
            self.server.clone(),
            Arc::clone(&self.runner),
            Arc::clone(&self.server_api),
            self.connectors.clone(),
            ScopedKv::new(self.cache.clone(), &record.plugin_id),
            self.admin.clone(),
            record.plugin_id.clone(),
        );

        *status.lock() = PluginStatus::Starting;
        if let Err(e) = plugin.initialize(config, host).await {
            *status.lock() = PluginStatus::Error;
            *last_error.lock() = Some(e.to_string());
            return Err(e.into());
        }
        if let Err(e) = plugin.start(cancel.child_token()).await {
            *status.lock() = PluginStatus::Error;
            *last_error.lock() = Some(e.to_string());
            return Err(e.into());
        }

        let plugin = Arc::new(tokio::sync::Mutex::new(plugin));
        let task = if definition.events.is_empty() {
            None
        } else {
            Some(self.spawn_event_loop(
                &record,
                &definition,
                Arc::clone(&plugin),
                Arc::clone(&status),
                Arc::clone(&last_error),
                cancel.clone(),
            ))
        };

        // Dynamic instances run under the sandbox monitor; built-ins
        // are trusted and skip it.
        let monitor_stop = probe.map(|probe| {
            arm_sandbox(
                record.id.clone(),
                resource_limits(record.sandbox.as_ref()),
                probe,
                Arc::clone(&status),
                Arc::clone(&last_error),
                Arc::clone(&plugin),
                cancel.clone(),
            )
        });

        *status.lock() = PluginStatus::Running;
        self.instances.lock().insert(
            record.id.clone(),
            InstanceHandle {
                plugin_id: record.plugin_id.clone(),
                definition,
                status,
                last_error,
                cancel,
                plugin,
                task,
                monitor_stop,
            },
        );
        tracing::info!(server = %self.server, instance = %record.id, plugin = %record.plugin_id, "plugin instance started");
        Ok(())
    }

    fn spawn_event_loop(
        &self,
        record: &PluginInstanceRecord,
        definition: &PluginDefinition,
        plugin: Arc<tokio::sync::Mutex<Box<dyn Plugin>>>,
        status: Arc<Mutex<PluginStatus>>,
        last_error: Arc<Mutex<Option<String>>>,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let mut sub = self.bus.subscribe(
            SubscriptionFilter::server_kinds(
                self.server.clone(),
                definition.events.iter().copied(),
            ),
            SubscriptionOptions {
                policy: if definition.lossless_delivery {
                    aegis_core::OverflowPolicy::Block
                } else {
                    aegis_core::OverflowPolicy::DropOldest
                },
                ..Default::default()
            },
        );
        let instance = record.id.clone();
        tokio::spawn(async move {
            let mut consecutive_errors: u32 = 0;
            loop {
                let event = tokio::select! {
                    _ = cancel.cancelled() => return,
                    event = sub.recv() => match event {
                        Some(event) => event,
                        None => return,
                    },
                };
                let result = {
                    let mut plugin = plugin.lock().await;
                    plugin.handle_event(&event).await
                };
                match result {
                    Ok(()) => consecutive_errors = 0,
                    Err(e) => {
                        consecutive_errors += 1;
                        tracing::warn!(
                            %instance,
                            error = %e,
                            consecutive_errors,
                            "plugin handle_event failed"
                        );
                        *last_error.lock() = Some(e.to_string());
                        if consecutive_errors >= ERROR_THRESHOLD {
                            tracing::error!(
                                %instance,
                                "plugin error threshold crossed, parking instance"
                            );
                            *status.lock() = PluginStatus::Error;
                            cancel.cancel();
                            return;
                        }
                    }
                }
            }
        })
    }

    /// Re-validate and hot-apply a new config.
    pub async fn update_config(
        &self,
        instance: &PluginInstanceId,
        raw: &serde_json::Value,
    ) -> Result<(), RuntimeError> {
        let (plugin, schema) = {
            let instances = self.instances.lock();
            let handle = instances
                .get(instance)
                .ok_or_else(|| RuntimeError::InstanceNotFound(instance.clone()))?;
            (
                Arc::clone(&handle.plugin),
                handle.definition.config_schema.clone(),
            )
        };
        let validated = validate_config(&schema, raw)?;
        plugin.lock().await.update_config(validated).await?;
        Ok(())
    }

    /// Stop one instance with a grace period.
    pub async fn stop_instance(
        &self,
        instance: &PluginInstanceId,
        grace: Duration,
    ) -> Result<(), RuntimeError> {
        let handle = self
            .instances
            .lock()
            .remove(instance)
            .ok_or_else(|| RuntimeError::InstanceNotFound(instance.clone()))?;

        *handle.status.lock() = PluginStatus::Stopping;
        if let Some(monitor_stop) = &handle.monitor_stop {
            monitor_stop.cancel();
        }
        handle.cancel.cancel();
        if let Some(task) = handle.task {
            if tokio::time::timeout(grace, task).await.is_err() {
                tracing::warn!(%instance, "plugin event loop did not drain within grace period");
            }
        }
        if let Err(e) = handle.plugin.lock().await.stop().await {
            tracing::warn!(%instance, error = %e, "plugin stop hook failed");
        }
        *handle.status.lock() = PluginStatus::Stopped;
        Ok(())
    }

    /// Stop everything (server teardown / process shutdown).
    pub async fn shutdown(&self, grace: Duration) {
        let ids: Vec<PluginInstanceId> = self.instances.lock().keys().cloned().collect();
        for id in ids {
            if let Err(e) = self.stop_instance(&id, grace).await {
                tracing::warn!(instance = %id, error = %e, "plugin shutdown failed");
            }
        }
    }

    /// Status and last error of one instance.
    pub fn status(&self, instance: &PluginInstanceId) -> Option<(PluginStatus, Option<String>)> {
        let instances = self.instances.lock();
        instances
            .get(instance)
            .map(|h| (*h.status.lock(), h.last_error.lock().clone()))
    }

    /// Config as exposed to API clients: sensitive fields masked.
    pub fn masked_config(
        &self,
        instance: &PluginInstanceId,
        config: &serde_json::Value,
    ) -> Option<serde_json::Value> {
        let instances = self.instances.lock();
        instances
            .get(instance)
            .map(|h| mask_config(&h.definition.config_schema, config))
    }
}

fn resource_limits(stored: Option<&SandboxLimits>) -> ResourceLimits {
    match stored {
        Some(limits) => ResourceLimits {
            max_memory_mb: limits.max_memory_mb,
            max_tasks: limits.max_tasks,
            cpu_time_limit: Duration::from_secs(limits.cpu_time_limit_secs),
        },
        None => ResourceLimits::default(),
    }
}

/// Start the resource monitor for one dynamic instance and the
/// reaction task that, on violation, parks the instance in `error`,
/// cancels its context, and invokes the shutdown hook.
///
/// The returned token stops the monitor (used on orderly shutdown).
fn arm_sandbox(
    instance: PluginInstanceId,
    limits: ResourceLimits,
    probe: Arc<dyn UsageProbe>,
    status: Arc<Mutex<PluginStatus>>,
    last_error: Arc<Mutex<Option<String>>>,
    plugin: Arc<tokio::sync::Mutex<Box<dyn Plugin>>>,
    cancel: CancellationToken,
) -> CancellationToken {
    let violation = CancellationToken::new();
    let monitor_stop =
        ResourceMonitor::new(limits, probe).spawn(instance.to_string(), violation.clone());

    let stop_monitor = monitor_stop.clone();
    tokio::spawn(async move {
        tokio::select! {
            // Normal stop (or error-threshold parking): nothing to do.
            _ = cancel.cancelled() => {}
            _ = violation.cancelled() => {
                *status.lock() = PluginStatus::Error;
                *last_error.lock() = Some("resource limit violated".into());
                cancel.cancel();
                if let Err(e) = plugin.lock().await.stop().await {
                    tracing::warn!(%instance, error = %e, "shutdown hook failed after violation");
                }
            }
        }
        stop_monitor.cancel();
    });
    monitor_stop
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
