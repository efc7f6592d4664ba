// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! aegis-plugins: the plugin runtime.
//!
//! Two plugin flavors share one contract: built-ins registered at
//! startup via `define()` constructors, and dynamic artifacts loaded
//! from disk after Ed25519 signature verification. The runtime owns
//! lifecycle (initialize → start → handle_event → stop), typed config
//! validation with sensitive-field masking, per-instance event routing
//! with error thresholds, and the resource monitor for sandboxed
//! instances.

pub mod builtin;
pub mod definition;
pub mod host;
pub mod loader;
pub mod monitor;
pub mod plugin;
pub mod runtime;
pub mod schema;

pub use definition::{PluginDefinition, PluginStatus};
pub use host::{AdminApi, HostApi, ScopedKv, ServerApi};
pub use loader::{DynamicLoader, LoaderError};
pub use monitor::{ResourceLimits, ResourceMonitor, UsageProbe, UsageSample};
pub use plugin::{Plugin, PluginError, PluginFactory};
pub use runtime::{PluginRuntime, RuntimeError};
pub use schema::{ConfigField, FieldType, SchemaError};
