// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared outbound connectors.
//!
//! Long-lived integration clients (chat relays, webhooks with state)
//! registered once and shared by plugins and workflow actions.
//! Lifecycles are independent of any single consumer; `Arc` reference
//! counting keeps a connector alive until its last user drops it.

use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Connector errors
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("connector {0} not registered")]
    NotFound(String),

    #[error("connector {0} does not accept messages")]
    Unsupported(String),

    #[error("connector send failed: {0}")]
    Send(String),
}

/// A shared outbound integration.
///
/// `send` covers the common fire-a-payload case; richer interfaces are
/// reached by downcasting `as_any` to the concrete type.
#[async_trait::async_trait]
pub trait Connector: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn as_any(&self) -> &dyn Any;

    async fn send(&self, _payload: serde_json::Value) -> Result<(), ConnectorError> {
        Err(ConnectorError::Unsupported(self.name().to_string()))
    }
}

/// Name → connector map.
#[derive(Default, Clone)]
pub struct ConnectorRegistry {
    inner: Arc<RwLock<HashMap<String, Arc<dyn Connector>>>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, connector: Arc<dyn Connector>) {
        self.inner
            .write()
            .insert(connector.name().to_string(), connector);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Connector>> {
        self.inner.read().get(name).cloned()
    }

    pub fn remove(&self, name: &str) -> Option<Arc<dyn Connector>> {
        self.inner.write().remove(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.read().keys().cloned().collect();
        names.sort();
        names
    }
}
