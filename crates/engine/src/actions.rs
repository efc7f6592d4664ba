// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named action handlers.
//!
//! Handlers are registered once at startup; the registry's schemas
//! feed workflow validation so a bad config never reaches execution.
//! Parameters arrive already rendered (templates resolved) and are
//! recorded in history with sensitive values masked.

use crate::error::ActionError;
use crate::lua::{run_script, LuaContext, LuaLimits};
use crate::scope::VariableScope;
use aegis_cache::WorkflowKv;
use aegis_core::{ConnectorRegistry, ServerId};
use aegis_rcon::{CommandOptions, CommandRunner};
use aegis_workflow::{ActionSchema, ParamKind, ParamSpec};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Everything a handler may touch.
#[derive(Clone)]
pub struct ActionContext {
    pub server: ServerId,
    pub runner: Arc<dyn CommandRunner>,
    pub kv: WorkflowKv,
    pub connectors: ConnectorRegistry,
    pub http: reqwest::Client,
}

#[async_trait]
pub trait ActionHandler: Send + Sync + 'static {
    fn schema(&self) -> ActionSchema;

    async fn execute(
        &self,
        ctx: &ActionContext,
        params: &Map<String, Value>,
        scope: &mut VariableScope,
    ) -> Result<Value, ActionError>;
}

/// Handler registry, keyed by action type.
pub struct ActionRegistry {
    handlers: HashMap<&'static str, Arc<dyn ActionHandler>>,
}

impl ActionRegistry {
    /// Registry with every built-in handler.
    pub fn with_builtins() -> Self {
        let mut handlers: HashMap<&'static str, Arc<dyn ActionHandler>> = HashMap::new();
        let list: Vec<Arc<dyn ActionHandler>> = vec![
            Arc::new(RconCommand),
            Arc::new(AdminBroadcast),
            Arc::new(ChatMessage),
            Arc::new(KickPlayer),
            Arc::new(BanPlayer),
            Arc::new(BanPlayerWithEvidence),
            Arc::new(WarnPlayer),
            Arc::new(SetFogOfWar),
            Arc::new(HttpRequest),
            Arc::new(Webhook),
            Arc::new(LogMessage),
            Arc::new(SetVariable),
            Arc::new(LuaScript),
            Arc::new(ConnectorSend),
        ];
        for handler in list {
            handlers.insert(handler.schema().action_type, handler);
        }
        Self { handlers }
    }

    pub fn get(&self, action_type: &str) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.get(action_type).cloned()
    }

    /// Schemas for save-time validation.
    pub fn schemas(&self) -> HashMap<&'static str, ActionSchema> {
        self.handlers
            .iter()
            .map(|(name, handler)| (*name, handler.schema()))
            .collect()
    }
}

fn require_str<'a>(
    params: &'a Map<String, Value>,
    name: &'static str,
) -> Result<&'a str, ActionError> {
    params
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| ActionError::InvalidParam(name, "missing or not a string".into()))
}

fn opt_str<'a>(params: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
    params.get(name).and_then(Value::as_str)
}

async fn run_rcon(ctx: &ActionContext, command: String) -> Result<Value, ActionError> {
    let body = ctx
        .runner
        .run(
            &command,
            CommandOptions {
                suppress_empty_response: true,
                ..Default::default()
            },
        )
        .await?;
    Ok(Value::String(body))
}

// -- rcon_command --

struct RconCommand;

#[async_trait]
impl ActionHandler for RconCommand {
    fn schema(&self) -> ActionSchema {
        ActionSchema {
            action_type: "rcon_command",
            params: vec![ParamSpec {
                name: "command",
                kind: ParamKind::String,
                required: true,
            }],
        }
    }

    async fn execute(
        &self,
        ctx: &ActionContext,
        params: &Map<String, Value>,
        _scope: &mut VariableScope,
    ) -> Result<Value, ActionError> {
        run_rcon(ctx, require_str(params, "command")?.to_string()).await
    }
}

// -- admin_broadcast --

struct AdminBroadcast;

#[async_trait]
impl ActionHandler for AdminBroadcast {
    fn schema(&self) -> ActionSchema {
        ActionSchema {
            action_type: "admin_broadcast",
            params: vec![ParamSpec {
                name: "message",
                kind: ParamKind::String,
                required: true,
            }],
        }
    }

    async fn execute(
        &self,
        ctx: &ActionContext,
        params: &Map<String, Value>,
        _scope: &mut VariableScope,
    ) -> Result<Value, ActionError> {
        let message = require_str(params, "message")?;
        run_rcon(ctx, format!("AdminBroadcast {message}")).await
    }
}

// -- chat_message (admin chat) --

struct ChatMessage;

#[async_trait]
impl ActionHandler for ChatMessage {
    fn schema(&self) -> ActionSchema {
        ActionSchema {
            action_type: "chat_message",
            params: vec![ParamSpec {
                name: "message",
                kind: ParamKind::String,
                required: true,
            }],
        }
    }

    async fn execute(
        &self,
        ctx: &ActionContext,
        params: &Map<String, Value>,
        _scope: &mut VariableScope,
    ) -> Result<Value, ActionError> {
        let message = require_str(params, "message")?;
        run_rcon(ctx, format!("ChatToAdmin {message}")).await
    }
}

// -- kick_player --

struct KickPlayer;

#[async_trait]
impl ActionHandler for KickPlayer {
    fn schema(&self) -> ActionSchema {
        ActionSchema {
            action_type: "kick_player",
            params: vec![
                ParamSpec {
                    name: "player",
                    kind: ParamKind::String,
                    required: true,
                },
                ParamSpec {
                    name: "reason",
                    kind: ParamKind::String,
                    required: false,
                },
            ],
        }
    }

    async fn execute(
        &self,
        ctx: &ActionContext,
        params: &Map<String, Value>,
        _scope: &mut VariableScope,
    ) -> Result<Value, ActionError> {
        let player = require_str(params, "player")?;
        let reason = opt_str(params, "reason").unwrap_or("Kicked by automation");
        run_rcon(ctx, format!("AdminKick \"{player}\" {reason}")).await
    }
}

// -- ban_player --

struct BanPlayer;

#[async_trait]
impl ActionHandler for BanPlayer {
    fn schema(&self) -> ActionSchema {
        ActionSchema {
            action_type: "ban_player",
            params: vec![
                ParamSpec {
                    name: "player",
                    kind: ParamKind::String,
                    required: true,
                },
                ParamSpec {
                    name: "length",
                    kind: ParamKind::String,
                    required: false,
                },
                ParamSpec {
                    name: "reason",
                    kind: ParamKind::String,
                    required: false,
                },
            ],
        }
    }

    async fn execute(
        &self,
        ctx: &ActionContext,
        params: &Map<String, Value>,
        _scope: &mut VariableScope,
    ) -> Result<Value, ActionError> {
        let player = require_str(params, "player")?;
        let length = opt_str(params, "length").unwrap_or("0");
        let reason = opt_str(params, "reason").unwrap_or("Banned by automation");
        run_rcon(ctx, format!("AdminBan \"{player}\" {length} {reason}")).await
    }
}

// -- ban_player_with_evidence --

struct BanPlayerWithEvidence;

#[async_trait]
impl ActionHandler for BanPlayerWithEvidence {
    fn schema(&self) -> ActionSchema {
        ActionSchema {
            action_type: "ban_player_with_evidence",
            params: vec![
                ParamSpec {
                    name: "player",
                    kind: ParamKind::String,
                    required: true,
                },
                ParamSpec {
                    name: "evidence",
                    kind: ParamKind::String,
                    required: true,
                },
                ParamSpec {
                    name: "length",
                    kind: ParamKind::String,
                    required: false,
                },
                ParamSpec {
                    name: "reason",
                    kind: ParamKind::String,
                    required: false,
                },
            ],
        }
    }

    async fn execute(
        &self,
        ctx: &ActionContext,
        params: &Map<String, Value>,
        _scope: &mut VariableScope,
    ) -> Result<Value, ActionError> {
        let player = require_str(params, "player")?;
        let evidence = require_str(params, "evidence")?;
        let length = opt_str(params, "length").unwrap_or("0");
        let reason = opt_str(params, "reason").unwrap_or("Banned by automation");

        let body = run_rcon(ctx, format!("AdminBan \"{player}\" {length} {reason}")).await?;
        // Evidence rides along in the workflow's KV for the audit trail.
        ctx.kv
            .set(
                &format!("ban-evidence:{player}"),
                &json!({"evidence": evidence, "reason": reason, "length": length}),
                None,
            )
            .await?;
        Ok(json!({"response": body, "evidence": evidence}))
    }
}

// -- warn_player --

struct WarnPlayer;

#[async_trait]
impl ActionHandler for WarnPlayer {
    fn schema(&self) -> ActionSchema {
        ActionSchema {
            action_type: "warn_player",
            params: vec![
                ParamSpec {
                    name: "player",
                    kind: ParamKind::String,
                    required: true,
                },
                ParamSpec {
                    name: "message",
                    kind: ParamKind::String,
                    required: true,
                },
            ],
        }
    }

    async fn execute(
        &self,
        ctx: &ActionContext,
        params: &Map<String, Value>,
        _scope: &mut VariableScope,
    ) -> Result<Value, ActionError> {
        let player = require_str(params, "player")?;
        let message = require_str(params, "message")?;
        run_rcon(ctx, format!("AdminWarn \"{player}\" {message}")).await
    }
}

// -- set_fog_of_war --

struct SetFogOfWar;

#[async_trait]
impl ActionHandler for SetFogOfWar {
    fn schema(&self) -> ActionSchema {
        ActionSchema {
            action_type: "set_fog_of_war",
            params: vec![ParamSpec {
                name: "mode",
                kind: ParamKind::Number,
                required: true,
            }],
        }
    }

    async fn execute(
        &self,
        ctx: &ActionContext,
        params: &Map<String, Value>,
        _scope: &mut VariableScope,
    ) -> Result<Value, ActionError> {
        let mode = params
            .get("mode")
            .and_then(aegis_core::path::as_number)
            .ok_or_else(|| ActionError::InvalidParam("mode", "not a number".into()))?;
        run_rcon(ctx, format!("AdminSetFogOfWar {}", mode as i64)).await
    }
}

// -- http_request --

/// Hard cap regardless of configured timeout.
const HTTP_TIMEOUT_CAP: Duration = Duration::from_secs(30);

struct HttpRequest;

#[async_trait]
impl ActionHandler for HttpRequest {
    fn schema(&self) -> ActionSchema {
        ActionSchema {
            action_type: "http_request",
            params: vec![
                ParamSpec {
                    name: "url",
                    kind: ParamKind::String,
                    required: true,
                },
                ParamSpec {
                    name: "method",
                    kind: ParamKind::String,
                    required: false,
                },
                ParamSpec {
                    name: "headers",
                    kind: ParamKind::Object,
                    required: false,
                },
                ParamSpec {
                    name: "body",
                    kind: ParamKind::Any,
                    required: false,
                },
                ParamSpec {
                    name: "timeout_ms",
                    kind: ParamKind::Number,
                    required: false,
                },
            ],
        }
    }

    async fn execute(
        &self,
        ctx: &ActionContext,
        params: &Map<String, Value>,
        _scope: &mut VariableScope,
    ) -> Result<Value, ActionError> {
        let url = require_str(params, "url")?;
        let method = opt_str(params, "method").unwrap_or("GET").to_uppercase();
        let timeout = params
            .get("timeout_ms")
            .and_then(aegis_core::path::as_number)
            .map(|ms| Duration::from_millis(ms as u64))
            .unwrap_or(HTTP_TIMEOUT_CAP)
            .min(HTTP_TIMEOUT_CAP);

        let method = reqwest::Method::from_bytes(method.as_bytes())
            .map_err(|_| ActionError::InvalidParam("method", "unknown HTTP method".into()))?;
        let mut request = ctx.http.request(method, url).timeout(timeout);
        if let Some(Value::Object(headers)) = params.get("headers") {
            for (name, value) in headers {
                if let Some(value) = value.as_str() {
                    request = request.header(name, value);
                }
            }
        }
        if let Some(body) = params.get("body") {
            request = match body {
                Value::String(raw) => request.body(raw.clone()),
                other => request.json(other),
            };
        }

        let response = request
            .send()
            .await
            .map_err(|e| ActionError::Http(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ActionError::Http(e.to_string()))?;
        Ok(json!({"status": status, "body": body}))
    }
}

// -- webhook --

const WEBHOOK_RETRIES: u32 = 3;

struct Webhook;

#[async_trait]
impl ActionHandler for Webhook {
    fn schema(&self) -> ActionSchema {
        ActionSchema {
            action_type: "webhook",
            params: vec![
                ParamSpec {
                    name: "url",
                    kind: ParamKind::String,
                    required: true,
                },
                ParamSpec {
                    name: "payload",
                    kind: ParamKind::Any,
                    required: true,
                },
            ],
        }
    }

    async fn execute(
        &self,
        ctx: &ActionContext,
        params: &Map<String, Value>,
        _scope: &mut VariableScope,
    ) -> Result<Value, ActionError> {
        let url = require_str(params, "url")?;
        let payload = params
            .get("payload")
            .ok_or_else(|| ActionError::InvalidParam("payload", "missing".into()))?;

        let mut last_error = String::new();
        for attempt in 1..=WEBHOOK_RETRIES {
            let response = ctx
                .http
                .post(url)
                .timeout(HTTP_TIMEOUT_CAP)
                .json(payload)
                .send()
                .await;
            match response {
                Ok(response) if response.status().is_server_error() => {
                    last_error = format!("server error {}", response.status());
                }
                Ok(response) => {
                    return Ok(json!({"status": response.status().as_u16()}));
                }
                Err(e) => last_error = e.to_string(),
            }
            if attempt < WEBHOOK_RETRIES {
                tokio::time::sleep(Duration::from_millis(200 * attempt as u64)).await;
            }
        }
        Err(ActionError::Http(format!(
            "webhook failed after {WEBHOOK_RETRIES} attempts: {last_error}"
        )))
    }
}

// -- log_message --

struct LogMessage;

#[async_trait]
impl ActionHandler for LogMessage {
    fn schema(&self) -> ActionSchema {
        ActionSchema {
            action_type: "log_message",
            params: vec![
                ParamSpec {
                    name: "message",
                    kind: ParamKind::String,
                    required: true,
                },
                ParamSpec {
                    name: "level",
                    kind: ParamKind::String,
                    required: false,
                },
            ],
        }
    }

    async fn execute(
        &self,
        ctx: &ActionContext,
        params: &Map<String, Value>,
        _scope: &mut VariableScope,
    ) -> Result<Value, ActionError> {
        let message = require_str(params, "message")?;
        match opt_str(params, "level").unwrap_or("info") {
            "debug" => tracing::debug!(server = %ctx.server, "{message}"),
            "warn" => tracing::warn!(server = %ctx.server, "{message}"),
            "error" => tracing::error!(server = %ctx.server, "{message}"),
            _ => tracing::info!(server = %ctx.server, "{message}"),
        }
        Ok(Value::String(message.to_string()))
    }
}

// -- set_variable --

struct SetVariable;

#[async_trait]
impl ActionHandler for SetVariable {
    fn schema(&self) -> ActionSchema {
        ActionSchema {
            action_type: "set_variable",
            params: vec![
                ParamSpec {
                    name: "name",
                    kind: ParamKind::String,
                    required: true,
                },
                ParamSpec {
                    name: "value",
                    kind: ParamKind::Any,
                    required: true,
                },
            ],
        }
    }

    async fn execute(
        &self,
        _ctx: &ActionContext,
        params: &Map<String, Value>,
        scope: &mut VariableScope,
    ) -> Result<Value, ActionError> {
        let name = require_str(params, "name")?;
        let value = params
            .get("value")
            .ok_or_else(|| ActionError::InvalidParam("value", "missing".into()))?;
        scope.set(name, value.clone());
        Ok(value.clone())
    }
}

// -- lua_script --

struct LuaScript;

#[async_trait]
impl ActionHandler for LuaScript {
    fn schema(&self) -> ActionSchema {
        ActionSchema {
            action_type: "lua_script",
            params: vec![ParamSpec {
                name: "script",
                kind: ParamKind::String,
                required: true,
            }],
        }
    }

    async fn execute(
        &self,
        ctx: &ActionContext,
        params: &Map<String, Value>,
        scope: &mut VariableScope,
    ) -> Result<Value, ActionError> {
        let script = require_str(params, "script")?;
        let outcome = run_script(
            script.to_string(),
            LuaContext {
                vars: Value::Object(scope.variables().clone()),
                event: scope.event().clone(),
                kv: ctx.kv.clone(),
                runner: Arc::clone(&ctx.runner),
                http: ctx.http.clone(),
            },
            LuaLimits::default(),
        )
        .await?;
        for (name, value) in outcome.var_sets {
            scope.set(&name, value);
        }
        Ok(outcome.result)
    }
}

// -- connector_send --

struct ConnectorSend;

#[async_trait]
impl ActionHandler for ConnectorSend {
    fn schema(&self) -> ActionSchema {
        ActionSchema {
            action_type: "connector_send",
            params: vec![
                ParamSpec {
                    name: "connector",
                    kind: ParamKind::String,
                    required: true,
                },
                ParamSpec {
                    name: "payload",
                    kind: ParamKind::Any,
                    required: true,
                },
            ],
        }
    }

    async fn execute(
        &self,
        ctx: &ActionContext,
        params: &Map<String, Value>,
        _scope: &mut VariableScope,
    ) -> Result<Value, ActionError> {
        let name = require_str(params, "connector")?;
        let payload = params
            .get("payload")
            .ok_or_else(|| ActionError::InvalidParam("payload", "missing".into()))?;
        let connector = ctx
            .connectors
            .get(name)
            .ok_or_else(|| aegis_core::ConnectorError::NotFound(name.to_string()))?;
        connector.send(payload.clone()).await?;
        Ok(json!({"connector": name, "delivered": true}))
    }
}

#[cfg(test)]
#[path = "actions_tests.rs"]
mod tests;
