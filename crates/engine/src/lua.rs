// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sandboxed Lua for `lua` steps and the `lua_script` action.
//!
//! Each invocation gets a fresh VM with a memory cap, an instruction
//! budget, and a wall-clock bound enforced from an instruction hook.
//! Only the documented host surface is exposed: `vars`, `event`,
//! `set_var`, `kv`, `log`, `http.get/post`, and `rcon`. Scripts run on
//! a blocking thread; host calls bridge back into the runtime.

use crate::error::ActionError;
use aegis_cache::WorkflowKv;
use aegis_rcon::{CommandOptions, CommandRunner};
use mlua::{Lua, LuaSerdeExt, Value as LuaValue, VmState};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Resource bounds for one script run.
#[derive(Debug, Clone)]
pub struct LuaLimits {
    pub max_memory_bytes: usize,
    pub max_instructions: u64,
    pub max_wall: Duration,
}

impl Default for LuaLimits {
    fn default() -> Self {
        Self {
            max_memory_bytes: 32 * 1024 * 1024,
            max_instructions: 5_000_000,
            max_wall: Duration::from_secs(5),
        }
    }
}

/// Host capabilities visible to the script.
#[derive(Clone)]
pub struct LuaContext {
    pub vars: Value,
    pub event: Value,
    pub kv: WorkflowKv,
    pub runner: Arc<dyn CommandRunner>,
    pub http: reqwest::Client,
}

/// Script result: the returned value plus any `set_var` calls, applied
/// to the execution scope afterwards.
#[derive(Debug)]
pub struct LuaOutcome {
    pub result: Value,
    pub var_sets: Vec<(String, Value)>,
}

/// HTTP bounds inside scripts match the http_request action.
const SCRIPT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const HOOK_INSTRUCTION_GRANULARITY: u32 = 1000;

pub async fn run_script(
    script: String,
    ctx: LuaContext,
    limits: LuaLimits,
) -> Result<LuaOutcome, ActionError> {
    let handle = tokio::runtime::Handle::current();
    let wall_backstop = limits.max_wall + Duration::from_secs(2);

    let run = tokio::task::spawn_blocking(move || execute_blocking(&script, ctx, &limits, handle));
    match tokio::time::timeout(wall_backstop, run).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(ActionError::Lua(format!("lua task failed: {join_err}"))),
        Err(_) => Err(ActionError::Lua("lua script exceeded wall clock".into())),
    }
}

fn execute_blocking(
    script: &str,
    ctx: LuaContext,
    limits: &LuaLimits,
    handle: tokio::runtime::Handle,
) -> Result<LuaOutcome, ActionError> {
    // Only the value-manipulation libraries; no io, os, debug, or
    // package, so scripts cannot reach host internals.
    let lua = Lua::new_with(
        mlua::StdLib::MATH | mlua::StdLib::STRING | mlua::StdLib::TABLE,
        mlua::LuaOptions::default(),
    )
    .map_err(|e| ActionError::Lua(e.to_string()))?;
    lua.set_memory_limit(limits.max_memory_bytes)
        .map_err(|e| ActionError::Lua(e.to_string()))?;

    let started = Instant::now();
    let budget = limits.max_instructions;
    let max_wall = limits.max_wall;
    let executed = Arc::new(Mutex::new(0u64));
    {
        let executed = Arc::clone(&executed);
        lua.set_hook(
            mlua::HookTriggers::new().every_nth_instruction(HOOK_INSTRUCTION_GRANULARITY),
            move |_lua, _debug| {
                let mut count = executed.lock();
                *count += HOOK_INSTRUCTION_GRANULARITY as u64;
                if *count > budget {
                    return Err(mlua::Error::RuntimeError(
                        "instruction budget exceeded".into(),
                    ));
                }
                if started.elapsed() > max_wall {
                    return Err(mlua::Error::RuntimeError("wall clock exceeded".into()));
                }
                Ok(VmState::Continue)
            },
        );
    }

    let var_sets: Arc<Mutex<Vec<(String, Value)>>> = Arc::new(Mutex::new(Vec::new()));
    install_host_api(&lua, &ctx, &handle, Arc::clone(&var_sets))
        .map_err(|e| ActionError::Lua(e.to_string()))?;

    let result: LuaValue = lua
        .load(script)
        .set_name("workflow-script")
        .eval()
        .map_err(|e| ActionError::Lua(e.to_string()))?;
    let result: Value = lua
        .from_value(result)
        .unwrap_or_else(|_| Value::String("<unserializable>".into()));

    let var_sets = std::mem::take(&mut *var_sets.lock());
    Ok(LuaOutcome { result, var_sets })
}

fn install_host_api(
    lua: &Lua,
    ctx: &LuaContext,
    handle: &tokio::runtime::Handle,
    var_sets: Arc<Mutex<Vec<(String, Value)>>>,
) -> mlua::Result<()> {
    let globals = lua.globals();

    globals.set("vars", lua.to_value(&ctx.vars)?)?;
    globals.set("event", lua.to_value(&ctx.event)?)?;

    // set_var(name, value): applied to the scope after the run.
    {
        let lua_inner = lua.clone();
        globals.set(
            "set_var",
            lua.create_function(move |_, (name, value): (String, LuaValue)| {
                let json: Value = lua_inner.from_value(value)?;
                var_sets.lock().push((name, json));
                Ok(())
            })?,
        )?;
    }

    // log(level, message)
    globals.set(
        "log",
        lua.create_function(|_, (level, message): (String, String)| {
            match level.as_str() {
                "debug" => tracing::debug!(target: "lua", "{message}"),
                "warn" => tracing::warn!(target: "lua", "{message}"),
                "error" => tracing::error!(target: "lua", "{message}"),
                _ => tracing::info!(target: "lua", "{message}"),
            }
            Ok(())
        })?,
    )?;

    // kv.get/set/delete/incr
    {
        let kv_table = lua.create_table()?;
        let kv = ctx.kv.clone();
        let h = handle.clone();
        let lua_inner = lua.clone();
        kv_table.set(
            "get",
            lua.create_function(move |_, key: String| {
                let value = h
                    .block_on(kv.get(&key))
                    .map_err(|e| mlua::Error::RuntimeError(e.to_string()))?;
                match value {
                    Some(v) => lua_inner.to_value(&v),
                    None => Ok(LuaValue::Nil),
                }
            })?,
        )?;
        let kv = ctx.kv.clone();
        let h = handle.clone();
        let lua_inner = lua.clone();
        kv_table.set(
            "set",
            lua.create_function(
                move |_, (key, value, ttl_ms): (String, LuaValue, Option<u64>)| {
                    let json: Value = lua_inner.from_value(value)?;
                    let ttl = ttl_ms.map(Duration::from_millis);
                    h.block_on(kv.set(&key, &json, ttl))
                        .map_err(|e| mlua::Error::RuntimeError(e.to_string()))
                },
            )?,
        )?;
        let kv = ctx.kv.clone();
        let h = handle.clone();
        kv_table.set(
            "delete",
            lua.create_function(move |_, key: String| {
                h.block_on(kv.delete(&key))
                    .map_err(|e| mlua::Error::RuntimeError(e.to_string()))
            })?,
        )?;
        let kv = ctx.kv.clone();
        let h = handle.clone();
        kv_table.set(
            "incr",
            lua.create_function(move |_, (key, delta): (String, Option<i64>)| {
                h.block_on(kv.incr(&key, delta.unwrap_or(1)))
                    .map_err(|e| mlua::Error::RuntimeError(e.to_string()))
            })?,
        )?;
        globals.set("kv", kv_table)?;
    }

    // http.get/post
    {
        let http_table = lua.create_table()?;
        let client = ctx.http.clone();
        let h = handle.clone();
        http_table.set(
            "get",
            lua.create_function(move |_, url: String| {
                let client = client.clone();
                h.block_on(async move {
                    let response = client
                        .get(&url)
                        .timeout(SCRIPT_HTTP_TIMEOUT)
                        .send()
                        .await
                        .map_err(|e| mlua::Error::RuntimeError(e.to_string()))?;
                    let status = response.status().as_u16();
                    let body = response
                        .text()
                        .await
                        .map_err(|e| mlua::Error::RuntimeError(e.to_string()))?;
                    Ok((status, body))
                })
            })?,
        )?;
        let client = ctx.http.clone();
        let h = handle.clone();
        http_table.set(
            "post",
            lua.create_function(move |_, (url, body): (String, String)| {
                let client = client.clone();
                h.block_on(async move {
                    let response = client
                        .post(&url)
                        .timeout(SCRIPT_HTTP_TIMEOUT)
                        .header("content-type", "application/json")
                        .body(body)
                        .send()
                        .await
                        .map_err(|e| mlua::Error::RuntimeError(e.to_string()))?;
                    let status = response.status().as_u16();
                    let text = response
                        .text()
                        .await
                        .map_err(|e| mlua::Error::RuntimeError(e.to_string()))?;
                    Ok((status, text))
                })
            })?,
        )?;
        globals.set("http", http_table)?;
    }

    // rcon(command) -> response body
    {
        let runner = Arc::clone(&ctx.runner);
        let h = handle.clone();
        globals.set(
            "rcon",
            lua.create_function(move |_, command: String| {
                h.block_on(runner.run(
                    &command,
                    CommandOptions {
                        suppress_empty_response: true,
                        ..Default::default()
                    },
                ))
                .map_err(|e| mlua::Error::RuntimeError(e.to_string()))
            })?,
        )?;
    }

    Ok(())
}

#[cfg(test)]
#[path = "lua_tests.rs"]
mod tests;
