// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Key builders for the `squad-aegis:` hierarchy.
//!
//! Layout: `squad-aegis:<subsystem>:<server>:<entity>:<id>`.

use aegis_core::{ServerId, WorkflowId};

pub const PREFIX: &str = "squad-aegis";

pub fn player(server: &ServerId, eos_id: &str) -> String {
    format!("{PREFIX}:tracker:{server}:player:{eos_id}")
}

pub fn player_pattern(server: &ServerId) -> String {
    format!("{PREFIX}:tracker:{server}:player:*")
}

pub fn team(server: &ServerId, team_id: &str) -> String {
    format!("{PREFIX}:tracker:{server}:team:{team_id}")
}

pub fn team_pattern(server: &ServerId) -> String {
    format!("{PREFIX}:tracker:{server}:team:*")
}

pub fn squad(server: &ServerId, team_id: &str, squad_id: &str) -> String {
    format!("{PREFIX}:tracker:{server}:squad:{team_id}:{squad_id}")
}

pub fn squad_pattern(server: &ServerId) -> String {
    format!("{PREFIX}:tracker:{server}:squad:*")
}

pub fn index_name(server: &ServerId, name: &str) -> String {
    format!("{PREFIX}:tracker:{server}:index:name:{name}")
}

pub fn index_controller(server: &ServerId, controller: &str) -> String {
    format!("{PREFIX}:tracker:{server}:index:controller:{controller}")
}

pub fn index_steam(server: &ServerId, steam_id: &str) -> String {
    format!("{PREFIX}:tracker:{server}:index:steam:{steam_id}")
}

pub fn workflow_kv(workflow: &WorkflowId, key: &str) -> String {
    format!("{PREFIX}:workflow-kv:{workflow}:{key}")
}

pub fn workflow_kv_pattern(workflow: &WorkflowId, key_prefix: &str) -> String {
    format!("{PREFIX}:workflow-kv:{workflow}:{key_prefix}*")
}

/// Strip the namespace from a workflow-kv key, returning the bare key.
pub fn workflow_kv_bare(workflow: &WorkflowId, full_key: &str) -> Option<String> {
    full_key
        .strip_prefix(&format!("{PREFIX}:workflow-kv:{workflow}:"))
        .map(str::to_string)
}
