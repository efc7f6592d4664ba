// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dotted-path access over JSON views.
//!
//! Trigger conditions, variable interpolation, and enrichment all
//! address event data with dotted paths (`enrichment.teamkill`,
//! `player.squad_id`). Missing intermediate nodes resolve to `None`;
//! callers treat that as fail-closed.

use serde_json::Value;

/// Look up a dotted path in a JSON value.
///
/// Numeric segments index into arrays.
pub fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }
    let mut current = root;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Render a JSON value the way it should appear inside interpolated
/// strings: bare strings lose their quotes, scalars use their JSON
/// form, and composites stay compact JSON.
pub fn to_display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Coerce a JSON value to a number when possible.
///
/// Numbers pass through; strings parse when they look numeric. Used by
/// condition comparison and `inc`/`dec` variable ops.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
#[path = "path_tests.rs"]
mod tests;
