// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `{{path}}` template interpolation.
//!
//! Step config strings reference the variable scope with the same
//! dotted-path semantics as conditions; `{{event.*}}` reaches into the
//! triggering event's view. Unknown references are left as-is so a
//! half-rendered command is visible in the execution history instead
//! of silently collapsing to an empty string.

use aegis_core::path;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// Regex for {{variable}} or {{namespace.variable}} references.
// Allow expect here as the regex is compile-time verified to be valid
#[allow(clippy::expect_used)]
static REF_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z0-9_-]+)*)\s*\}\}")
        .expect("constant regex pattern is valid")
});

/// Interpolate `{{path}}` references against a JSON scope.
///
/// The scope is one object: variables at the top level plus an `event`
/// subtree holding the trigger event view and a `steps` subtree with
/// prior step results.
pub fn interpolate(template: &str, scope: &Value) -> String {
    REF_PATTERN
        .replace_all(template, |caps: &regex::Captures| {
            let reference = &caps[1];
            match path::lookup(scope, reference) {
                Some(value) => path::to_display(value),
                None => caps[0].to_string(),
            }
        })
        .to_string()
}

/// Interpolate every string leaf of a JSON parameter bag in place.
pub fn interpolate_value(value: &Value, scope: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(interpolate(s, scope)),
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| interpolate_value(v, scope)).collect())
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), interpolate_value(v, scope)))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;
