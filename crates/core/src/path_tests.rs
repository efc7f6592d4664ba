// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use yare::parameterized;

#[test]
fn resolves_nested_objects() {
    let root = json!({"player": {"squad_id": "3"}});
    assert_eq!(lookup(&root, "player.squad_id"), Some(&json!("3")));
}

#[test]
fn resolves_top_level_scalars() {
    let root = json!({"winner": "Team1"});
    assert_eq!(lookup(&root, "winner"), Some(&json!("Team1")));
}

#[parameterized(
    missing_leaf = { "player.nope" },
    missing_intermediate = { "nothing.squad_id" },
    scalar_descend = { "player.squad_id.deeper" },
    empty = { "" },
)]
fn missing_paths_resolve_to_none(path: &str) {
    let root = json!({"player": {"squad_id": "3"}});
    assert_eq!(lookup(&root, path), None);
}

#[test]
fn numeric_segments_index_arrays() {
    let root = json!({"squads": [{"name": "Alpha"}, {"name": "Bravo"}]});
    assert_eq!(lookup(&root, "squads.1.name"), Some(&json!("Bravo")));
    assert_eq!(lookup(&root, "squads.7.name"), None);
    assert_eq!(lookup(&root, "squads.x.name"), None);
}

#[test]
fn display_renders_strings_unquoted() {
    assert_eq!(to_display(&json!("Team1")), "Team1");
    assert_eq!(to_display(&json!(10)), "10");
    assert_eq!(to_display(&json!(true)), "true");
    assert_eq!(to_display(&json!({"a": 1})), "{\"a\":1}");
}

#[parameterized(
    integer = { json!(3), Some(3.0) },
    float = { json!(2.5), Some(2.5) },
    numeric_string = { json!("42"), Some(42.0) },
    padded_string = { json!(" 42 "), Some(42.0) },
    word = { json!("forty"), None },
    boolean = { json!(true), None },
    null = { json!(null), None },
)]
fn numeric_coercion(value: serde_json::Value, expected: Option<f64>) {
    assert_eq!(as_number(&value), expected);
}
