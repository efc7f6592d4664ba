// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

fn scope() -> serde_json::Value {
    json!({
        "warn_message": "Teamkilling is not allowed",
        "count": 3,
        "event": {
            "type": "LOG_PLAYER_WOUNDED",
            "winner": "Team1",
            "enrichment": {"attacker": {"eos_id": "A", "name": "Bad Actor"}}
        },
        "steps": {"lookup": {"result": "found"}}
    })
}

#[test]
fn renders_variables_and_event_paths() {
    let rendered = interpolate(
        "AdminWarn \"{{event.enrichment.attacker.eos_id}}\" \"{{warn_message}}\"",
        &scope(),
    );
    assert_eq!(rendered, "AdminWarn \"A\" \"Teamkilling is not allowed\"");
}

#[test]
fn renders_numbers_without_quotes() {
    assert_eq!(interpolate("seen {{count}} times", &scope()), "seen 3 times");
}

#[test]
fn unknown_references_are_left_as_is() {
    assert_eq!(
        interpolate("hello {{missing.path}}", &scope()),
        "hello {{missing.path}}"
    );
}

#[test]
fn whitespace_inside_braces_is_tolerated() {
    assert_eq!(interpolate("{{ event.winner }} won", &scope()), "Team1 won");
}

#[test]
fn step_results_are_addressable() {
    assert_eq!(
        interpolate("prior: {{steps.lookup.result}}", &scope()),
        "prior: found"
    );
}

#[test]
fn interpolate_value_descends_into_bags() {
    let params = json!({
        "url": "https://relay.example/{{event.winner}}",
        "body": {"text": "{{event.winner}} won", "n": 1},
        "list": ["{{count}}", true]
    });
    let rendered = interpolate_value(&params, &scope());
    assert_eq!(
        rendered,
        json!({
            "url": "https://relay.example/Team1",
            "body": {"text": "Team1 won", "n": 1},
            "list": ["3", true]
        })
    );
}

#[test]
fn composite_values_render_as_compact_json() {
    let rendered = interpolate("{{event.enrichment.attacker}}", &scope());
    assert_eq!(rendered, r#"{"eos_id":"A","name":"Bad Actor"}"#);
}
