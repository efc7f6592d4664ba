// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow JSON export/import round-trip stability.

use aegis_engine::ActionRegistry;
use aegis_workflow::{export_json, import_json};
use similar_asserts::assert_eq;

const WORKFLOW: &str = r#"{
  "id": "wf-roundtrip",
  "server_id": "srv-spec",
  "name": "Round trip",
  "enabled": true,
  "version": 4,
  "triggers": [
    {
      "id": "t1",
      "event_type": "LOG_PLAYER_WOUNDED",
      "conditions": [
        {"path": "enrichment.teamkill", "op": "eq", "value": true},
        {"path": "weapon", "op": "regex", "value": "^BP_.*"}
      ],
      "enabled": true
    },
    {"id": "t2", "event_type": "LOG_PLAYER_DIED", "conditions": [], "enabled": false}
  ],
  "variables": {"warned": 0, "message": "Teamkilling is not allowed", "audit": true},
  "steps": [
    {
      "id": "check",
      "name": "Branch on damage",
      "type": "condition",
      "config": {
        "conditions": [{"path": "damage", "op": "gte", "value": 30}],
        "on_true": ["warn"],
        "on_false": []
      }
    },
    {
      "id": "warn",
      "name": "Warn",
      "type": "action",
      "config": {
        "action_type": "warn_player",
        "params": {"player": "{{event.enrichment.attacker.eos_id}}", "message": "{{message}}"}
      },
      "on_error": {"action": "retry", "max_retries": 3, "retry_delay_ms": 250}
    },
    {
      "id": "tally",
      "name": "Count",
      "type": "variable",
      "config": {"name": "warned", "value": 1, "op": "inc"}
    }
  ],
  "error_handling": {"action": "continue", "max_retries": 0, "retry_delay_ms": 1000}
}"#;

#[test]
fn export_import_export_is_byte_stable() {
    let registry = ActionRegistry::with_builtins();
    let schemas = registry.schemas();

    let imported = import_json(WORKFLOW, &schemas).unwrap();
    let exported = export_json(&imported).unwrap();
    let reimported = import_json(&exported, &schemas).unwrap();
    let reexported = export_json(&reimported).unwrap();

    assert_eq!(exported, reexported);
    assert_eq!(imported, reimported);
}

#[test]
fn declaration_order_survives_the_round_trip() {
    let registry = ActionRegistry::with_builtins();
    let schemas = registry.schemas();

    let imported = import_json(WORKFLOW, &schemas).unwrap();
    let variables: Vec<&String> = imported.variables.keys().collect();
    assert_eq!(variables, ["warned", "message", "audit"]);

    let steps: Vec<&str> = imported.steps.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(steps, ["check", "warn", "tally"]);
}
