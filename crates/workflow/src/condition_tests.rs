// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::definition::{ConditionOp, TriggerCondition};
use serde_json::json;
use yare::parameterized;

fn compiled(path: &str, op: ConditionOp, value: serde_json::Value) -> CompiledCondition {
    CompiledCondition::compile(&TriggerCondition {
        path: path.into(),
        op,
        value,
    })
    .unwrap()
}

fn wounded_view() -> serde_json::Value {
    json!({
        "type": "LOG_PLAYER_WOUNDED",
        "server": "srv-1",
        "damage": 42.5,
        "weapon": "BP_M4_Rifle",
        "attacker_eos": "A",
        "enrichment": {"teamkill": true, "attacker": {"eos_id": "A", "team_id": "1"}}
    })
}

#[parameterized(
    eq_string = { "weapon", ConditionOp::Eq, json!("BP_M4_Rifle"), true },
    eq_miss = { "weapon", ConditionOp::Eq, json!("BP_AK74"), false },
    neq = { "weapon", ConditionOp::Neq, json!("BP_AK74"), true },
    eq_bool = { "enrichment.teamkill", ConditionOp::Eq, json!(true), true },
    eq_number_coerced = { "damage", ConditionOp::Eq, json!("42.5"), true },
    gt = { "damage", ConditionOp::Gt, json!(40), true },
    gt_miss = { "damage", ConditionOp::Gt, json!(50), false },
    gte_equal = { "damage", ConditionOp::Gte, json!(42.5), true },
    lt = { "damage", ConditionOp::Lt, json!(100), true },
    lte_miss = { "damage", ConditionOp::Lte, json!(42), false },
    contains = { "weapon", ConditionOp::Contains, json!("M4"), true },
    startswith = { "weapon", ConditionOp::Startswith, json!("BP_"), true },
    endswith = { "weapon", ConditionOp::Endswith, json!("Rifle"), true },
    endswith_miss = { "weapon", ConditionOp::Endswith, json!("Pistol"), false },
    regex = { "weapon", ConditionOp::Regex, json!("^BP_M4.*$"), true },
    r#in = { "attacker_eos", ConditionOp::In, json!(["A", "B"]), true },
    in_miss = { "attacker_eos", ConditionOp::In, json!(["X"]), false },
    exists = { "enrichment.teamkill", ConditionOp::Exists, json!(null), true },
)]
fn operator_semantics(path: &str, op: ConditionOp, value: serde_json::Value, expected: bool) {
    assert_eq!(compiled(path, op, value).matches(&wounded_view()), expected);
}

#[parameterized(
    eq = { ConditionOp::Eq },
    gt = { ConditionOp::Gt },
    contains = { ConditionOp::Contains },
    regex_op = { ConditionOp::Regex },
)]
fn missing_paths_fail_closed(op: ConditionOp) {
    let value = match op {
        ConditionOp::Regex => json!(".*"),
        _ => json!("3"),
    };
    let condition = compiled("player.squad_id", op, value);
    assert!(!condition.matches(&wounded_view()));
}

#[test]
fn exists_is_false_for_missing_path() {
    let condition = compiled("player.squad_id", ConditionOp::Exists, json!(null));
    assert!(!condition.matches(&wounded_view()));
}

#[test]
fn exists_false_inverts() {
    let condition = compiled("player.squad_id", ConditionOp::Exists, json!(false));
    assert!(condition.matches(&wounded_view()));
}

#[test]
fn event_prefix_is_accepted_on_condition_paths() {
    let condition = compiled("event.enrichment.teamkill", ConditionOp::Eq, json!(true));
    assert!(condition.matches(&wounded_view()));
}

#[test]
fn numeric_string_comparisons_coerce_both_sides() {
    let view = json!({"tickets": "150"});
    assert!(compiled("tickets", ConditionOp::Gt, json!(100)).matches(&view));
    assert!(compiled("tickets", ConditionOp::Eq, json!(150)).matches(&view));
}

#[test]
fn ordering_on_non_numeric_fails_closed() {
    let view = json!({"layer": "Narva_RAAS_v1"});
    assert!(!compiled("layer", ConditionOp::Gt, json!("A")).matches(&view));
}

#[test]
fn invalid_regex_is_rejected_at_compile_time() {
    let err = CompiledCondition::compile(&TriggerCondition {
        path: "weapon".into(),
        op: ConditionOp::Regex,
        value: json!("("),
    })
    .unwrap_err();
    assert!(matches!(err, ConditionError::Regex { .. }));
}

#[test]
fn regex_value_must_be_string() {
    let err = CompiledCondition::compile(&TriggerCondition {
        path: "weapon".into(),
        op: ConditionOp::Regex,
        value: json!(7),
    })
    .unwrap_err();
    assert!(matches!(err, ConditionError::RegexValueNotString { .. }));
}

#[test]
fn all_match_ands_conditions() {
    let conditions = vec![
        compiled("enrichment.teamkill", ConditionOp::Eq, json!(true)),
        compiled("damage", ConditionOp::Gt, json!(10)),
    ];
    assert!(all_match(&conditions, &wounded_view()));

    let conditions = vec![
        compiled("enrichment.teamkill", ConditionOp::Eq, json!(true)),
        compiled("damage", ConditionOp::Gt, json!(100)),
    ];
    assert!(!all_match(&conditions, &wounded_view()));
}

#[test]
fn empty_condition_list_matches() {
    assert!(all_match(&[], &wounded_view()));
}

#[test]
fn array_contains_checks_membership() {
    let view = json!({"tags": ["tk", "admin"]});
    assert!(compiled("tags", ConditionOp::Contains, json!("tk")).matches(&view));
    assert!(!compiled("tags", ConditionOp::Contains, json!("afk")).matches(&view));
}
