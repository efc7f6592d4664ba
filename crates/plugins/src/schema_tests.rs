// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use yare::parameterized;

fn field(name: &str, field_type: FieldType, required: bool) -> ConfigField {
    ConfigField {
        name: name.into(),
        field_type,
        required,
        default: None,
        sensitive: false,
        nested: None,
    }
}

#[test]
fn defaults_fill_missing_optional_fields() {
    let mut message = field("message", FieldType::String, false);
    message.default = Some(json!("Teamkilling is not allowed"));
    let schema = vec![message];

    let validated = validate_config(&schema, &json!({})).unwrap();
    assert_eq!(validated["message"], "Teamkilling is not allowed");
}

#[test]
fn missing_required_field_is_rejected() {
    let schema = vec![field("webhook_url", FieldType::String, true)];
    let err = validate_config(&schema, &json!({})).unwrap_err();
    assert_eq!(err, SchemaError::MissingRequired("webhook_url".into()));
}

#[parameterized(
    int_accepts_number = { FieldType::Int, json!(5), json!(5) },
    int_accepts_numeric_string = { FieldType::Int, json!("42"), json!(42) },
    bool_accepts_bool = { FieldType::Bool, json!(true), json!(true) },
    bool_accepts_true_string = { FieldType::Bool, json!("true"), json!(true) },
    bool_accepts_one_string = { FieldType::Bool, json!("1"), json!(true) },
    bool_accepts_zero = { FieldType::Bool, json!(0), json!(false) },
    string_accepts_number = { FieldType::String, json!(7), json!("7") },
)]
fn coercions(field_type: FieldType, input: serde_json::Value, expected: serde_json::Value) {
    let schema = vec![field("value", field_type, true)];
    let validated = validate_config(&schema, &json!({"value": input})).unwrap();
    assert_eq!(validated["value"], expected);
}

#[parameterized(
    int_rejects_word = { FieldType::Int, json!("nope") },
    bool_rejects_word = { FieldType::Bool, json!("maybe") },
    array_rejects_scalar = { FieldType::Arraystring, json!("one") },
    object_rejects_array = { FieldType::Object, json!([1]) },
)]
fn bad_values_are_rejected(field_type: FieldType, input: serde_json::Value) {
    let schema = vec![field("value", field_type, true)];
    let err = validate_config(&schema, &json!({"value": input})).unwrap_err();
    assert!(matches!(err, SchemaError::WrongType { .. }));
}

#[test]
fn array_int_coerces_each_element() {
    let schema = vec![field("ids", FieldType::Arrayint, true)];
    let validated = validate_config(&schema, &json!({"ids": ["1", 2, "3"]})).unwrap();
    assert_eq!(validated["ids"], json!([1, 2, 3]));
}

#[test]
fn nested_objects_validate_recursively() {
    let mut relay = field("relay", FieldType::Object, true);
    relay.nested = Some(vec![
        field("url", FieldType::String, true),
        field("retries", FieldType::Int, false),
    ]);
    let schema = vec![relay];

    let validated = validate_config(
        &schema,
        &json!({"relay": {"url": "https://relay.example", "retries": "3"}}),
    )
    .unwrap();
    assert_eq!(validated["relay"]["retries"], 3);

    let err = validate_config(&schema, &json!({"relay": {}})).unwrap_err();
    assert_eq!(err, SchemaError::MissingRequired("url".into()));
}

#[test]
fn unknown_keys_are_preserved() {
    let schema = vec![field("known", FieldType::String, false)];
    let validated = validate_config(&schema, &json!({"extra": 1})).unwrap();
    assert_eq!(validated["extra"], 1);
}

#[test]
fn sensitive_fields_are_masked_on_read_out_only() {
    let mut token = field("api_token", FieldType::String, true);
    token.sensitive = true;
    let schema = vec![token, field("channel", FieldType::String, false)];

    let config = json!({"api_token": "s3cret", "channel": "#ops"});
    let masked = mask_config(&schema, &config);
    assert_eq!(masked["api_token"], "***");
    assert_eq!(masked["channel"], "#ops");
    // The original config is untouched.
    assert_eq!(config["api_token"], "s3cret");
}

#[test]
fn nested_sensitive_fields_are_masked() {
    let mut password = field("password", FieldType::String, true);
    password.sensitive = true;
    let mut auth = field("auth", FieldType::Object, true);
    auth.nested = Some(vec![password]);
    let schema = vec![auth];

    let masked = mask_config(&schema, &json!({"auth": {"password": "pw"}}));
    assert_eq!(masked["auth"]["password"], "***");
}
