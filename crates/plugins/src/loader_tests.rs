// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ed25519_dalek::pkcs8::{EncodePublicKey, LineEnding};
use ed25519_dalek::{Signer, SigningKey};

fn key_pair(seed: u8) -> (SigningKey, TrustedKeyRecord) {
    let signing = SigningKey::from_bytes(&[seed; 32]);
    let pem = signing
        .verifying_key()
        .to_public_key_pem(LineEnding::LF)
        .unwrap();
    (
        signing,
        TrustedKeyRecord {
            key_id: format!("key-{seed}"),
            public_key_pem: pem,
        },
    )
}

const ARTIFACT: &[u8] = b"pretend this is a cdylib";

#[test]
fn valid_signature_verifies_and_names_the_key() {
    let (signing, record) = key_pair(7);
    let signature = signing.sign(ARTIFACT);
    let key_id = verify_signature(ARTIFACT, &signature.to_bytes(), &[record]).unwrap();
    assert_eq!(key_id, "key-7");
}

#[test]
fn hex_encoded_signatures_are_accepted() {
    let (signing, record) = key_pair(7);
    let signature = signing.sign(ARTIFACT);
    let hex: String = signature
        .to_bytes()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect();
    let key_id = verify_signature(ARTIFACT, hex.as_bytes(), &[record]).unwrap();
    assert_eq!(key_id, "key-7");
}

#[test]
fn tampered_artifact_is_rejected() {
    let (signing, record) = key_pair(7);
    let signature = signing.sign(ARTIFACT);
    let err = verify_signature(b"tampered bytes", &signature.to_bytes(), &[record]).unwrap_err();
    assert!(matches!(err, LoaderError::SignatureInvalid));
}

#[test]
fn signature_from_untrusted_key_is_rejected() {
    let (untrusted, _) = key_pair(1);
    let (_, trusted_record) = key_pair(2);
    let signature = untrusted.sign(ARTIFACT);
    let err = verify_signature(ARTIFACT, &signature.to_bytes(), &[trusted_record]).unwrap_err();
    assert!(matches!(err, LoaderError::SignatureInvalid));
}

#[test]
fn empty_trust_store_is_rejected_outright() {
    let (signing, _) = key_pair(7);
    let signature = signing.sign(ARTIFACT);
    let err = verify_signature(ARTIFACT, &signature.to_bytes(), &[]).unwrap_err();
    assert!(matches!(err, LoaderError::NoTrustedKeys));
}

#[test]
fn malformed_signature_bytes_are_rejected() {
    let (_, record) = key_pair(7);
    let err = verify_signature(ARTIFACT, b"short", &[record]).unwrap_err();
    assert!(matches!(err, LoaderError::SignatureMalformed));
}

#[test]
fn unsupported_required_features_reject_the_definition() {
    let definition = PluginDefinition {
        id: "p".into(),
        name: "p".into(),
        version: "1.0.0".into(),
        author: "tests".into(),
        allow_multiple_instances: false,
        required_connectors: vec![],
        long_running: false,
        lossless_delivery: false,
        required_features: vec!["events".into(), "quantum-rng".into()],
        config_schema: vec![],
        events: vec![],
    };
    let err = check_features(&definition).unwrap_err();
    assert!(matches!(err, LoaderError::UnsupportedFeature(f) if f == "quantum-rng"));
}

#[test]
fn supported_features_pass_screening() {
    let definition = PluginDefinition {
        id: "p".into(),
        name: "p".into(),
        version: "1.0.0".into(),
        author: "tests".into(),
        allow_multiple_instances: false,
        required_connectors: vec![],
        long_running: false,
        lossless_delivery: false,
        required_features: vec!["events".into(), "rcon".into()],
        config_schema: vec![],
        events: vec![],
    };
    check_features(&definition).unwrap();
}

#[test]
fn loading_a_missing_artifact_is_an_io_error() {
    let (signing, record) = key_pair(7);
    let dir = tempfile::tempdir().unwrap();
    let sig_path = dir.path().join("ghost.so.sig");
    std::fs::write(&sig_path, signing.sign(ARTIFACT).to_bytes()).unwrap();

    let loader = DynamicLoader::new(vec![record]);
    let err = loader
        .load(&dir.path().join("ghost.so"), &sig_path)
        .unwrap_err();
    assert!(matches!(err, LoaderError::Io { .. }));
}

#[test]
fn signed_non_library_fails_at_dlopen_not_before() {
    let (signing, record) = key_pair(7);
    let dir = tempfile::tempdir().unwrap();
    let artifact_path = dir.path().join("plugin.so");
    std::fs::write(&artifact_path, b"valid signature, not a library").unwrap();
    let sig_path = dir.path().join("plugin.so.sig");
    let signature = signing.sign(b"valid signature, not a library");
    std::fs::write(&sig_path, signature.to_bytes()).unwrap();

    let loader = DynamicLoader::new(vec![record]);
    let err = loader.load(&artifact_path, &sig_path).unwrap_err();
    assert!(matches!(err, LoaderError::Library(_)));
}

#[test]
fn unsigned_artifact_never_reaches_dlopen() {
    let (_, record) = key_pair(7);
    let dir = tempfile::tempdir().unwrap();
    let artifact_path = dir.path().join("evil.so");
    std::fs::write(&artifact_path, b"not really a library").unwrap();
    let sig_path = dir.path().join("evil.so.sig");
    std::fs::write(&sig_path, [0u8; 64]).unwrap();

    let loader = DynamicLoader::new(vec![record]);
    let err = loader.load(&artifact_path, &sig_path).unwrap_err();
    assert!(matches!(err, LoaderError::SignatureInvalid));
}
