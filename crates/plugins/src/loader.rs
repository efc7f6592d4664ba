// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Signed dynamic plugin loading.
//!
//! An artifact loads only when a detached Ed25519 signature over its
//! bytes verifies against one of the trusted public keys, its ABI tag
//! matches, and every required feature is supported. Unloading is
//! best-effort: the library is intentionally leaked (dlclose on a live
//! Rust cdylib is not reclaimable in general); the runtime deactivates
//! the instance and unsubscribes its callbacks instead.

use crate::definition::PluginDefinition;
use crate::monitor::{UsageProbe, UsageSample};
use crate::plugin::Plugin;
use aegis_storage::TrustedKeyRecord;
use ed25519_dalek::pkcs8::DecodePublicKey;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use libloading::Library;
use std::path::Path;
use thiserror::Error;

/// Loader failures.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("artifact signature did not verify against any trusted key")]
    SignatureInvalid,

    #[error("signature file is not a 64-byte Ed25519 signature")]
    SignatureMalformed,

    #[error("no trusted public keys configured")]
    NoTrustedKeys,

    #[error("plugin requires unsupported feature {0}")]
    UnsupportedFeature(String),

    #[error("plugin ABI {found} does not match host {expected}")]
    AbiMismatch { expected: String, found: String },

    #[error("dynamic library error: {0}")]
    Library(String),
}

/// Capabilities this host version offers to dynamic plugins.
pub const SUPPORTED_FEATURES: &[&str] = &["events", "rcon", "kv", "connectors"];

/// ABI tag both sides must agree on.
pub const ABI_TAG: &str = "aegis-plugin-1";

const DEFINE_SYMBOL: &[u8] = b"aegis_plugin_define";
const ABI_SYMBOL: &[u8] = b"aegis_plugin_abi";
const USAGE_SYMBOL: &[u8] = b"aegis_plugin_usage";

type DefineFn = unsafe extern "Rust" fn() -> Box<dyn Plugin>;
type AbiFn = unsafe extern "Rust" fn() -> &'static str;
type UsageFn = unsafe extern "Rust" fn() -> UsageSample;

/// Probe backed by the artifact's exported usage hook. The library is
/// never unloaded, so the function pointer stays valid.
struct SymbolProbe {
    usage: UsageFn,
}

impl UsageProbe for SymbolProbe {
    fn sample(&self) -> UsageSample {
        // SAFETY: the symbol was resolved from a signature-verified,
        // ABI-screened artifact that remains resident for the process
        // lifetime.
        unsafe { (self.usage)() }
    }
}

/// Fallback for artifacts that export no usage hook: reports zero
/// usage, so the monitor stays armed but can only be tripped once the
/// plugin ships the hook.
struct SilentProbe;

impl UsageProbe for SilentProbe {
    fn sample(&self) -> UsageSample {
        UsageSample::default()
    }
}

/// Verify a detached signature; returns the matching key id.
pub fn verify_signature(
    artifact: &[u8],
    signature: &[u8],
    trusted: &[TrustedKeyRecord],
) -> Result<String, LoaderError> {
    if trusted.is_empty() {
        return Err(LoaderError::NoTrustedKeys);
    }
    let signature = parse_signature(signature)?;
    for key in trusted {
        let Ok(verifying) = VerifyingKey::from_public_key_pem(&key.public_key_pem) else {
            tracing::warn!(key = %key.key_id, "trusted key is not valid Ed25519 PEM, skipping");
            continue;
        };
        if verifying.verify(artifact, &signature).is_ok() {
            return Ok(key.key_id.clone());
        }
    }
    Err(LoaderError::SignatureInvalid)
}

/// Accept a raw 64-byte signature or its 128-char hex encoding.
fn parse_signature(raw: &[u8]) -> Result<Signature, LoaderError> {
    if raw.len() == 64 {
        let mut bytes = [0u8; 64];
        bytes.copy_from_slice(raw);
        return Ok(Signature::from_bytes(&bytes));
    }
    let text = std::str::from_utf8(raw)
        .map_err(|_| LoaderError::SignatureMalformed)?
        .trim();
    if text.len() == 128 {
        let mut bytes = [0u8; 64];
        for (i, chunk) in text.as_bytes().chunks(2).enumerate() {
            let hex = std::str::from_utf8(chunk).map_err(|_| LoaderError::SignatureMalformed)?;
            bytes[i] = u8::from_str_radix(hex, 16).map_err(|_| LoaderError::SignatureMalformed)?;
        }
        return Ok(Signature::from_bytes(&bytes));
    }
    Err(LoaderError::SignatureMalformed)
}

/// Reject definitions that need features this host does not have.
pub fn check_features(definition: &PluginDefinition) -> Result<(), LoaderError> {
    for feature in &definition.required_features {
        if !SUPPORTED_FEATURES.contains(&feature.as_str()) {
            return Err(LoaderError::UnsupportedFeature(feature.clone()));
        }
    }
    Ok(())
}

/// A dynamically loaded plugin. The backing library stays resident
/// for the process lifetime.
pub struct LoadedPlugin {
    pub plugin: Box<dyn Plugin>,
    /// Which trusted key vouched for the artifact.
    pub key_id: String,
    /// Usage readings for the sandbox monitor.
    pub probe: std::sync::Arc<dyn UsageProbe>,
}

/// Loads signed plugin artifacts.
pub struct DynamicLoader {
    trusted: Vec<TrustedKeyRecord>,
}

impl DynamicLoader {
    pub fn new(trusted: Vec<TrustedKeyRecord>) -> Self {
        Self { trusted }
    }

    /// Load `artifact` after verifying `signature` (a sibling
    /// `.sig` file) and screening the definition.
    pub fn load(&self, artifact: &Path, signature: &Path) -> Result<LoadedPlugin, LoaderError> {
        let bytes = std::fs::read(artifact).map_err(|source| LoaderError::Io {
            path: artifact.display().to_string(),
            source,
        })?;
        let sig_bytes = std::fs::read(signature).map_err(|source| LoaderError::Io {
            path: signature.display().to_string(),
            source,
        })?;
        let key_id = verify_signature(&bytes, &sig_bytes, &self.trusted)?;

        // SAFETY: the artifact's provenance was just established via a
        // trusted detached signature; loading it is the operator's
        // explicit intent. ABI compatibility is screened right after
        // via the exported tag before any plugin code runs.
        let library =
            unsafe { Library::new(artifact) }.map_err(|e| LoaderError::Library(e.to_string()))?;

        let abi: &'static str = unsafe {
            let symbol = library
                .get::<AbiFn>(ABI_SYMBOL)
                .map_err(|e| LoaderError::Library(e.to_string()))?;
            symbol()
        };
        if abi != ABI_TAG {
            return Err(LoaderError::AbiMismatch {
                expected: ABI_TAG.to_string(),
                found: abi.to_string(),
            });
        }

        let plugin = unsafe {
            let symbol = library
                .get::<DefineFn>(DEFINE_SYMBOL)
                .map_err(|e| LoaderError::Library(e.to_string()))?;
            symbol()
        };
        check_features(&plugin.definition())?;

        // The usage hook is optional; without it the monitor sees
        // zero usage.
        let probe: std::sync::Arc<dyn UsageProbe> =
            match unsafe { library.get::<UsageFn>(USAGE_SYMBOL) } {
                Ok(symbol) => std::sync::Arc::new(SymbolProbe { usage: *symbol }),
                Err(_) => {
                    tracing::debug!(
                        artifact = %artifact.display(),
                        "artifact exports no usage hook, sandbox sees zero usage"
                    );
                    std::sync::Arc::new(SilentProbe)
                }
            };

        tracing::info!(
            artifact = %artifact.display(),
            key = %key_id,
            plugin = %plugin.definition().id,
            "dynamic plugin loaded"
        );

        // Unloading is not supported; keep the code resident.
        std::mem::forget(library);

        Ok(LoadedPlugin {
            plugin,
            key_id,
            probe,
        })
    }
}

#[cfg(test)]
#[path = "loader_tests.rs"]
mod tests;
