//! Library manifest records consumed from prebuilt packages.
//!
//! Manifests are declarative descriptors emitted by a library's own build
//! (`alloy.manifest.mjs`). They arrive here as already-parsed JSON and are
//! deserialized into these records before ingestion. Schema version 1 is the
//! only accepted version; a missing version is tolerated and treated as 1.

use serde::{Deserialize, Serialize};

use super::dependency::RetryPolicy;
use super::service::Scope;
use crate::error::{Error, Result};

/// Schema version this build understands
pub const MANIFEST_SCHEMA_VERSION: u32 = 1;

/// How the library's build laid out its modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildMode {
    /// One output module per source module; public subpaths are stable
    PreserveModules,
    /// Code-split chunks
    Chunks,
    /// Single-file bundle
    Bundled,
}

impl BuildMode {
    /// The manifest-literal form of the mode
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildMode::PreserveModules => "preserve-modules",
            BuildMode::Chunks => "chunks",
            BuildMode::Bundled => "bundled",
        }
    }
}

/// Retry hints as they appear in manifest JSON (`retries` / `backoffMs` /
/// `factor`, all optional).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryHints {
    /// Retries after the first attempt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    /// Initial backoff in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backoff_ms: Option<u64>,
    /// Backoff multiplier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub factor: Option<f64>,
}

impl RetryHints {
    /// Whether any hint was actually given
    pub fn is_empty(&self) -> bool {
        self.retries.is_none() && self.backoff_ms.is_none() && self.factor.is_none()
    }
}

impl From<&RetryHints> for RetryPolicy {
    fn from(hints: &RetryHints) -> Self {
        let defaults = RetryPolicy::default();
        RetryPolicy {
            attempts_after_first: hints.retries.unwrap_or(defaults.attempts_after_first),
            initial_backoff_ms: hints.backoff_ms.unwrap_or(defaults.initial_backoff_ms),
            factor: hints.factor.unwrap_or(defaults.factor),
        }
    }
}

/// A token dependency of a manifest service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenDep {
    /// Export name of the token on its module
    pub export_name: String,
    /// Public specifier consumers import the token from
    pub import_path: String,
}

/// A deferred dependency of a manifest service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeferredDep {
    /// Export name of the target service on its module
    pub export_name: String,
    /// Public specifier the deferred import will load
    pub import_path: String,
    /// Optional retry hints carried into the reconstructed wrapper
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryHints>,
}

/// One service listed by a manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestService {
    /// Exported class name
    pub export_name: String,
    /// Public specifier consumers will import the class from
    pub import_path: String,
    /// Canonical identifier key (`alloy:…`) minted by the library's build
    pub symbol_key: String,
    /// Lifetime mode
    #[serde(default)]
    pub scope: Scope,
    /// Names of eager dependencies, matched against discovered services
    #[serde(default)]
    pub deps: Vec<String>,
    /// Token dependencies
    #[serde(default)]
    pub token_deps: Vec<TokenDep>,
    /// Deferred dependencies
    #[serde(default)]
    pub deferred_deps: Vec<DeferredDep>,
}

/// A complete library manifest record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryManifest {
    /// Schema version; missing is tolerated and treated as 1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<u32>,
    /// Name of the package the manifest describes
    pub package_name: String,
    /// Module layout of the library's build
    pub build_mode: BuildMode,
    /// Services the library exposes
    #[serde(default)]
    pub services: Vec<ManifestService>,
    /// Module specifiers of user-supplied wiring modules
    #[serde(default)]
    pub providers: Vec<String>,
}

impl LibraryManifest {
    /// Validate the record against the schema.
    ///
    /// Callers skip (rather than abort on) invalid manifests; the typed
    /// error carries enough context for the skip diagnostic.
    pub fn validate(&self) -> Result<()> {
        if let Some(version) = self.schema_version {
            if version != MANIFEST_SCHEMA_VERSION {
                return Err(Error::invalid_manifest(format!(
                    "unsupported schema version {version} (expected {MANIFEST_SCHEMA_VERSION}) in manifest for `{}`",
                    self.package_name
                )));
            }
        }
        if self.package_name.is_empty() {
            return Err(Error::invalid_manifest("empty package name"));
        }
        for service in &self.services {
            if service.export_name.is_empty() {
                return Err(Error::invalid_manifest(format!(
                    "manifest for `{}` lists a service with an empty export name",
                    self.package_name
                )));
            }
            if service.import_path.is_empty() || service.symbol_key.is_empty() {
                return Err(Error::invalid_manifest(format!(
                    "service `{}` in manifest for `{}` is missing its import path or symbol key",
                    service.export_name, self.package_name
                )));
            }
        }
        Ok(())
    }
}
