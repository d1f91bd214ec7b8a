//! Core data model for the Alloy dependency-injection compiler.
//!
//! This crate holds the types shared by the compiler pipeline (scanner,
//! manifest ingestor, codegen) and the resolution runtime: dependency
//! descriptors, service metadata, discovered services, library manifests,
//! identifier keys, and the unified error type.
//!
//! Nothing in here touches the filesystem or spawns tasks; the domain layer
//! is plain data plus the invariants encoded in its constructors.

pub mod error;
pub mod keys;
pub mod model;

pub use error::{Error, Result};
pub use keys::{
    deferred_key, identifier_key, is_bare_specifier, normalize_specifier, parse_identifier_key,
    resolve_relative, IdentifierKeyParts, IDENTIFIER_KEY_PREFIX,
};
pub use model::{
    BuildMode, DeferredDep, DependencyDescriptor, DiscoveredService, ImportBinding, ImportedName,
    LibraryManifest, ManifestService, RetryHints, RetryPolicy, Scope, ServiceMetadata, TokenDep,
    MANIFEST_SCHEMA_VERSION,
};
