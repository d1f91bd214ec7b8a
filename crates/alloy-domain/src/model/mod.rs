//! Value objects shared by the compiler pipeline and the runtime.

mod dependency;
mod manifest;
mod service;

pub use dependency::{DependencyDescriptor, RetryPolicy};
pub use manifest::{
    BuildMode, DeferredDep, LibraryManifest, ManifestService, RetryHints, TokenDep,
    MANIFEST_SCHEMA_VERSION,
};
pub use service::{DiscoveredService, ImportBinding, ImportedName, Scope, ServiceMetadata};
