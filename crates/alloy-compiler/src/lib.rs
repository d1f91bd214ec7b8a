//! The Alloy compiler: manifest ingestion and virtual-module synthesis.
//!
//! Takes the Discovery Store's scan output plus declarative manifests from
//! prebuilt libraries, reconciles eager vs. deferred references, and emits
//! the `virtual:alloy-container` wiring module together with its ambient
//! type declarations. Codegen is a pure function of its inputs: the same
//! input always yields byte-identical output.

pub mod codegen;
pub mod declarations;
pub mod emit;
pub mod ingest;

pub use codegen::{generate, CodegenInput, CodegenOutput, RUNTIME_SPECIFIER, VIRTUAL_MODULE_ID};
pub use emit::{
    emit_manifest, ManifestEmitInput, ManifestEmitOutput, IDENTIFIERS_FILE_NAME,
    MANIFEST_FILE_NAME,
};
pub use ingest::{ingest_manifests, IngestOutput};
