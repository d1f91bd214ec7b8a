//! Syntactic source scanner and discovery store.
//!
//! The scanner builds an abstract syntax view over one TypeScript source
//! unit (tree-sitter; no type information, no evaluation) and extracts:
//!
//! - import bindings, including renames, namespaces, and `type` modifiers,
//! - class declarations annotated `@Injectable(...)` / `@Singleton(...)`,
//!   with their scope and positional dependency expressions,
//! - deferred-reference keys for every `Lazy(() => import(...))` call.
//!
//! Scanning is pure: the same source always yields byte-identical output.
//! The [`DiscoveryStore`] aggregates scan results per file and supports the
//! incremental update/remove cycle driven by the host bundler.

mod idents;
mod imports;
mod lazy_refs;
mod scanner;
mod store;

pub use scanner::{FileScan, ScanContext, SourceScanner, LAZY_WRAPPER, SPECIFIER_EXTENSIONS};
pub use store::{DiscoveryStore, RemovalOutcome, UpdateOutcome};
