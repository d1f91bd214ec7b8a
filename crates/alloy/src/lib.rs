//! # Alloy
//!
//! A build-time dependency-injection compiler with a small resolution
//! runtime. The compiler statically scans project sources for
//! service-declaration annotations, merges the discoveries with manifests
//! from prebuilt libraries, reconciles eager vs. deferred dependency
//! edges, and synthesizes a virtual module that wires a runtime container.
//! The runtime enforces lifetimes, detects cycles, coalesces concurrent
//! singleton creation, and executes deferred imports with retry/backoff.
//!
//! This crate is the public facade; each layer lives in its own crate.
//!
//! ## Example
//!
//! ```
//! use alloy::scanner::{ScanContext, SourceScanner};
//!
//! let scanner = SourceScanner::new();
//! let context = ScanContext::new("app", "/project");
//! let scan = scanner
//!     .scan(
//!         "@Singleton()\nexport class Config {}\n",
//!         "/project/src/config.ts",
//!         &context,
//!     )
//!     .unwrap();
//! assert_eq!(scan.services[0].class_name, "Config");
//! ```
//!
//! ## Architecture
//!
//! - `domain` - data model, identifier keys, error types
//! - `scanner` - syntactic source scanning and the discovery store
//! - `compiler` - manifest ingestion, codegen, manifest emission
//! - `runtime` - registries, container, tokens, providers, test overlay
//! - `host` - bundler adapter, configuration, logging

/// Domain layer - data model and error types
///
/// Re-exports from the domain crate for convenience
pub mod domain {
    pub use alloy_domain::*;
}

/// Scanner layer - source scanning and the discovery store
///
/// Re-exports from the scanner crate for convenience
pub mod scanner {
    pub use alloy_scanner::*;
}

/// Compiler layer - manifest ingestion and codegen
///
/// Re-exports from the compiler crate for convenience
pub mod compiler {
    pub use alloy_compiler::*;
}

/// Runtime layer - the resolution container and registries
///
/// Re-exports from the runtime crate for convenience
pub mod runtime {
    pub use alloy_runtime::*;
}

/// Host layer - bundler adapter, configuration, logging
///
/// Re-exports from the host crate for convenience
pub mod host {
    pub use alloy_host::*;
}

pub use alloy_domain::{Error, Result};
