//! Host-bundler adapter for the Alloy compiler.
//!
//! The thin layer between a bundler's plugin hooks and the compiler
//! pipeline: it loads configuration, subscribes to source-change events,
//! serves the synthesized virtual module, and writes ambient declaration
//! files. Everything interesting happens in `alloy-scanner` and
//! `alloy-compiler`; this crate is glue with a well-defined contract.

pub mod config;
pub mod logging;
pub mod plugin;

pub use config::{AlloyConfig, ConfigLoader, LoggingConfig};
pub use logging::init_logging;
pub use plugin::{AlloyPlugin, EmittedAsset, HostEmitter, DECLARATION_FILE_NAME, VIRTUAL_RESOLVED_ID};
