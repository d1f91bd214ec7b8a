//! Resolution runtime for Alloy.
//!
//! The generated virtual module (or a test) populates the process-wide
//! [`DependenciesRegistry`] with per-constructor metadata, then resolves
//! services through a [`Container`]. The container enforces lifetimes
//! (singleton/transient), detects cycles, coalesces concurrent singleton
//! creation onto one future, executes deferred imports with exponential
//! retry, and serves token values.
//!
//! Constructor identity is a first-class value here: a [`ServiceClass`]
//! behind an `Arc`, with pointer identity ([`CtorKey`]) as the map key —
//! the runtime never inspects types, only identities.
//!
//! The scheduling model is cooperative: suspension happens only when
//! awaiting a deferred importer, a pending singleton creation, or a retry
//! backoff sleep.

mod class;
mod container;
mod deferred;
mod identifier;
mod node;
mod provider;
mod registry;
pub mod testing;
mod token;

pub use class::{CtorKey, Instance, ServiceClass, ServiceClassBuilder, ServiceCtor};
pub use container::Container;
pub use deferred::{lazy, DeferredImport, ImportFailure, ModuleExport};
pub use identifier::{identifier_registry, symbol_for, IdentifierRegistry, ServiceId};
pub use node::{thunk_of, DependencyNode, DepsThunk};
pub use provider::{
    apply_providers, DeferredProviderService, ProviderDeps, ProviderModule, ProviderService,
    ProviderValue,
};
pub use registry::{
    dependencies_registry, DependenciesRegistry, RegistrySnapshot, ServiceRegistration,
};
pub use token::{create_token, Token};

pub use alloy_domain::{Error, Result, RetryPolicy, Scope};
