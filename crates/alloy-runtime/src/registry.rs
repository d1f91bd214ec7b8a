//! The process-wide dependencies registry.

use std::sync::LazyLock;

use alloy_domain::Scope;
use dashmap::DashMap;

use crate::class::{CtorKey, ServiceCtor};
use crate::deferred::DeferredImport;
use crate::node::{thunk_of, DependencyNode, DepsThunk};

/// Per-constructor registration: lifetime, dependency thunk, optional
/// factory.
#[derive(Clone)]
pub struct ServiceRegistration {
    /// Lifetime mode
    pub scope: Scope,
    /// Lazily evaluated dependency list
    pub dependencies: DepsThunk,
    /// Deferred import fetching the real constructor (service-level
    /// deferral); the registered constructor stays the placeholder
    pub factory: Option<DeferredImport>,
}

impl ServiceRegistration {
    /// Registration with no dependencies
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            dependencies: thunk_of(Vec::new()),
            factory: None,
        }
    }

    /// Set the dependency list (eagerly materialized)
    pub fn with_dependencies(mut self, nodes: Vec<DependencyNode>) -> Self {
        self.dependencies = thunk_of(nodes);
        self
    }

    /// Set the dependency thunk (closure form; evaluated at resolution)
    pub fn with_dependencies_thunk(mut self, thunk: DepsThunk) -> Self {
        self.dependencies = thunk;
        self
    }

    /// Attach a factory descriptor
    pub fn with_factory(mut self, factory: DeferredImport) -> Self {
        self.factory = Some(factory);
        self
    }
}

/// Complete copy of the registry state, for snapshot/restore.
#[derive(Clone, Default)]
pub struct RegistrySnapshot {
    entries: Vec<(CtorKey, ServiceRegistration)>,
}

impl RegistrySnapshot {
    /// Number of registrations captured
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the snapshot is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Mapping from constructor identity to its registration.
///
/// Process-wide: generated modules, provider application, and tests all
/// write into the same registry. Containers read from it (memoized per
/// container).
pub struct DependenciesRegistry {
    entries: DashMap<CtorKey, ServiceRegistration>,
}

impl DependenciesRegistry {
    /// Create an empty registry (tests; production uses the process-wide
    /// instance)
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Insert or replace a registration
    pub fn set(&self, ctor: &ServiceCtor, registration: ServiceRegistration) {
        self.entries.insert(CtorKey::of(ctor), registration);
    }

    /// Look up a registration
    pub fn get(&self, key: &CtorKey) -> Option<ServiceRegistration> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Remove a registration
    pub fn remove(&self, key: &CtorKey) -> Option<ServiceRegistration> {
        self.entries.remove(key).map(|(_, registration)| registration)
    }

    /// Number of registrations
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every registration (test hook)
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Capture the complete current state
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            entries: self
                .entries
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().clone()))
                .collect(),
        }
    }

    /// Replace the complete state with a snapshot
    pub fn restore(&self, snapshot: &RegistrySnapshot) {
        self.entries.clear();
        for (key, registration) in &snapshot.entries {
            self.entries.insert(key.clone(), registration.clone());
        }
    }
}

impl Default for DependenciesRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static REGISTRY: LazyLock<DependenciesRegistry> = LazyLock::new(DependenciesRegistry::new);

/// The process-wide dependencies registry.
pub fn dependencies_registry() -> &'static DependenciesRegistry {
    &REGISTRY
}
