//! Stable service identifiers: interned symbols and the constructor
//! bijection.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};

use alloy_domain::{Error, Result};
use dashmap::DashMap;

use crate::class::{CtorKey, ServiceCtor};

static NEXT_UNIQUE_ID: AtomicU64 = AtomicU64::new(1);

/// An opaque, minification-safe service identifier.
///
/// Identity is the `Arc` pointer. [`symbol_for`] interns by description, so
/// the same key yields the same identifier across independently generated
/// modules — the cross-module identity guarantee the compiler relies on.
#[derive(Clone)]
pub struct ServiceId(Arc<SymbolInner>);

struct SymbolInner {
    description: String,
    unique: u64,
}

impl ServiceId {
    /// A fresh, never-interned identifier (distinct from every other, even
    /// with an equal description)
    pub fn unique(description: impl Into<String>) -> Self {
        Self(Arc::new(SymbolInner {
            description: description.into(),
            unique: NEXT_UNIQUE_ID.fetch_add(1, Ordering::Relaxed),
        }))
    }

    /// The identifier's description
    pub fn description(&self) -> &str {
        &self.0.description
    }
}

impl PartialEq for ServiceId {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ServiceId {}

impl Hash for ServiceId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.unique.hash(state);
    }
}

impl fmt::Debug for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceId({})", self.0.description)
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.description)
    }
}

static SYMBOL_TABLE: LazyLock<DashMap<String, ServiceId>> = LazyLock::new(DashMap::new);

/// Intern an identifier by description — the `Symbol.for` of this runtime.
/// The same description always returns the same identifier.
pub fn symbol_for(description: &str) -> ServiceId {
    SYMBOL_TABLE
        .entry(description.to_string())
        .or_insert_with(|| ServiceId::unique(description))
        .clone()
}

/// Constructor ↔ identifier bijection. Both directions are injective;
/// rebinding an identifier to a different constructor is a typed fatal
/// error.
pub struct IdentifierRegistry {
    by_ctor: DashMap<CtorKey, ServiceId>,
    by_id: DashMap<ServiceId, CtorKey>,
}

impl IdentifierRegistry {
    /// Create an empty registry (tests; production uses the process-wide
    /// instance)
    pub fn new() -> Self {
        Self {
            by_ctor: DashMap::new(),
            by_id: DashMap::new(),
        }
    }

    /// Register a constructor, minting or confirming its identifier.
    ///
    /// Idempotent per constructor: re-registering yields the canonical
    /// identifier regardless of `explicit`. An explicit identifier already
    /// bound to a different constructor is an
    /// [`Error::IdentifierConflict`].
    pub fn register(&self, ctor: &ServiceCtor, explicit: Option<ServiceId>) -> Result<ServiceId> {
        let key = CtorKey::of(ctor);
        if let Some(existing) = self.by_ctor.get(&key) {
            return Ok(existing.value().clone());
        }

        let id = explicit.unwrap_or_else(|| ServiceId::unique(ctor.name()));
        if let Some(bound) = self.by_id.get(&id) {
            if bound.value() != &key {
                return Err(Error::identifier_conflict(
                    id.description(),
                    bound.value().name(),
                    ctor.name(),
                ));
            }
        }

        self.by_ctor.insert(key.clone(), id.clone());
        self.by_id.insert(id.clone(), key);
        Ok(id)
    }

    /// The constructor bound to an identifier
    pub fn constructor_for(&self, id: &ServiceId) -> Option<ServiceCtor> {
        self.by_id.get(id).map(|key| key.value().ctor().clone())
    }

    /// The canonical identifier of a constructor
    pub fn identifier_of(&self, ctor: &ServiceCtor) -> Option<ServiceId> {
        self.by_ctor
            .get(&CtorKey::of(ctor))
            .map(|id| id.value().clone())
    }

    /// Drop every binding (test hook)
    pub fn clear(&self) {
        self.by_ctor.clear();
        self.by_id.clear();
    }
}

impl Default for IdentifierRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static IDENTIFIERS: LazyLock<IdentifierRegistry> = LazyLock::new(IdentifierRegistry::new);

/// The process-wide identifier registry.
pub fn identifier_registry() -> &'static IdentifierRegistry {
    &IDENTIFIERS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::{Instance, ServiceClass};

    fn ctor(name: &str) -> ServiceCtor {
        ServiceClass::builder(name)
            .construct(|_| Ok(Arc::new(()) as Instance))
            .build()
    }

    #[test]
    fn symbol_for_interns_by_description() {
        let a = symbol_for("alloy:app/src/a.ts#A");
        let b = symbol_for("alloy:app/src/a.ts#A");
        assert_eq!(a, b);
        assert_ne!(a, ServiceId::unique("alloy:app/src/a.ts#A"));
    }

    #[test]
    fn register_is_idempotent_per_constructor() {
        let registry = IdentifierRegistry::new();
        let a = ctor("A");
        let first = registry.register(&a, None).unwrap();
        let second = registry.register(&a, None).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            registry
                .constructor_for(&first)
                .map(|c| CtorKey::of(&c)),
            Some(CtorKey::of(&a))
        );
    }

    #[test]
    fn rebinding_an_identifier_is_fatal() {
        let registry = IdentifierRegistry::new();
        let id = ServiceId::unique("alloy:app/src/a.ts#A");
        registry.register(&ctor("A"), Some(id.clone())).unwrap();
        let err = registry.register(&ctor("B"), Some(id)).unwrap_err();
        assert!(matches!(err, Error::IdentifierConflict { .. }));
    }
}
