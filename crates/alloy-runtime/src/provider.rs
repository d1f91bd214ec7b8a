//! Provider modules: user-supplied wiring applied after the generated
//! registrations.

use std::collections::HashSet;

use alloy_domain::{Error, Result, Scope};
use tracing::debug;

use crate::class::{CtorKey, Instance, ServiceCtor};
use crate::container::Container;
use crate::deferred::DeferredImport;
use crate::node::{DependencyNode, DepsThunk};
use crate::registry::{dependencies_registry, ServiceRegistration};
use crate::token::Token;

/// Dependencies of a provider-declared service.
///
/// The array form is inspected by the cycle pre-check; the closure form is
/// deliberately not evaluated during application, so self-referential
/// wiring declared in one module cannot observe half-initialized bindings.
#[derive(Clone)]
pub enum ProviderDeps {
    /// Materialized dependency list
    List(Vec<DependencyNode>),
    /// Deferred-evaluation thunk
    Thunk(DepsThunk),
}

impl ProviderDeps {
    fn into_thunk(self) -> DepsThunk {
        match self {
            ProviderDeps::List(nodes) => crate::node::thunk_of(nodes),
            ProviderDeps::Thunk(thunk) => thunk,
        }
    }
}

/// A token value bound by a provider.
pub struct ProviderValue {
    /// The token to bind
    pub token: Token,
    /// The bound value
    pub value: Instance,
}

/// A service registered by a provider.
pub struct ProviderService {
    /// The service constructor
    pub ctor: ServiceCtor,
    /// Lifetime mode
    pub scope: Scope,
    /// Dependency declaration
    pub dependencies: ProviderDeps,
}

/// A deferred service registered by a provider: a placeholder constructor
/// plus the factory that fetches the real class.
pub struct DeferredProviderService {
    /// Placeholder carrying the service identity
    pub placeholder: ServiceCtor,
    /// Lifetime mode
    pub scope: Scope,
    /// Factory import fetching the real constructor
    pub factory: DeferredImport,
    /// Dependency declaration
    pub dependencies: ProviderDeps,
}

/// One wiring module: values, services, deferred services.
#[derive(Default)]
pub struct ProviderModule {
    /// Token values; bound before any metadata is written
    pub values: Vec<ProviderValue>,
    /// Eager service registrations
    pub services: Vec<ProviderService>,
    /// Deferred service registrations
    pub deferred_services: Vec<DeferredProviderService>,
}

impl ProviderModule {
    /// Create an empty module
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a token value
    pub fn value(mut self, token: Token, value: Instance) -> Self {
        self.values.push(ProviderValue { token, value });
        self
    }

    /// Register a service
    pub fn service(mut self, ctor: ServiceCtor, scope: Scope, dependencies: ProviderDeps) -> Self {
        self.services.push(ProviderService {
            ctor,
            scope,
            dependencies,
        });
        self
    }

    /// Register a deferred service
    pub fn deferred_service(
        mut self,
        placeholder: ServiceCtor,
        scope: Scope,
        factory: DeferredImport,
        dependencies: ProviderDeps,
    ) -> Self {
        self.deferred_services.push(DeferredProviderService {
            placeholder,
            scope,
            factory,
            dependencies,
        });
        self
    }
}

/// Apply provider modules in order.
///
/// Values bind first (to the container's token map); service and
/// deferred-service entries then write metadata into the process-wide
/// registry. A synchronous depth-first pass over array-form dependency
/// lists detects cycles through provider-declared constructors before any
/// of them is resolvable.
pub fn apply_providers(container: &Container, modules: &[ProviderModule]) -> Result<()> {
    for module in modules {
        for value in &module.values {
            container.provide_value(&value.token, value.value.clone());
        }
    }

    precheck_cycles(modules)?;

    for module in modules {
        for service in &module.services {
            dependencies_registry().set(
                &service.ctor,
                ServiceRegistration {
                    scope: service.scope,
                    dependencies: service.dependencies.clone().into_thunk(),
                    factory: None,
                },
            );
        }
        for deferred in &module.deferred_services {
            dependencies_registry().set(
                &deferred.placeholder,
                ServiceRegistration {
                    scope: deferred.scope,
                    dependencies: deferred.dependencies.clone().into_thunk(),
                    factory: Some(deferred.factory.clone()),
                },
            );
        }
        debug!(
            target: "alloy::runtime",
            values = module.values.len(),
            services = module.services.len(),
            deferred = module.deferred_services.len(),
            "applied provider module"
        );
    }
    Ok(())
}

/// Depth-first cycle detection over array-form dependency lists.
///
/// Closure-form lists are skipped on purpose: evaluating them here would
/// break startup ordering. Cycles hidden behind closures are still caught
/// at resolution time by the container.
fn precheck_cycles(modules: &[ProviderModule]) -> Result<()> {
    let mut edges: Vec<(CtorKey, Vec<CtorKey>)> = Vec::new();
    for module in modules {
        for service in &module.services {
            if let ProviderDeps::List(nodes) = &service.dependencies {
                let deps = nodes
                    .iter()
                    .filter_map(|node| match node {
                        DependencyNode::Ctor(ctor) => Some(CtorKey::of(ctor)),
                        _ => None,
                    })
                    .collect();
                edges.push((CtorKey::of(&service.ctor), deps));
            }
        }
        for deferred in &module.deferred_services {
            if let ProviderDeps::List(nodes) = &deferred.dependencies {
                let deps = nodes
                    .iter()
                    .filter_map(|node| match node {
                        DependencyNode::Ctor(ctor) => Some(CtorKey::of(ctor)),
                        _ => None,
                    })
                    .collect();
                edges.push((CtorKey::of(&deferred.placeholder), deps));
            }
        }
    }

    let lookup = |key: &CtorKey| -> Option<&Vec<CtorKey>> {
        edges
            .iter()
            .find(|(candidate, _)| candidate == key)
            .map(|(_, deps)| deps)
    };

    for (root, _) in &edges {
        let mut path: Vec<CtorKey> = Vec::new();
        let mut visited: HashSet<usize> = HashSet::new();
        if let Some(cycle) = dfs(root, &lookup, &mut path, &mut visited) {
            return Err(Error::circular_dependency(cycle));
        }
    }
    Ok(())
}

fn dfs<'a>(
    node: &CtorKey,
    lookup: &impl Fn(&CtorKey) -> Option<&'a Vec<CtorKey>>,
    path: &mut Vec<CtorKey>,
    visited: &mut HashSet<usize>,
) -> Option<String> {
    if path.contains(node) {
        let names: Vec<&str> = path.iter().map(CtorKey::name).collect();
        return Some(format!("{} -> {}", names.join(" -> "), node.name()));
    }
    let marker = std::sync::Arc::as_ptr(node.ctor()) as usize;
    if !visited.insert(marker) {
        return None;
    }
    let Some(deps) = lookup(node) else {
        return None;
    };
    path.push(node.clone());
    for dep in deps {
        if let Some(cycle) = dfs(dep, lookup, path, visited) {
            return Some(cycle);
        }
    }
    path.pop();
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ServiceClass;
    use std::sync::Arc;

    fn leaf(name: &str) -> ServiceCtor {
        ServiceClass::builder(name)
            .construct(|_| Ok(Arc::new(()) as Instance))
            .build()
    }

    #[tokio::test]
    async fn values_bind_before_services() {
        let token = crate::token::create_token(Some("answer"));
        let service = ServiceClass::builder("Reader")
            .construct(|deps| Ok(deps.into_iter().next().expect("token value")))
            .build();
        let module = ProviderModule::new()
            .value(token.clone(), Arc::new(42u32) as Instance)
            .service(
                service.clone(),
                Scope::Transient,
                ProviderDeps::List(vec![DependencyNode::Token(token.clone())]),
            );

        let container = Container::new();
        apply_providers(&container, &[module]).unwrap();
        let resolved = container.get(&service).await.unwrap();
        assert_eq!(*resolved.downcast::<u32>().unwrap(), 42);
        dependencies_registry().remove(&CtorKey::of(&service));
    }

    #[test]
    fn array_form_cycles_are_reported_at_application() {
        let a = leaf("A");
        let b = leaf("B");
        let module = ProviderModule::new()
            .service(
                a.clone(),
                Scope::Transient,
                ProviderDeps::List(vec![DependencyNode::Ctor(b.clone())]),
            )
            .service(
                b.clone(),
                Scope::Transient,
                ProviderDeps::List(vec![DependencyNode::Ctor(a.clone())]),
            );
        let container = Container::new();
        let err = apply_providers(&container, &[module]).unwrap_err();
        assert!(matches!(err, Error::CircularDependency { .. }));
    }

    #[test]
    fn closure_form_lists_are_not_evaluated_during_application() {
        let a = leaf("A");
        let evaluated = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = Arc::clone(&evaluated);
        let module = ProviderModule::new().service(
            a.clone(),
            Scope::Transient,
            ProviderDeps::Thunk(Arc::new(move || {
                flag.store(true, std::sync::atomic::Ordering::SeqCst);
                Vec::new()
            })),
        );
        let container = Container::new();
        apply_providers(&container, &[module]).unwrap();
        assert!(!evaluated.load(std::sync::atomic::Ordering::SeqCst));
        dependencies_registry().remove(&CtorKey::of(&a));
    }
}
