//! Testing overlay: registry snapshots, override wiring, auto-mocks.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use alloy_domain::Result;
use dashmap::DashMap;
use tracing::debug;

use crate::class::{CtorKey, Instance, ServiceClass, ServiceCtor};
use crate::container::Container;
use crate::deferred::ModuleExport;
use crate::node::{thunk_of, DependencyNode};
use crate::provider::{apply_providers, ProviderModule};
use crate::registry::{dependencies_registry, RegistrySnapshot, ServiceRegistration};
use crate::token::Token;

/// Call recorder for one mocked method.
#[derive(Clone, Default)]
pub struct Spy {
    calls: Arc<Mutex<Vec<String>>>,
}

impl Spy {
    /// Record one call with an argument summary
    pub fn record(&self, args: impl Into<String>) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(args.into());
        }
    }

    /// Number of recorded calls
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|calls| calls.len()).unwrap_or(0)
    }

    /// Recorded argument summaries, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }
}

/// A mock standing in for a service instance.
///
/// Its spy surface mirrors the mocked class's declared method surface;
/// methods not declared up front are spied on first use.
pub struct MockInstance {
    class_name: String,
    spies: DashMap<String, Spy>,
}

impl MockInstance {
    /// Mock mirroring a class's declared methods
    pub fn mirroring(ctor: &ServiceCtor) -> Arc<Self> {
        let spies = DashMap::new();
        for method in ctor.methods() {
            spies.insert(method.clone(), Spy::default());
        }
        Arc::new(Self {
            class_name: ctor.name().to_string(),
            spies,
        })
    }

    fn synthesized(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            class_name: name.into(),
            spies: DashMap::new(),
        })
    }

    /// Name of the mocked class
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Invoke a mocked method, recording the call
    pub fn invoke(&self, method: &str, args: impl Into<String>) {
        self.spies
            .entry(method.to_string())
            .or_default()
            .record(args);
    }

    /// The spy for a method, if any calls or declarations created one
    pub fn spy(&self, method: &str) -> Option<Spy> {
        self.spies.get(method).map(|spy| spy.value().clone())
    }

    /// Calls recorded against a method
    pub fn call_count(&self, method: &str) -> usize {
        self.spies
            .get(method)
            .map(|spy| spy.value().call_count())
            .unwrap_or(0)
    }
}

/// Builder for a test container.
#[derive(Default)]
pub struct TestContainerBuilder {
    token_overrides: Vec<(Token, Instance)>,
    instance_overrides: Vec<(ServiceCtor, Instance)>,
    target: Option<ServiceCtor>,
    providers: Vec<ProviderModule>,
}

impl TestContainerBuilder {
    /// Start a builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Override a token value
    pub fn override_token(mut self, token: Token, value: Instance) -> Self {
        self.token_overrides.push((token, value));
        self
    }

    /// Pin an instance for a constructor
    pub fn override_instance(mut self, ctor: ServiceCtor, instance: Instance) -> Self {
        self.instance_overrides.push((ctor, instance));
        self
    }

    /// Auto-mock every dependency reachable from `target`
    pub fn auto_mock(mut self, target: ServiceCtor) -> Self {
        self.target = Some(target);
        self
    }

    /// Apply a provider module before overrides
    pub fn provider(mut self, module: ProviderModule) -> Self {
        self.providers.push(module);
        self
    }

    /// Snapshot the registry, apply providers and overrides, install
    /// auto-mocks, and hand back the harness.
    pub fn build(self) -> Result<TestContainer> {
        let snapshot = dependencies_registry().snapshot();
        let container = Container::new();

        apply_providers(&container, &self.providers)?;
        for (token, value) in &self.token_overrides {
            container.provide_value(token, value.clone());
        }
        for (ctor, instance) in &self.instance_overrides {
            container.override_instance(ctor, instance.clone());
        }

        let mut mocks = HashMap::new();
        let mut deferred_mocks = Vec::new();
        if let Some(target) = &self.target {
            install_auto_mocks(&container, target, &mut mocks, &mut deferred_mocks);
        }

        Ok(TestContainer {
            container,
            snapshot,
            mocks,
            deferred_mocks,
        })
    }
}

/// Walk the dependency graph breadth-first from `target`, overriding every
/// constructor dependency with a mock and substituting every deferred
/// importer with one returning a synthesized mock class.
fn install_auto_mocks(
    container: &Container,
    target: &ServiceCtor,
    mocks: &mut HashMap<CtorKey, Arc<MockInstance>>,
    deferred_mocks: &mut Vec<Arc<MockInstance>>,
) {
    let mut queue: VecDeque<ServiceCtor> = VecDeque::from([target.clone()]);
    let mut seen: HashSet<CtorKey> = HashSet::new();

    while let Some(current) = queue.pop_front() {
        let key = CtorKey::of(&current);
        if !seen.insert(key.clone()) {
            continue;
        }
        let Some(registration) = dependencies_registry().get(&key) else {
            continue;
        };

        let nodes = (registration.dependencies)();
        let mut rewritten = Vec::with_capacity(nodes.len());
        let mut substituted_any = false;

        for node in nodes {
            match node {
                DependencyNode::Ctor(dep) => {
                    let dep_key = CtorKey::of(&dep);
                    let mock = mocks
                        .entry(dep_key)
                        .or_insert_with(|| MockInstance::mirroring(&dep))
                        .clone();
                    container.override_instance(&dep, mock as Instance);
                    queue.push_back(dep.clone());
                    rewritten.push(DependencyNode::Ctor(dep));
                }
                DependencyNode::Deferred(import) => {
                    let mock =
                        MockInstance::synthesized(format!("DeferredMock<{}>", current.name()));
                    deferred_mocks.push(mock.clone());
                    let served = mock.clone();
                    let substituted = import.with_importer(move || {
                        let instance = served.clone();
                        async move {
                            let body = instance.clone();
                            Ok(ModuleExport::Ctor(
                                ServiceClass::builder(instance.class_name())
                                    .construct(move |_| Ok(body.clone() as Instance))
                                    .build(),
                            ))
                        }
                    });
                    substituted_any = true;
                    rewritten.push(DependencyNode::Deferred(substituted));
                }
                other => rewritten.push(other),
            }
        }

        if substituted_any {
            dependencies_registry().set(
                &current,
                ServiceRegistration {
                    scope: registration.scope,
                    dependencies: thunk_of(rewritten),
                    factory: registration.factory.clone(),
                },
            );
        }
    }

    debug!(
        target: "alloy::runtime",
        mocked = mocks.len(),
        deferred = deferred_mocks.len(),
        "installed auto-mocks"
    );
}

/// A test container: an isolated [`Container`] plus the registry snapshot
/// taken before any test wiring was applied.
pub struct TestContainer {
    container: Container,
    snapshot: RegistrySnapshot,
    mocks: HashMap<CtorKey, Arc<MockInstance>>,
    deferred_mocks: Vec<Arc<MockInstance>>,
}

impl TestContainer {
    /// The container under test
    pub fn container(&self) -> &Container {
        &self.container
    }

    /// The mock installed for a constructor dependency
    pub fn mock_for(&self, ctor: &ServiceCtor) -> Option<Arc<MockInstance>> {
        self.mocks.get(&CtorKey::of(ctor)).cloned()
    }

    /// Mocks served through substituted deferred importers
    pub fn deferred_mocks(&self) -> &[Arc<MockInstance>] {
        &self.deferred_mocks
    }

    /// Restore the registry to its pre-snapshot state, undoing provider
    /// registrations and importer substitutions.
    pub fn restore(&self) {
        dependencies_registry().restore(&self.snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deferred::lazy;
    use crate::node::DependencyNode;
    use alloy_domain::Scope;

    fn leaf(name: &str, methods: &[&str]) -> ServiceCtor {
        ServiceClass::builder(name)
            .methods(methods.iter().copied())
            .construct(|_| Ok(Arc::new(()) as Instance))
            .build()
    }

    #[tokio::test]
    async fn auto_mock_overrides_constructor_dependencies() {
        let logger = leaf("Logger", &["info", "error"]);
        let subject = ServiceClass::builder("Subject")
            .construct(|deps| Ok(deps.into_iter().next().expect("mocked logger")))
            .build();
        dependencies_registry().set(
            &subject,
            ServiceRegistration::new(Scope::Transient)
                .with_dependencies(vec![DependencyNode::Ctor(logger.clone())]),
        );

        let harness = TestContainerBuilder::new()
            .auto_mock(subject.clone())
            .build()
            .unwrap();

        let resolved = harness.container().get(&subject).await.unwrap();
        let mock = resolved.downcast::<MockInstance>().expect("mock instance");
        mock.invoke("info", "hello");
        assert_eq!(mock.call_count("info"), 1);
        assert_eq!(mock.call_count("error"), 0);
        assert_eq!(
            harness.mock_for(&logger).unwrap().call_count("info"),
            1
        );

        dependencies_registry().remove(&CtorKey::of(&subject));
    }

    #[tokio::test]
    async fn auto_mock_substitutes_deferred_importers() {
        let subject = ServiceClass::builder("Subject")
            .construct(|deps| Ok(deps.into_iter().next().expect("deferred mock")))
            .build();
        let import = lazy(|| async { Err("would hit the network".into()) });
        dependencies_registry().set(
            &subject,
            ServiceRegistration::new(Scope::Transient)
                .with_dependencies(vec![DependencyNode::Deferred(import)]),
        );

        let harness = TestContainerBuilder::new()
            .auto_mock(subject.clone())
            .build()
            .unwrap();

        let resolved = harness.container().get(&subject).await.unwrap();
        assert!(resolved.downcast::<MockInstance>().is_ok());
        assert_eq!(harness.deferred_mocks().len(), 1);

        dependencies_registry().remove(&CtorKey::of(&subject));
    }
}
