//! The container: lifetime-aware service resolution.

use std::sync::Arc;

use alloy_domain::{Error, Result, Scope};
use dashmap::DashMap;
use futures::future::{try_join_all, BoxFuture, Shared};
use futures::FutureExt;
use tracing::warn;

use crate::class::{CtorKey, Instance, ServiceCtor};
use crate::identifier::{identifier_registry, ServiceId};
use crate::node::DependencyNode;
use crate::registry::{dependencies_registry, ServiceRegistration};
use crate::token::Token;

type SharedCreation = Shared<BoxFuture<'static, std::result::Result<Instance, Arc<Error>>>>;

/// Named resolution stack, for cycle detection and error context.
#[derive(Clone, Default)]
struct ResolutionStack {
    frames: Vec<CtorKey>,
}

impl ResolutionStack {
    fn contains(&self, key: &CtorKey) -> bool {
        self.frames.iter().any(|frame| frame == key)
    }

    fn pushed(&self, key: CtorKey) -> Self {
        let mut frames = self.frames.clone();
        frames.push(key);
        Self { frames }
    }

    fn display(&self) -> String {
        if self.frames.is_empty() {
            return "(root)".to_string();
        }
        self.frames
            .iter()
            .map(CtorKey::name)
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    fn cycle_path(&self, target: &CtorKey) -> String {
        format!("{} -> {}", self.display(), target.name())
    }
}

#[derive(Default)]
struct ContainerInner {
    singletons: DashMap<CtorKey, Instance>,
    pending: DashMap<CtorKey, SharedCreation>,
    overrides: DashMap<CtorKey, Instance>,
    tokens: DashMap<Token, Instance>,
    factory_warned: DashMap<CtorKey, ()>,
    metadata: DashMap<CtorKey, ServiceRegistration>,
    // Importer identity -> fetched constructor, kept only for singleton
    // targets: their instance is pinned anyway, so re-importing buys
    // nothing. Transient targets re-run the importer per resolution.
    deferred_singletons: DashMap<usize, ServiceCtor>,
}

/// A resolution container.
///
/// Cheap to clone (shared interior); singleton cache, pending-creation
/// slots, instance overrides, token values, and the metadata memo are all
/// container-scoped. Metadata itself comes from the process-wide
/// [`dependencies_registry`].
#[derive(Clone, Default)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

impl Container {
    /// Create a container
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a service by constructor.
    pub async fn get(&self, ctor: &ServiceCtor) -> Result<Instance> {
        self.resolve(ctor.clone(), ResolutionStack::default(), false)
            .await
    }

    /// Resolve a service by stable identifier.
    ///
    /// Fails with `no-service` when the identifier is unbound. This entry
    /// point never triggers the factory-path warning.
    pub async fn get_by_identifier(&self, id: &ServiceId) -> Result<Instance> {
        let ctor = identifier_registry()
            .constructor_for(id)
            .ok_or_else(|| Error::no_service(id.description()))?;
        self.resolve(ctor, ResolutionStack::default(), true).await
    }

    /// Record a value for a token.
    pub fn provide_value(&self, token: &Token, value: Instance) {
        self.inner.tokens.insert(token.clone(), value);
    }

    /// Read a token value; fails with `missing-token` if absent.
    pub fn get_token(&self, token: &Token) -> Result<Instance> {
        self.inner
            .tokens
            .get(token)
            .map(|value| value.value().clone())
            .ok_or_else(|| Error::missing_token(token.description(), "(root)"))
    }

    /// Pin an instance for a constructor. Resolution returns it without
    /// constructing dependencies; the singleton slot is marked too.
    pub fn override_instance(&self, ctor: &ServiceCtor, instance: Instance) {
        let key = CtorKey::of(ctor);
        self.inner.overrides.insert(key.clone(), instance.clone());
        self.inner.singletons.insert(key, instance);
    }

    fn metadata_of(&self, key: &CtorKey) -> ServiceRegistration {
        if let Some(cached) = self.inner.metadata.get(key) {
            return cached.value().clone();
        }
        match dependencies_registry().get(key) {
            Some(found) => {
                self.inner.metadata.insert(key.clone(), found.clone());
                found
            }
            // Unregistered constructors resolve with defaults; the miss is
            // not memoized so late registration is still observed.
            None => ServiceRegistration::new(Scope::Transient),
        }
    }

    fn resolve(
        &self,
        ctor: ServiceCtor,
        stack: ResolutionStack,
        via_identifier: bool,
    ) -> BoxFuture<'static, Result<Instance>> {
        let container = self.clone();
        async move {
            let key = CtorKey::of(&ctor);

            if let Some(instance) = container.inner.overrides.get(&key) {
                return Ok(instance.value().clone());
            }
            if stack.contains(&key) {
                return Err(Error::circular_dependency(stack.cycle_path(&key)));
            }

            let registration = container.metadata_of(&key);
            if registration.scope == Scope::Singleton {
                if let Some(hit) = container.inner.singletons.get(&key) {
                    return Ok(hit.value().clone());
                }
                let creation = container
                    .inner
                    .pending
                    .entry(key.clone())
                    .or_insert_with(|| {
                        container.creation_future(
                            ctor.clone(),
                            key.clone(),
                            registration.clone(),
                            stack.clone(),
                            via_identifier,
                        )
                    })
                    .clone();
                return creation.await.map_err(|shared| clone_error(&shared));
            }

            container
                .create(ctor, key, registration, stack, via_identifier)
                .await
        }
        .boxed()
    }

    /// One shared creation future per singleton key: every concurrent
    /// waiter observes the same construction. The future itself publishes
    /// to the cache and clears the pending slot, so a failure never
    /// poisons the slot.
    fn creation_future(
        &self,
        ctor: ServiceCtor,
        key: CtorKey,
        registration: ServiceRegistration,
        stack: ResolutionStack,
        via_identifier: bool,
    ) -> SharedCreation {
        let container = self.clone();
        async move {
            match container
                .create(ctor, key.clone(), registration, stack, via_identifier)
                .await
            {
                Ok(instance) => {
                    container.inner.singletons.insert(key.clone(), instance.clone());
                    container.inner.pending.remove(&key);
                    Ok(instance)
                }
                Err(err) => {
                    container.inner.pending.remove(&key);
                    Err(Arc::new(err))
                }
            }
        }
        .boxed()
        .shared()
    }

    async fn create(
        &self,
        ctor: ServiceCtor,
        key: CtorKey,
        registration: ServiceRegistration,
        stack: ResolutionStack,
        via_identifier: bool,
    ) -> Result<Instance> {
        let stack = stack.pushed(key.clone());

        let effective = match &registration.factory {
            Some(factory) => {
                if !via_identifier
                    && !ctor.is_provider_placeholder()
                    && self.inner.factory_warned.insert(key, ()).is_none()
                {
                    warn!(
                        target: "alloy::runtime",
                        class = ctor.name(),
                        "factory-backed service resolved via its placeholder constructor; \
                         prefer the identifier entry point"
                    );
                }
                factory.fetch(&stack.display()).await?
            }
            None => ctor,
        };

        // Dependencies resolve concurrently; positional order of the
        // resolved values matches declaration order regardless of
        // interleaving.
        let nodes = (registration.dependencies)();
        let pending = nodes
            .into_iter()
            .map(|node| self.resolve_node(node, stack.clone()));
        let values = try_join_all(pending).await?;

        effective.construct(values)
    }

    fn resolve_node(
        &self,
        node: DependencyNode,
        stack: ResolutionStack,
    ) -> BoxFuture<'static, Result<Instance>> {
        let container = self.clone();
        async move {
            match node {
                DependencyNode::Ctor(ctor) => container.resolve(ctor, stack, false).await,
                DependencyNode::Token(token) => container
                    .inner
                    .tokens
                    .get(&token)
                    .map(|value| value.value().clone())
                    .ok_or_else(|| Error::missing_token(token.description(), stack.display())),
                DependencyNode::Deferred(import) => {
                    let identity = import.importer_identity();
                    if let Some(known) = container
                        .inner
                        .deferred_singletons
                        .get(&identity)
                        .map(|entry| entry.value().clone())
                    {
                        return container.resolve(known, stack, false).await;
                    }
                    let real = import.fetch(&stack.display()).await?;
                    if container.metadata_of(&CtorKey::of(&real)).scope == Scope::Singleton {
                        container
                            .inner
                            .deferred_singletons
                            .insert(identity, real.clone());
                    }
                    container.resolve(real, stack, false).await
                }
                DependencyNode::Opaque { type_tag } => {
                    Err(Error::invalid_dependency(type_tag, stack.display()))
                }
            }
        }
        .boxed()
    }
}

/// Structural copy of a runtime error, used when a shared creation future
/// fans one failure out to several waiters. Source causes survive as their
/// rendered message.
fn clone_error(err: &Error) -> Error {
    match err {
        Error::CircularDependency { path } => Error::circular_dependency(path.clone()),
        Error::MissingToken { token, path } => Error::missing_token(token.clone(), path.clone()),
        Error::InvalidDependency { type_tag, path } => {
            Error::invalid_dependency(type_tag.clone(), path.clone())
        }
        Error::DeferredImportFailed { attempts, path, source } => {
            Error::deferred_import_failed(*attempts, path.clone(), source.to_string().into())
        }
        Error::NotAClass { resolved, path } => Error::not_a_class(resolved.clone(), path.clone()),
        Error::NoService { identifier } => Error::no_service(identifier.clone()),
        Error::PlaceholderInstantiated { class_name } => {
            Error::placeholder_instantiated(class_name.clone())
        }
        Error::Construction { class_name, message } => {
            Error::construction(class_name.clone(), message.clone())
        }
        other => Error::internal(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ServiceClass;
    use crate::registry::ServiceRegistration;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn leaf(name: &str) -> ServiceCtor {
        ServiceClass::builder(name)
            .construct(|_| Ok(Arc::new(()) as Instance))
            .build()
    }

    #[tokio::test]
    async fn singleton_resolves_to_the_same_instance() {
        let a = leaf("A");
        dependencies_registry().set(&a, ServiceRegistration::new(Scope::Singleton));
        let container = Container::new();
        let first = container.get(&a).await.unwrap();
        let second = container.get(&a).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        dependencies_registry().remove(&CtorKey::of(&a));
    }

    #[tokio::test]
    async fn transient_resolves_fresh_instances() {
        let a = leaf("A");
        dependencies_registry().set(&a, ServiceRegistration::new(Scope::Transient));
        let container = Container::new();
        let first = container.get(&a).await.unwrap();
        let second = container.get(&a).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        dependencies_registry().remove(&CtorKey::of(&a));
    }

    #[tokio::test]
    async fn unregistered_constructors_default_to_transient_no_deps() {
        let container = Container::new();
        let a = leaf("A");
        assert!(container.get(&a).await.is_ok());
    }

    #[tokio::test]
    async fn constructor_receives_positional_dependency_values() {
        let a = leaf("A");
        let b = ServiceClass::builder("B")
            .construct(|deps| {
                assert_eq!(deps.len(), 2);
                Ok(Arc::new(deps.len()) as Instance)
            })
            .build();
        let token = crate::token::create_token(Some("url"));
        dependencies_registry().set(
            &b,
            ServiceRegistration::new(Scope::Transient).with_dependencies(vec![
                DependencyNode::Ctor(a.clone()),
                DependencyNode::Token(token.clone()),
            ]),
        );
        let container = Container::new();
        container.provide_value(&token, Arc::new("postgres://".to_string()) as Instance);
        let instance = container.get(&b).await.unwrap();
        assert_eq!(*instance.downcast::<usize>().unwrap(), 2);
        dependencies_registry().remove(&CtorKey::of(&b));
    }

    #[tokio::test]
    async fn cycle_is_reported_with_the_named_path() {
        let a = leaf("A");
        let b = leaf("B");
        dependencies_registry().set(
            &a,
            ServiceRegistration::new(Scope::Transient)
                .with_dependencies(vec![DependencyNode::Ctor(b.clone())]),
        );
        dependencies_registry().set(
            &b,
            ServiceRegistration::new(Scope::Transient)
                .with_dependencies(vec![DependencyNode::Ctor(a.clone())]),
        );
        let container = Container::new();
        let err = container.get(&a).await.unwrap_err();
        match err {
            Error::CircularDependency { path } => assert_eq!(path, "A -> B -> A"),
            other => panic!("unexpected error: {other}"),
        }
        dependencies_registry().remove(&CtorKey::of(&a));
        dependencies_registry().remove(&CtorKey::of(&b));
    }

    #[tokio::test]
    async fn missing_token_fails_resolution() {
        let token = crate::token::create_token(Some("missing"));
        let a = ServiceClass::builder("A")
            .construct(|_| Ok(Arc::new(()) as Instance))
            .build();
        dependencies_registry().set(
            &a,
            ServiceRegistration::new(Scope::Transient)
                .with_dependencies(vec![DependencyNode::Token(token)]),
        );
        let container = Container::new();
        let err = container.get(&a).await.unwrap_err();
        assert!(matches!(err, Error::MissingToken { .. }));
        dependencies_registry().remove(&CtorKey::of(&a));
    }

    #[tokio::test]
    async fn opaque_dependencies_fail_with_their_type_tag() {
        let a = leaf("A");
        dependencies_registry().set(
            &a,
            ServiceRegistration::new(Scope::Transient).with_dependencies(vec![
                DependencyNode::Opaque {
                    type_tag: "number".to_string(),
                },
            ]),
        );
        let container = Container::new();
        match container.get(&a).await.unwrap_err() {
            Error::InvalidDependency { type_tag, .. } => assert_eq!(type_tag, "number"),
            other => panic!("unexpected error: {other}"),
        }
        dependencies_registry().remove(&CtorKey::of(&a));
    }

    #[tokio::test]
    async fn concurrent_singleton_gets_coalesce_to_one_construction() {
        static BUILDS: AtomicU32 = AtomicU32::new(0);
        let slow = ServiceClass::builder("Slow")
            .construct(|_| {
                BUILDS.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(()) as Instance)
            })
            .build();
        dependencies_registry().set(&slow, ServiceRegistration::new(Scope::Singleton));
        let container = Container::new();
        let (first, second, third) = tokio::join!(
            container.get(&slow),
            container.get(&slow),
            container.get(&slow)
        );
        let first = first.unwrap();
        assert!(Arc::ptr_eq(&first, &second.unwrap()));
        assert!(Arc::ptr_eq(&first, &third.unwrap()));
        assert_eq!(BUILDS.load(Ordering::SeqCst), 1);
        dependencies_registry().remove(&CtorKey::of(&slow));
    }

    #[tokio::test]
    async fn failed_singleton_creation_does_not_poison_the_slot() {
        static ATTEMPTS: AtomicU32 = AtomicU32::new(0);
        let flaky = ServiceClass::builder("Flaky")
            .construct(|_| {
                if ATTEMPTS.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(Error::construction("Flaky", "first build fails"))
                } else {
                    Ok(Arc::new(()) as Instance)
                }
            })
            .build();
        dependencies_registry().set(&flaky, ServiceRegistration::new(Scope::Singleton));
        let container = Container::new();
        assert!(container.get(&flaky).await.is_err());
        assert!(container.get(&flaky).await.is_ok());
        dependencies_registry().remove(&CtorKey::of(&flaky));
    }

    #[tokio::test]
    async fn override_instance_short_circuits_resolution() {
        let a = leaf("A");
        let container = Container::new();
        let pinned = Arc::new("pinned".to_string()) as Instance;
        container.override_instance(&a, pinned.clone());
        let resolved = container.get(&a).await.unwrap();
        assert!(Arc::ptr_eq(&resolved, &pinned));
    }

    #[tokio::test]
    async fn get_by_identifier_fails_for_unbound_ids() {
        let container = Container::new();
        let unbound = crate::identifier::ServiceId::unique("alloy:app/x.ts#X");
        let err = container.get_by_identifier(&unbound).await.unwrap_err();
        assert!(matches!(err, Error::NoService { .. }));
    }
}
