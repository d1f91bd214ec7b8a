//! End-to-end resolution scenarios against the process-wide registry.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy_runtime::{
    dependencies_registry, lazy, Container, CtorKey, DependencyNode, Error, Instance,
    ModuleExport, RetryPolicy, Scope, ServiceClass, ServiceCtor, ServiceRegistration,
};

fn leaf(name: &str) -> ServiceCtor {
    ServiceClass::builder(name)
        .construct(|_| Ok(Arc::new(()) as Instance))
        .build()
}

struct HoldsDep {
    dep: Instance,
}

fn holder(name: &str) -> ServiceCtor {
    ServiceClass::builder(name)
        .construct(|mut deps| {
            let dep = deps.remove(0);
            Ok(Arc::new(HoldsDep { dep }) as Instance)
        })
        .build()
}

#[tokio::test]
async fn singleton_chain_shares_the_dependency_instance() {
    let a = leaf("A");
    let b = holder("B");
    dependencies_registry().set(&a, ServiceRegistration::new(Scope::Singleton));
    dependencies_registry().set(
        &b,
        ServiceRegistration::new(Scope::Singleton)
            .with_dependencies(vec![DependencyNode::Ctor(a.clone())]),
    );

    let container = Container::new();
    let b_instance = container.get(&b).await.unwrap();
    let a_instance = container.get(&a).await.unwrap();

    let b_instance = b_instance.downcast::<HoldsDep>().unwrap();
    assert!(Arc::ptr_eq(&b_instance.dep, &a_instance));
    assert!(Arc::ptr_eq(
        &container.get(&a).await.unwrap(),
        &a_instance
    ));

    dependencies_registry().remove(&CtorKey::of(&a));
    dependencies_registry().remove(&CtorKey::of(&b));
}

#[tokio::test]
async fn transient_consumers_share_singleton_dependencies() {
    let a = leaf("A");
    let b = holder("B");
    dependencies_registry().set(&a, ServiceRegistration::new(Scope::Singleton));
    dependencies_registry().set(
        &b,
        ServiceRegistration::new(Scope::Transient)
            .with_dependencies(vec![DependencyNode::Ctor(a.clone())]),
    );

    let container = Container::new();
    let first = container.get(&b).await.unwrap().downcast::<HoldsDep>().unwrap();
    let second = container.get(&b).await.unwrap().downcast::<HoldsDep>().unwrap();
    assert!(!std::ptr::eq(Arc::as_ptr(&first), Arc::as_ptr(&second)));
    assert!(Arc::ptr_eq(&first.dep, &second.dep));

    dependencies_registry().remove(&CtorKey::of(&a));
    dependencies_registry().remove(&CtorKey::of(&b));
}

#[tokio::test]
async fn deferred_transient_dependency_imports_per_resolution() {
    let d = leaf("D");
    dependencies_registry().set(&d, ServiceRegistration::new(Scope::Transient));

    let imports = Arc::new(AtomicU32::new(0));
    let seen = Arc::clone(&imports);
    let target = d.clone();
    let import = lazy(move || {
        seen.fetch_add(1, Ordering::SeqCst);
        let target = target.clone();
        async move { Ok(ModuleExport::Ctor(target)) }
    });

    let c = holder("C");
    dependencies_registry().set(
        &c,
        ServiceRegistration::new(Scope::Transient)
            .with_dependencies(vec![DependencyNode::Deferred(import)]),
    );

    let container = Container::new();
    container.get(&c).await.unwrap();
    container.get(&c).await.unwrap();
    assert_eq!(imports.load(Ordering::SeqCst), 2);

    dependencies_registry().remove(&CtorKey::of(&c));
    dependencies_registry().remove(&CtorKey::of(&d));
}

#[tokio::test]
async fn deferred_singleton_dependency_imports_once() {
    let d = leaf("D");
    dependencies_registry().set(&d, ServiceRegistration::new(Scope::Singleton));

    let imports = Arc::new(AtomicU32::new(0));
    let seen = Arc::clone(&imports);
    let target = d.clone();
    let import = lazy(move || {
        seen.fetch_add(1, Ordering::SeqCst);
        let target = target.clone();
        async move { Ok(ModuleExport::Ctor(target)) }
    });

    let c = holder("C");
    dependencies_registry().set(
        &c,
        ServiceRegistration::new(Scope::Transient)
            .with_dependencies(vec![DependencyNode::Deferred(import)]),
    );

    let container = Container::new();
    let first = container.get(&c).await.unwrap().downcast::<HoldsDep>().unwrap();
    let second = container.get(&c).await.unwrap().downcast::<HoldsDep>().unwrap();
    assert_eq!(imports.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(&first.dep, &second.dep));

    dependencies_registry().remove(&CtorKey::of(&c));
    dependencies_registry().remove(&CtorKey::of(&d));
}

#[tokio::test(start_paused = true)]
async fn retry_succeeds_on_third_attempt_through_the_container() {
    let d = leaf("D");
    dependencies_registry().set(&d, ServiceRegistration::new(Scope::Transient));

    let attempts = Arc::new(AtomicU32::new(0));
    let seen = Arc::clone(&attempts);
    let target = d.clone();
    let import = lazy(move || {
        let attempt = seen.fetch_add(1, Ordering::SeqCst);
        let target = target.clone();
        async move {
            if attempt < 2 {
                Err("chunk fetch failed".into())
            } else {
                Ok(ModuleExport::Ctor(target))
            }
        }
    })
    .with_retry(RetryPolicy::with_retries(3).with_backoff_ms(1).with_factor(2.0));

    let c = holder("C");
    dependencies_registry().set(
        &c,
        ServiceRegistration::new(Scope::Transient)
            .with_dependencies(vec![DependencyNode::Deferred(import)]),
    );

    let container = Container::new();
    let started = tokio::time::Instant::now();
    assert!(container.get(&c).await.is_ok());
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert_eq!(started.elapsed(), Duration::from_millis(3));

    dependencies_registry().remove(&CtorKey::of(&c));
    dependencies_registry().remove(&CtorKey::of(&d));
}

#[tokio::test]
async fn factory_backed_service_constructs_through_the_fetched_class() {
    let real = ServiceClass::builder("HeavyReal")
        .construct(|_| Ok(Arc::new("constructed".to_string()) as Instance))
        .build();
    let placeholder = ServiceClass::builder("Heavy").placeholder().build();

    let target = real.clone();
    let factory = lazy(move || {
        let target = target.clone();
        async move { Ok(ModuleExport::Ctor(target)) }
    });
    dependencies_registry().set(
        &placeholder,
        ServiceRegistration::new(Scope::Singleton).with_factory(factory),
    );

    let container = Container::new();
    let instance = container.get(&placeholder).await.unwrap();
    assert_eq!(*instance.downcast::<String>().unwrap(), "constructed");
    // The placeholder itself still refuses direct construction.
    assert!(placeholder.construct(vec![]).is_err());

    dependencies_registry().remove(&CtorKey::of(&placeholder));
}

#[tokio::test]
async fn identifier_entry_point_resolves_the_bound_constructor() {
    let a = leaf("IdentA");
    dependencies_registry().set(&a, ServiceRegistration::new(Scope::Singleton));
    let id = alloy_runtime::identifier_registry()
        .register(&a, Some(alloy_runtime::symbol_for("alloy:app/src/ident-a.ts#IdentA")))
        .unwrap();

    let container = Container::new();
    let by_id = container.get_by_identifier(&id).await.unwrap();
    let by_ctor = container.get(&a).await.unwrap();
    assert!(Arc::ptr_eq(&by_id, &by_ctor));

    dependencies_registry().remove(&CtorKey::of(&a));
}

#[tokio::test]
async fn eager_cycle_is_detected_with_its_full_path() {
    let a = leaf("CycleA");
    let b = leaf("CycleB");
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
    match container.get(&a).await.unwrap_err() {
        Error::CircularDependency { path } => {
            assert_eq!(path, "CycleA -> CycleB -> CycleA");
        }
        other => panic!("unexpected error: {other}"),
    }

    dependencies_registry().remove(&CtorKey::of(&a));
    dependencies_registry().remove(&CtorKey::of(&b));
}

#[tokio::test]
async fn deferred_importer_resolving_default_field_behaves_like_the_ctor() {
    let d = leaf("D");
    dependencies_registry().set(&d, ServiceRegistration::new(Scope::Transient));

    let target = d.clone();
    let import = lazy(move || {
        let target = target.clone();
        async move {
            Ok(ModuleExport::Namespace {
                default: Some(target),
            })
        }
    });

    let c = holder("C");
    dependencies_registry().set(
        &c,
        ServiceRegistration::new(Scope::Transient)
            .with_dependencies(vec![DependencyNode::Deferred(import)]),
    );

    let container = Container::new();
    assert!(container.get(&c).await.is_ok());

    dependencies_registry().remove(&CtorKey::of(&c));
    dependencies_registry().remove(&CtorKey::of(&d));
}
