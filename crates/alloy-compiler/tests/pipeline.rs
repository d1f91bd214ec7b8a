//! Scan -> ingest -> codegen pipeline scenarios.

use alloy_compiler::{generate, ingest_manifests, CodegenInput};
use alloy_scanner::{DiscoveryStore, ScanContext};
use serde_json::json;

fn store() -> DiscoveryStore {
    DiscoveryStore::new(ScanContext::new("app", "/project"))
}

fn codegen_input(store: &DiscoveryStore) -> CodegenInput {
    CodegenInput {
        local_services: store.services(),
        deferred_keys: store.deferred_keys(),
        ..Default::default()
    }
}

#[test]
fn scan_order_does_not_change_the_generated_module() {
    let sources = [
        (
            "/project/src/a.ts",
            "@Singleton()\nexport class A {}\n".to_string(),
        ),
        (
            "/project/src/b.ts",
            "import { A } from './a';\n\n@Singleton([A])\nexport class B {}\n".to_string(),
        ),
        (
            "/project/src/c.ts",
            "@Injectable([Lazy(() => import('./d').then(m => m.D))])\nexport class C {}\n"
                .to_string(),
        ),
        (
            "/project/src/d.ts",
            "@Injectable()\nexport class D {}\n".to_string(),
        ),
    ];

    let forward = store();
    for (file, source) in &sources {
        forward.update(file, source).unwrap();
    }
    let reversed = store();
    for (file, source) in sources.iter().rev() {
        reversed.update(file, source).unwrap();
    }

    let first = generate(&codegen_input(&forward)).unwrap();
    let second = generate(&codegen_input(&reversed)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn lazy_only_services_stay_out_of_the_eager_import_set() {
    let store = store();
    store
        .update(
            "/project/src/c.ts",
            "@Injectable([Lazy(() => import('./d').then(m => m.D))])\nexport class C {}\n",
        )
        .unwrap();
    store
        .update("/project/src/d.ts", "@Injectable()\nexport class D {}\n")
        .unwrap();

    let output = generate(&codegen_input(&store)).unwrap();
    assert!(!output.module_text.contains("import { D }"));
    assert!(output
        .module_text
        .contains("import('/project/src/d.ts').then(m => m.D)"));
    // The deferred-only service is left out of the wiring entirely; its
    // own module registers it when the deferred import lands.
    assert!(!output.module_text.contains("alloy:app/src/d.ts#D"));
}

#[test]
fn mixed_eager_and_deferred_reference_imports_once() {
    let store = store();
    store
        .update(
            "/project/src/c.ts",
            "@Injectable([Lazy(() => import('./d').then(m => m.D))])\nexport class C {}\n",
        )
        .unwrap();
    store
        .update(
            "/project/src/e.ts",
            "import { D } from './d';\n\n@Injectable([D])\nexport class E {}\n",
        )
        .unwrap();
    store
        .update("/project/src/d.ts", "@Injectable()\nexport class D {}\n")
        .unwrap();

    let output = generate(&codegen_input(&store)).unwrap();
    assert_eq!(output.module_text.matches("import { D }").count(), 1);
    assert_eq!(output.module_text.matches("[D, {").count(), 1);
}

#[test]
fn collision_across_files_yields_two_resolvable_identifiers() {
    let store = store();
    store
        .update(
            "/project/src/one/service.ts",
            "@Injectable()\nexport class Service {}\n",
        )
        .unwrap();
    store
        .update(
            "/project/src/two/service.ts",
            "@Injectable()\nexport class Service {}\n",
        )
        .unwrap();

    let output = generate(&codegen_input(&store)).unwrap();
    assert!(output
        .module_text
        .contains("Symbol.for(\"alloy:app/src/one/service.ts#Service\")"));
    assert!(output
        .module_text
        .contains("Symbol.for(\"alloy:app/src/two/service.ts#Service\")"));
    // Two distinct export keys in the identifiers map.
    let identifier_entries = output
        .module_text
        .lines()
        .filter(|line| line.trim_start().starts_with("Service_"))
        .count();
    assert_eq!(identifier_entries, 2);
}

#[test]
fn duplicate_between_scan_and_manifest_aborts_codegen() {
    let store = store();
    store
        .update("/project/src/foo.ts", "@Injectable()\nexport class Foo {}\n")
        .unwrap();

    let manifest = json!({
        "schemaVersion": 1,
        "packageName": "@acme/lib",
        "buildMode": "preserve-modules",
        "services": [{
            "exportName": "Foo",
            "importPath": "@acme/lib/foo",
            "symbolKey": "alloy:@acme/lib/src/foo.ts#Foo",
            "scope": "transient"
        }]
    });
    let ingested = ingest_manifests(&[manifest], &store.services());

    let err = generate(&CodegenInput {
        local_services: store.services(),
        ingested_services: ingested.services,
        deferred_keys: store.deferred_keys(),
        ..Default::default()
    })
    .unwrap_err();

    let message = err.to_string();
    assert!(message.contains("/project/src/foo.ts"));
    assert!(message.contains("@acme/lib/foo"));
}

#[test]
fn ingested_manifest_services_are_wired_and_declared() {
    let store = store();
    store
        .update(
            "/project/src/app.ts",
            "import { DbClient } from '@acme/db/client';\n\n@Injectable([DbClient])\nexport class App {}\n",
        )
        .unwrap();

    let manifest = json!({
        "schemaVersion": 1,
        "packageName": "@acme/db",
        "buildMode": "preserve-modules",
        "services": [{
            "exportName": "DbClient",
            "importPath": "@acme/db/client",
            "symbolKey": "alloy:@acme/db/src/client.ts#DbClient",
            "scope": "singleton"
        }]
    });
    let ingested = ingest_manifests(&[manifest], &store.services());
    let output = generate(&CodegenInput {
        local_services: store.services(),
        ingested_services: ingested.services,
        deferred_keys: {
            let mut keys = store.deferred_keys();
            keys.extend(ingested.deferred_keys);
            keys
        },
        providers: ingested.providers,
        ..Default::default()
    })
    .unwrap();

    assert!(output
        .module_text
        .contains("import { DbClient } from '@acme/db/client';"));
    assert!(output
        .module_text
        .contains("[DbClient, { scope: \"singleton\" }]"));
    assert!(output
        .declarations
        .contains("declare module '@acme/db/manifest'"));
    assert!(output
        .declarations
        .contains("declare module '@acme/db/service-identifiers'"));
}
