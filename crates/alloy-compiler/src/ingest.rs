//! Manifest ingestion: declarative library descriptors into the
//! discovered-service shape.

use std::collections::BTreeSet;

use alloy_domain::{
    deferred_key, DependencyDescriptor, DiscoveredService, Error, ImportBinding, ImportedName,
    LibraryManifest, ManifestService, RetryPolicy, ServiceMetadata,
};
use tracing::warn;

/// Aggregated output of ingesting a manifest sequence.
#[derive(Debug, Default)]
pub struct IngestOutput {
    /// Manifest services materialized into the discovered-service shape
    pub services: Vec<DiscoveredService>,
    /// Provider module specifiers, in manifest order
    pub providers: Vec<String>,
    /// Deferred-reference keys contributed by deferred deps
    pub deferred_keys: BTreeSet<String>,
    /// Manifests skipped as invalid, with the record index and the reason
    pub skipped: Vec<(usize, Error)>,
}

/// Ingest a sequence of manifest records.
///
/// Manifests originate from independent builds, so a record failing
/// validation is skipped with a diagnostic instead of aborting the
/// compilation.
pub fn ingest_manifests(records: &[serde_json::Value], local: &[DiscoveredService]) -> IngestOutput {
    let mut output = IngestOutput::default();

    for (index, record) in records.iter().enumerate() {
        let manifest: LibraryManifest = match serde_json::from_value(record.clone()) {
            Ok(manifest) => manifest,
            Err(err) => {
                let err = Error::invalid_manifest(format!("record #{index}: {err}"));
                warn!(target: "alloy::ingest", %err, "skipping manifest");
                output.skipped.push((index, err));
                continue;
            }
        };
        if let Err(err) = manifest.validate() {
            warn!(target: "alloy::ingest", %err, "skipping manifest");
            output.skipped.push((index, err));
            continue;
        }

        output.providers.extend(manifest.providers.iter().cloned());
        for service in &manifest.services {
            let materialized =
                materialize(service, &manifest, local, &output.services, &mut output.deferred_keys);
            output.services.push(materialized);
        }
    }

    output
}

fn materialize(
    service: &ManifestService,
    manifest: &LibraryManifest,
    local: &[DiscoveredService],
    already_ingested: &[DiscoveredService],
    deferred_keys: &mut BTreeSet<String>,
) -> DiscoveredService {
    let mut dependencies = Vec::new();
    let mut referenced_imports = Vec::new();

    for name in &service.deps {
        let (descriptor, binding) = resolve_named_dep(name, &manifest.package_name, local, already_ingested);
        dependencies.push(descriptor);
        if let Some(binding) = binding {
            referenced_imports.push(binding);
        }
    }

    for token in &service.token_deps {
        dependencies.push(DependencyDescriptor::eager(
            token.export_name.clone(),
            vec![token.export_name.clone()],
        ));
        referenced_imports.push(ImportBinding {
            local_name: token.export_name.clone(),
            module_specifier: token.import_path.clone(),
            imported: ImportedName::Named(token.export_name.clone()),
            is_type_only: false,
        });
    }

    for deferred in &service.deferred_deps {
        let expression = reconstruct_lazy(
            &deferred.import_path,
            &deferred.export_name,
            deferred.retry.as_ref(),
        );
        let retry = deferred
            .retry
            .as_ref()
            .filter(|hints| !hints.is_empty())
            .map(RetryPolicy::from);
        dependencies.push(DependencyDescriptor::deferred(
            expression,
            vec!["Lazy".to_string()],
            retry,
        ));
        deferred_keys.insert(deferred_key(&deferred.import_path, &deferred.export_name));
    }

    DiscoveredService {
        class_name: service.export_name.clone(),
        file_path: service.import_path.clone(),
        identifier_key: service.symbol_key.clone(),
        metadata: ServiceMetadata {
            scope: service.scope,
            dependencies,
            factory: None,
        },
        referenced_imports,
    }
}

/// Best-match selection for a named manifest dependency.
///
/// Exact unique match wins; an ambiguous name prefers the candidate whose
/// file path shares the manifest's scope prefix, then falls back to the
/// first candidate. A name matching nothing is kept verbatim — the runtime
/// fails at resolution if the service is truly missing.
fn resolve_named_dep(
    name: &str,
    package_name: &str,
    local: &[DiscoveredService],
    already_ingested: &[DiscoveredService],
) -> (DependencyDescriptor, Option<ImportBinding>) {
    let candidates: Vec<&DiscoveredService> = local
        .iter()
        .chain(already_ingested.iter())
        .filter(|service| service.class_name == name)
        .collect();

    let selected = match candidates.len() {
        0 => None,
        1 => Some(candidates[0]),
        _ => {
            let scope_prefix = scope_prefix(package_name);
            candidates
                .iter()
                .find(|service| {
                    scope_prefix
                        .as_deref()
                        .is_some_and(|prefix| service.file_path.starts_with(prefix))
                })
                .copied()
                .or(Some(candidates[0]))
        }
    };

    let descriptor = DependencyDescriptor::eager(name.to_string(), vec![name.to_string()]);
    let binding = selected.map(|service| ImportBinding {
        local_name: name.to_string(),
        module_specifier: service.file_path.clone(),
        imported: ImportedName::Named(service.class_name.clone()),
        is_type_only: false,
    });
    (descriptor, binding)
}

fn scope_prefix(package_name: &str) -> Option<String> {
    package_name
        .starts_with('@')
        .then(|| package_name.split('/').next().map(|scope| format!("{scope}/")))
        .flatten()
}

/// Reconstruct the deferral-wrapper expression for a manifest deferred dep.
fn reconstruct_lazy(
    import_path: &str,
    export_name: &str,
    retry: Option<&alloy_domain::RetryHints>,
) -> String {
    let importer = format!("() => import('{import_path}').then(m => m.{export_name})");
    match retry.filter(|hints| !hints.is_empty()) {
        Some(hints) => {
            let mut fields = Vec::new();
            if let Some(retries) = hints.retries {
                fields.push(format!("retries: {retries}"));
            }
            if let Some(backoff_ms) = hints.backoff_ms {
                fields.push(format!("backoffMs: {backoff_ms}"));
            }
            if let Some(factor) = hints.factor {
                fields.push(format!("factor: {factor}"));
            }
            format!("Lazy({importer}, {{ {} }})", fields.join(", "))
        }
        None => format!("Lazy({importer})"),
    }
}
