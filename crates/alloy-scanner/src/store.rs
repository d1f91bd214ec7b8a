//! Per-file aggregation of scan output.

use std::collections::BTreeSet;

use alloy_domain::{DiscoveredService, Result};
use dashmap::DashMap;
use tracing::debug;

use crate::scanner::{FileScan, ScanContext, SourceScanner};

/// Result of re-scanning a file, with the prior state for cleanup.
#[derive(Debug, Clone, Default)]
pub struct UpdateOutcome {
    /// Services discovered by the new scan
    pub services: Vec<DiscoveredService>,
    /// Deferred keys contributed by the new scan
    pub deferred_keys: BTreeSet<String>,
    /// Services the file contributed before this update
    pub prior_services: Vec<DiscoveredService>,
    /// Deferred keys the file contributed before this update
    pub prior_deferred_keys: BTreeSet<String>,
}

/// Result of evicting a file.
#[derive(Debug, Clone, Default)]
pub struct RemovalOutcome {
    /// Services the file contributed before eviction
    pub prior_services: Vec<DiscoveredService>,
    /// Deferred keys the file contributed before eviction
    pub prior_deferred_keys: BTreeSet<String>,
}

/// Mutable aggregation layer over the pure scanner.
///
/// Keyed by canonical source identifier; one entry per scanned file.
/// Mutations are atomic per file and eviction is idempotent. Source
/// snapshots are opt-in (the manifest emitter needs them; the bundler
/// plugin does not).
pub struct DiscoveryStore {
    scanner: SourceScanner,
    context: ScanContext,
    files: DashMap<String, FileScan>,
    sources: Option<DashMap<String, String>>,
}

impl DiscoveryStore {
    /// Create a store scanning under the given context
    pub fn new(context: ScanContext) -> Self {
        Self {
            scanner: SourceScanner::new(),
            context,
            files: DashMap::new(),
            sources: None,
        }
    }

    /// Create a store that also retains per-file source snapshots
    pub fn with_source_snapshots(context: ScanContext) -> Self {
        Self {
            sources: Some(DashMap::new()),
            ..Self::new(context)
        }
    }

    /// The scan context this store was built with
    pub fn context(&self) -> &ScanContext {
        &self.context
    }

    /// Re-scan a file and replace its entry.
    pub fn update(&self, file_id: &str, source: &str) -> Result<UpdateOutcome> {
        let scan = self.scanner.scan(source, file_id, &self.context)?;
        let prior = self.files.insert(file_id.to_string(), scan.clone());
        if let Some(sources) = &self.sources {
            sources.insert(file_id.to_string(), source.to_string());
        }
        let (prior_services, prior_deferred_keys) = match prior {
            Some(prior) => (prior.services, prior.deferred_keys),
            None => Default::default(),
        };
        debug!(
            target: "alloy::store",
            file = file_id,
            services = scan.services.len(),
            "updated discovery entry"
        );
        Ok(UpdateOutcome {
            services: scan.services,
            deferred_keys: scan.deferred_keys,
            prior_services,
            prior_deferred_keys,
        })
    }

    /// Evict a file. Evicting an unknown file is a no-op.
    pub fn remove(&self, file_id: &str) -> RemovalOutcome {
        if let Some(sources) = &self.sources {
            sources.remove(file_id);
        }
        match self.files.remove(file_id) {
            Some((_, prior)) => RemovalOutcome {
                prior_services: prior.services,
                prior_deferred_keys: prior.deferred_keys,
            },
            None => RemovalOutcome::default(),
        }
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.files.clear();
        if let Some(sources) = &self.sources {
            sources.clear();
        }
    }

    /// Number of files currently tracked
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Every discovered service, sorted by `(file_path, class_name)` so
    /// downstream consumers iterate deterministically regardless of scan
    /// order.
    pub fn services(&self) -> Vec<DiscoveredService> {
        let mut services: Vec<DiscoveredService> = self
            .files
            .iter()
            .flat_map(|entry| entry.value().services.clone())
            .collect();
        services.sort_by(|a, b| {
            (a.file_path.as_str(), a.class_name.as_str())
                .cmp(&(b.file_path.as_str(), b.class_name.as_str()))
        });
        services
    }

    /// Union of every file's deferred-reference keys.
    pub fn deferred_keys(&self) -> BTreeSet<String> {
        self.files
            .iter()
            .flat_map(|entry| entry.value().deferred_keys.iter().cloned().collect::<Vec<_>>())
            .collect()
    }

    /// Services contributed by one file
    pub fn file_services(&self, file_id: &str) -> Option<Vec<DiscoveredService>> {
        self.files.get(file_id).map(|scan| scan.services.clone())
    }

    /// Deferred keys contributed by one file
    pub fn file_deferred_keys(&self, file_id: &str) -> Option<BTreeSet<String>> {
        self.files.get(file_id).map(|scan| scan.deferred_keys.clone())
    }

    /// Source snapshot of one file, when snapshots are enabled
    pub fn source_snapshot(&self, file_id: &str) -> Option<String> {
        self.sources
            .as_ref()
            .and_then(|sources| sources.get(file_id).map(|s| s.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> DiscoveryStore {
        DiscoveryStore::new(ScanContext::new("app", "/project"))
    }

    const SERVICE_A: &str = "@Injectable()\nexport class A {}\n";
    const SERVICE_B: &str = "@Singleton()\nexport class B {}\n";

    #[test]
    fn update_returns_prior_state() {
        let store = store();
        let first = store.update("/project/src/a.ts", SERVICE_A).unwrap();
        assert_eq!(first.services.len(), 1);
        assert!(first.prior_services.is_empty());

        let second = store.update("/project/src/a.ts", SERVICE_B).unwrap();
        assert_eq!(second.services[0].class_name, "B");
        assert_eq!(second.prior_services[0].class_name, "A");
    }

    #[test]
    fn eviction_is_idempotent() {
        let store = store();
        store.update("/project/src/a.ts", SERVICE_A).unwrap();
        let removed = store.remove("/project/src/a.ts");
        assert_eq!(removed.prior_services.len(), 1);
        let again = store.remove("/project/src/a.ts");
        assert!(again.prior_services.is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn rescan_of_identical_content_is_stable() {
        let store = store();
        let first = store.update("/project/src/a.ts", SERVICE_A).unwrap();
        let second = store.update("/project/src/a.ts", SERVICE_A).unwrap();
        assert_eq!(first.services, second.services);
        assert_eq!(first.deferred_keys, second.deferred_keys);
    }

    #[test]
    fn aggregated_services_are_sorted_by_file_then_class() {
        let store = store();
        store.update("/project/src/z.ts", SERVICE_B).unwrap();
        store.update("/project/src/a.ts", SERVICE_A).unwrap();
        let services = store.services();
        assert_eq!(services[0].file_path, "/project/src/a.ts");
        assert_eq!(services[1].file_path, "/project/src/z.ts");
    }

    #[test]
    fn source_snapshots_are_opt_in() {
        let plain = store();
        plain.update("/project/src/a.ts", SERVICE_A).unwrap();
        assert!(plain.source_snapshot("/project/src/a.ts").is_none());

        let snapshotting =
            DiscoveryStore::with_source_snapshots(ScanContext::new("app", "/project"));
        snapshotting.update("/project/src/a.ts", SERVICE_A).unwrap();
        assert_eq!(
            snapshotting.source_snapshot("/project/src/a.ts").as_deref(),
            Some(SERVICE_A)
        );
    }
}
