//! The bundler-facing plugin: source-change hooks, virtual-module serving,
//! declaration-file writes.

use std::path::Path;

use alloy_compiler::{
    emit_manifest, generate, ingest_manifests, CodegenInput, CodegenOutput, ManifestEmitInput,
    IDENTIFIERS_FILE_NAME, MANIFEST_FILE_NAME, VIRTUAL_MODULE_ID,
};
use alloy_domain::{BuildMode, Error, Result};
use alloy_scanner::{DiscoveryStore, ScanContext};
use async_trait::async_trait;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Opaque resolved id the virtual module maps to (host convention: a
/// leading NUL keeps other plugins away from it).
pub const VIRTUAL_RESOLVED_ID: &str = "\0virtual:alloy-container";

/// Name of the ambient declaration file written next to the sources.
pub const DECLARATION_FILE_NAME: &str = "alloy-container.d.ts";

/// An asset handed to the host's emit-file pathway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedAsset {
    /// Output-relative file name
    pub file_name: String,
    /// File contents
    pub source: String,
}

/// The host's emit-file seam, used by the manifest-emitter variant.
#[async_trait]
pub trait HostEmitter: Send + Sync {
    /// Emit one build asset.
    async fn emit_file(&self, asset: EmittedAsset) -> Result<()>;
}

/// The bundler plugin: owns the discovery store and drives the compiler.
pub struct AlloyPlugin {
    config: crate::config::AlloyConfig,
    store: DiscoveryStore,
}

impl AlloyPlugin {
    /// Create a plugin for the given configuration.
    pub fn new(config: crate::config::AlloyConfig) -> Self {
        let context = ScanContext::new(
            config.package_name.clone(),
            config.project_root.to_string_lossy().to_string(),
        );
        // Manifest emission wants source snapshots; the cost is one string
        // per file and only library builds read them.
        let store = DiscoveryStore::with_source_snapshots(context);
        Self { config, store }
    }

    /// The discovery store (read access for diagnostics and tests).
    pub fn store(&self) -> &DiscoveryStore {
        &self.store
    }

    /// Map the symbolic virtual-module name to its resolved id.
    pub fn resolve_virtual(&self, id: &str) -> Option<&'static str> {
        (id == VIRTUAL_MODULE_ID).then_some(VIRTUAL_RESOLVED_ID)
    }

    /// Whether a source unit is in scope: recognized extension, not a
    /// declaration file, not under `node_modules`.
    pub fn wants(&self, id: &str) -> bool {
        let slashed = id.replace('\\', "/");
        if slashed.contains("/node_modules/") || slashed.ends_with(".d.ts") {
            return false;
        }
        self.config
            .source_extensions
            .iter()
            .any(|ext| slashed.ends_with(&format!(".{ext}")))
    }

    /// Transform hook: re-scan one source unit. Returns whether the file's
    /// discovery output changed (the signal to invalidate the virtual
    /// module).
    pub fn on_transform(&self, id: &str, source: &str) -> Result<bool> {
        if !self.wants(id) {
            return Ok(false);
        }
        let outcome = self.store.update(id, source)?;
        let changed = outcome.services != outcome.prior_services
            || outcome.deferred_keys != outcome.prior_deferred_keys;
        if changed {
            debug!(target: "alloy::host", file = id, "discovery output changed");
        }
        Ok(changed)
    }

    /// Hot-update hook: an empty module list signals deletion.
    pub fn on_hot_update(&self, file: &str, module_count: usize) -> bool {
        if module_count == 0 {
            let removed = self.store.remove(file);
            let had_services = !removed.prior_services.is_empty();
            if had_services {
                info!(target: "alloy::host", file, "evicted deleted source");
            }
            return had_services;
        }
        false
    }

    /// Build-start hook: clear discovery and walk the project root once to
    /// seed it. Returns the number of files scanned.
    pub fn on_build_start(&self) -> Result<usize> {
        self.store.clear();
        let mut scanned = 0usize;
        for entry in WalkDir::new(&self.config.project_root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| entry.file_name().to_string_lossy() != "node_modules")
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(target: "alloy::host", %err, "skipping unreadable path");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path().to_string_lossy().to_string();
            if !self.wants(&path) {
                continue;
            }
            let source = match std::fs::read_to_string(entry.path()) {
                Ok(source) => source,
                Err(err) => {
                    warn!(target: "alloy::host", file = %path, %err, "skipping unreadable file");
                    continue;
                }
            };
            match self.store.update(&path, &source) {
                Ok(_) => scanned += 1,
                Err(err) => {
                    warn!(target: "alloy::host", file = %path, %err, "skipping unparsable file")
                }
            }
        }
        info!(target: "alloy::host", scanned, "seeded discovery from project root");
        Ok(scanned)
    }

    /// Load hook: synthesize the virtual module and, as a side effect,
    /// write the ambient declaration file.
    pub fn on_load(&self, resolved_id: &str) -> Result<Option<String>> {
        if resolved_id != VIRTUAL_RESOLVED_ID {
            return Ok(None);
        }
        let output = self.generate()?;
        self.write_declarations(&output.declarations)?;
        Ok(Some(output.module_text))
    }

    /// Run ingestion + codegen over the current discovery state.
    pub fn generate(&self) -> Result<CodegenOutput> {
        let local_services = self.store.services();
        let ingested = ingest_manifests(&self.config.manifests, &local_services);

        let mut deferred_keys = self.store.deferred_keys();
        deferred_keys.extend(ingested.deferred_keys);

        let mut providers: Vec<String> = self
            .config
            .providers
            .iter()
            .map(|provider| self.provider_path(provider))
            .collect();
        providers.extend(ingested.providers);

        generate(&CodegenInput {
            local_services,
            ingested_services: ingested.services,
            deferred_keys,
            providers,
            lazy_service_keys: self.config.lazy_services.clone(),
        })
    }

    /// Emit the library manifest and its companion identifiers module
    /// through the host's emit-file pathway.
    pub async fn emit_manifest_assets(
        &self,
        build_mode: BuildMode,
        emitter: &dyn HostEmitter,
    ) -> Result<()> {
        let output = emit_manifest(&ManifestEmitInput {
            package_name: self.config.package_name.clone(),
            build_mode,
            store: &self.store,
            providers: self.config.providers.clone(),
        })?;
        emitter
            .emit_file(EmittedAsset {
                file_name: MANIFEST_FILE_NAME.to_string(),
                source: output.manifest_module,
            })
            .await?;
        emitter
            .emit_file(EmittedAsset {
                file_name: IDENTIFIERS_FILE_NAME.to_string(),
                source: output.identifiers_module,
            })
            .await?;
        Ok(())
    }

    fn provider_path(&self, provider: &str) -> String {
        if provider.starts_with('.') {
            self.config
                .project_root
                .join(provider)
                .to_string_lossy()
                .replace('\\', "/")
        } else {
            provider.to_string()
        }
    }

    fn write_declarations(&self, text: &str) -> Result<()> {
        let dir: &Path = &self.config.container_declaration_dir;
        std::fs::create_dir_all(dir)
            .map_err(|err| Error::io_with_source("failed to create declaration dir", err))?;
        let path = dir.join(DECLARATION_FILE_NAME);
        // Unchanged declarations are not rewritten; editors watch this file.
        if std::fs::read_to_string(&path).is_ok_and(|existing| existing == text) {
            return Ok(());
        }
        std::fs::write(&path, text)
            .map_err(|err| Error::io_with_source("failed to write declaration file", err))?;
        debug!(target: "alloy::host", path = %path.display(), "wrote ambient declarations");
        Ok(())
    }
}
