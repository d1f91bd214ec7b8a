//! Manifest emission: the library-build variant of the compiler.
//!
//! Where the application build synthesizes a virtual wiring module, a
//! library build emits a declarative manifest (`alloy.manifest.mjs`) plus a
//! companion module exporting one `Symbol.for` constant per service, so
//! consumers share the exact service identities.

use alloy_domain::{
    resolve_relative, BuildMode, DeferredDep, DiscoveredService, Error, LibraryManifest,
    ManifestService, Result, RetryHints, TokenDep, MANIFEST_SCHEMA_VERSION,
};
use alloy_scanner::DiscoveryStore;
use regex::Regex;
use tracing::debug;

/// Default file name of the emitted manifest module.
pub const MANIFEST_FILE_NAME: &str = "alloy.manifest.mjs";

/// Default file name of the companion identifiers module.
pub const IDENTIFIERS_FILE_NAME: &str = "alloy.service-identifiers.mjs";

/// Inputs to manifest emission.
pub struct ManifestEmitInput<'a> {
    /// Package the manifest describes
    pub package_name: String,
    /// Module layout of this build
    pub build_mode: BuildMode,
    /// Discovery store holding the library's scan output
    pub store: &'a DiscoveryStore,
    /// Wiring-module specifiers to advertise
    pub providers: Vec<String>,
}

/// Emission result: the structured record plus both module texts.
#[derive(Debug)]
pub struct ManifestEmitOutput {
    /// The manifest record that was serialized
    pub manifest: LibraryManifest,
    /// Text of `alloy.manifest.mjs`
    pub manifest_module: String,
    /// Text of the companion service-identifiers module
    pub identifiers_module: String,
    /// Diagnostics gathered while classifying dependencies
    pub diagnostics: Vec<String>,
}

/// Emit the manifest for a library build.
///
/// Providers require stable public subpath specifiers, which only the
/// `preserve-modules` layout guarantees; listing providers under any other
/// build mode is a typed abort.
pub fn emit_manifest(input: &ManifestEmitInput<'_>) -> Result<ManifestEmitOutput> {
    if !input.providers.is_empty() && input.build_mode != BuildMode::PreserveModules {
        return Err(Error::providers_require_preserve_modules(
            &input.package_name,
            input.build_mode.as_str(),
        ));
    }

    let services = input.store.services();
    let mut diagnostics = Vec::new();
    let manifest_services: Vec<ManifestService> = services
        .iter()
        .map(|service| materialize_service(service, input, &mut diagnostics))
        .collect();

    let manifest = LibraryManifest {
        schema_version: Some(MANIFEST_SCHEMA_VERSION),
        package_name: input.package_name.clone(),
        build_mode: input.build_mode,
        services: manifest_services,
        providers: input.providers.clone(),
    };

    let manifest_module = render_manifest_module(&manifest, &diagnostics)?;
    let identifiers_module = render_identifiers_module(&services);

    debug!(
        target: "alloy::emit",
        package = %input.package_name,
        services = manifest.services.len(),
        diagnostics = diagnostics.len(),
        "emitted manifest"
    );

    Ok(ManifestEmitOutput {
        manifest,
        manifest_module,
        identifiers_module,
        diagnostics,
    })
}

fn materialize_service(
    service: &DiscoveredService,
    input: &ManifestEmitInput<'_>,
    diagnostics: &mut Vec<String>,
) -> ManifestService {
    let mut deps = Vec::new();
    let mut token_deps = Vec::new();
    let mut deferred_deps = Vec::new();

    for dep in &service.metadata.dependencies {
        if dep.is_deferred {
            match parse_deferred_expression(&dep.expression) {
                Some((specifier, export_name)) => {
                    let import_path =
                        public_path(&specifier, &service.file_path, input);
                    deferred_deps.push(DeferredDep {
                        export_name,
                        import_path,
                        retry: dep.retry.as_ref().map(|policy| RetryHints {
                            retries: Some(policy.attempts_after_first),
                            backoff_ms: Some(policy.initial_backoff_ms),
                            factor: Some(policy.factor),
                        }),
                    });
                }
                None => diagnostics.push(format!(
                    "{}: deferred dependency `{}` has no literal import target; omitted",
                    service.class_name, dep.expression
                )),
            }
            continue;
        }

        if let [name] = dep.referenced_identifiers.as_slice() {
            if dep.expression == *name {
                if let Some(token_path) = token_import_path(service, name, input) {
                    token_deps.push(TokenDep {
                        export_name: name.clone(),
                        import_path: token_path,
                    });
                } else {
                    deps.push(name.clone());
                }
                continue;
            }
        }
        diagnostics.push(format!(
            "{}: dependency expression `{}` is not representable in a manifest; omitted",
            service.class_name, dep.expression
        ));
    }

    ManifestService {
        export_name: service.class_name.clone(),
        import_path: service_public_path(service, input),
        symbol_key: service.identifier_key.clone(),
        scope: service.metadata.scope,
        deps,
        token_deps,
        deferred_deps,
    }
}

/// Public specifier consumers will use for a service of this package.
fn service_public_path(service: &DiscoveredService, input: &ManifestEmitInput<'_>) -> String {
    match input.build_mode {
        BuildMode::PreserveModules => public_path(&service.file_path, &service.file_path, input),
        // Chunked and bundled layouts re-export everything from the root.
        BuildMode::Chunks | BuildMode::Bundled => input.package_name.clone(),
    }
}

/// Map a (possibly relative) specifier onto the package's public subpath.
fn public_path(specifier: &str, base_file: &str, input: &ManifestEmitInput<'_>) -> String {
    let absolute = if specifier.starts_with('.') {
        resolve_relative(base_file, specifier)
    } else {
        specifier.to_string()
    };
    let root = &input.store.context().project_root;
    let relative = absolute
        .strip_prefix(root.as_str())
        .unwrap_or(absolute.as_str())
        .trim_start_matches('/');
    let trimmed = strip_source_extension(relative);
    format!("{}/{}", input.package_name, trimmed)
}

fn strip_source_extension(path: &str) -> &str {
    for ext in [".ts", ".tsx", ".mts", ".js", ".jsx", ".mjs"] {
        if let Some(stem) = path.strip_suffix(ext) {
            return stem;
        }
    }
    path
}

/// Whether `name` resolves to a `createToken` export, judged from the
/// store's opt-in source snapshots. Without snapshots nothing is
/// classified as a token.
fn token_import_path(
    service: &DiscoveredService,
    name: &str,
    input: &ManifestEmitInput<'_>,
) -> Option<String> {
    let binding = service
        .referenced_imports
        .iter()
        .find(|binding| binding.local_name == name && !binding.is_type_only)?;
    let defining_file = if binding.module_specifier.starts_with('.') {
        resolve_relative(&service.file_path, &binding.module_specifier)
    } else {
        binding.module_specifier.clone()
    };

    let export_name = binding.imported.export_name();
    let snapshot = find_snapshot(input.store, &defining_file)?;
    let pattern = Regex::new(&format!(
        r"export\s+const\s+{}\s*=\s*createToken\b",
        regex::escape(export_name)
    ))
    .ok()?;
    pattern
        .is_match(&snapshot)
        .then(|| public_path(&defining_file, &service.file_path, input))
}

/// Source snapshots are keyed by canonical file id; an extensionless
/// import specifier matches through the same candidate set the scanner
/// uses.
fn find_snapshot(store: &DiscoveryStore, file: &str) -> Option<String> {
    if let Some(snapshot) = store.source_snapshot(file) {
        return Some(snapshot);
    }
    for ext in ["ts", "tsx", "mts", "js", "jsx", "mjs"] {
        if let Some(snapshot) = store.source_snapshot(&format!("{file}.{ext}")) {
            return Some(snapshot);
        }
        if let Some(snapshot) = store.source_snapshot(&format!("{file}/index.{ext}")) {
            return Some(snapshot);
        }
    }
    None
}

/// Extract `(specifier, export_name)` from a reconstructed or scanned
/// deferral expression.
fn parse_deferred_expression(expression: &str) -> Option<(String, String)> {
    let import = Regex::new(r#"import\(\s*['"]([^'"]+)['"]\s*\)"#).expect("static pattern");
    let specifier = import.captures(expression)?.get(1)?.as_str().to_string();
    let then = Regex::new(r"\.then\(\s*\w+\s*=>\s*(?:new\s+)?\w+\.(\w+)").expect("static pattern");
    let export_name = then
        .captures(expression)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "default".to_string());
    Some((specifier, export_name))
}

fn render_manifest_module(
    manifest: &LibraryManifest,
    diagnostics: &[String],
) -> Result<String> {
    let mut record = serde_json::to_value(manifest)?;
    if !diagnostics.is_empty() {
        record
            .as_object_mut()
            .ok_or_else(|| Error::internal("manifest serialized to a non-object"))?
            .insert("diagnostics".to_string(), serde_json::json!(diagnostics));
    }
    let body = serde_json::to_string_pretty(&record)?;
    Ok(format!(
        "// Generated by Alloy. Do not edit.\nexport const manifest = {body};\n"
    ))
}

fn render_identifiers_module(services: &[DiscoveredService]) -> String {
    let mut out = String::from("// Generated by Alloy. Do not edit.\n");
    let mut seen: std::collections::BTreeSet<String> = std::collections::BTreeSet::new();
    for service in services {
        let export = if seen.contains(&service.class_name) {
            format!(
                "{}_{}",
                service.class_name,
                crate::codegen::short_hash(&service.file_path)
            )
        } else {
            service.class_name.clone()
        };
        seen.insert(service.class_name.clone());
        out.push_str(&format!(
            "export const {export} = Symbol.for(\"{}\");\n",
            service.identifier_key
        ));
    }
    out
}
