//! Virtual-module synthesis.
//!
//! Pure function of its inputs: reconciles eager vs. deferred references,
//! resolves identifier collisions, and emits the `virtual:alloy-container`
//! module text plus its ambient type declarations. Iteration order is
//! pinned everywhere (sorted services, sorted imports), so the same input
//! yields byte-identical output regardless of scan order.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use alloy_domain::{
    is_bare_specifier, normalize_specifier, parse_identifier_key, resolve_relative,
    DependencyDescriptor, DiscoveredService, Error, Result,
};
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::declarations;

/// Package specifier of the runtime the generated module imports from.
pub const RUNTIME_SPECIFIER: &str = "@alloy/runtime";

/// Specifier of the synthesized virtual module.
pub const VIRTUAL_MODULE_ID: &str = "virtual:alloy-container";

/// Extensions tried when matching an extensionless specifier to a known
/// service file. Mirrors the scanner's candidate expansion.
const RESOLVE_EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "js", "jsx", "mjs"];

/// Everything codegen needs.
#[derive(Debug, Default, Clone)]
pub struct CodegenInput {
    /// Services discovered by scanning the project
    pub local_services: Vec<DiscoveredService>,
    /// Services materialized from ingested manifests
    pub ingested_services: Vec<DiscoveredService>,
    /// Global deferred-reference key set (scan + ingest)
    pub deferred_keys: BTreeSet<String>,
    /// Provider module specifiers, in configured order
    pub providers: Vec<String>,
    /// Identifier keys of services to emit as factory-deferred stubs
    pub lazy_service_keys: Vec<String>,
}

/// The synthesized module and its ambient declarations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodegenOutput {
    /// JavaScript text of the virtual wiring module
    pub module_text: String,
    /// Ambient TypeScript declaration text
    pub declarations: String,
}

struct Active {
    service: DiscoveredService,
    from_manifest: bool,
    binding_name: String,
    export_key: String,
    stub: bool,
}

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord)]
struct ImportEntry {
    path: String,
    export: String,
    local: String,
}

/// Run the full codegen sequence.
pub fn generate(input: &CodegenInput) -> Result<CodegenOutput> {
    // lazy_services entries are configuration; vet them before anything
    // else so a typo fails fast.
    let mut lazy_keys: BTreeSet<&str> = BTreeSet::new();
    for key in &input.lazy_service_keys {
        parse_identifier_key(key)?;
        lazy_keys.insert(key.as_str());
    }

    // Unified, deterministically ordered service list.
    let mut all: Vec<(DiscoveredService, bool)> = input
        .local_services
        .iter()
        .cloned()
        .map(|service| (service, false))
        .chain(
            input
                .ingested_services
                .iter()
                .cloned()
                .map(|service| (service, true)),
        )
        .collect();
    all.sort_by(|(a, _), (b, _)| {
        (a.file_path.as_str(), a.class_name.as_str())
            .cmp(&(b.file_path.as_str(), b.class_name.as_str()))
    });

    // Steps 1-2: deferred filtering with eager reconciliation, run to a
    // fixpoint (reinstating a service can surface new eager references).
    let excluded = reconcile_deferred(&all, &input.deferred_keys);

    let mut actives: Vec<Active> = all
        .iter()
        .enumerate()
        .filter(|(index, _)| !excluded.contains(index))
        .map(|(_, (service, from_manifest))| Active {
            service: service.clone(),
            from_manifest: *from_manifest,
            binding_name: service.class_name.clone(),
            export_key: service.class_name.clone(),
            stub: false,
        })
        .collect();

    // Step 3: factory-deferral augmentation from configuration.
    for active in &mut actives {
        if !lazy_keys.contains(active.service.identifier_key.as_str()) {
            continue;
        }
        if active.service.metadata.factory.is_some() {
            continue;
        }
        let path = import_path_for(&active.service.file_path);
        let expression = format!(
            "Lazy(() => import('{path}').then(m => m.{}))",
            active.service.class_name
        );
        active.service.metadata.factory = Some(DependencyDescriptor::deferred(
            expression,
            vec!["Lazy".to_string()],
            None,
        ));
        active.stub = true;
    }

    // Step 4: a class name both locally discovered and listed by a
    // manifest is a hard conflict.
    detect_duplicates(&actives)?;

    // Step 5: identifier-collision aliasing.
    let mut by_name: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (index, active) in actives.iter().enumerate() {
        by_name
            .entry(active.service.class_name.as_str())
            .or_default()
            .push(index);
    }
    let colliding: Vec<Vec<usize>> = by_name
        .values()
        .filter(|group| group.len() > 1)
        .cloned()
        .collect();
    for group in colliding {
        for index in group {
            let hash = short_hash(&normalize_specifier(&actives[index].service.file_path));
            let name = actives[index].service.class_name.clone();
            actives[index].binding_name = format!("{name}__{hash}");
            actives[index].export_key = format!("{name}_{hash}");
        }
    }

    // Step 6: dependency-import resolution. Specifier snapping considers
    // every known service file, active or not, so deferred expressions
    // rewrite onto the real module paths.
    let known_paths: BTreeSet<String> = all
        .iter()
        .map(|(service, _)| service.file_path.clone())
        .collect();
    let (imports, rename_by_service) = resolve_imports(&actives, &known_paths);

    // Step 7: conditional runtime imports.
    let any_deferred = actives.iter().any(|active| {
        active.service.metadata.factory.is_some()
            || active
                .service
                .metadata
                .dependencies
                .iter()
                .any(|dep| dep.is_deferred)
    });
    let mut runtime_symbols = vec!["Container", "dependenciesRegistry"];
    if any_deferred {
        runtime_symbols.push("Lazy");
    }
    if !actives.is_empty() {
        runtime_symbols.push("registerServiceIdentifier");
    }
    if !input.providers.is_empty() {
        runtime_symbols.push("applyProviders");
    }

    // Steps 8-9: emission.
    let module_text = emit_module(
        &actives,
        &imports,
        &rename_by_service,
        &runtime_symbols,
        &known_paths,
        input,
    );

    // Step 10: ambient declarations.
    let declarations = declarations::render(
        &actives
            .iter()
            .map(|active| active.export_key.clone())
            .collect::<Vec<_>>(),
        &package_exports(&actives),
    );

    Ok(CodegenOutput {
        module_text,
        declarations,
    })
}

/// Steps 1-2: exclude services referenced only deferredly; reinstate any
/// that some active, non-deferred descriptor references by name. Runs to a
/// fixpoint.
fn reconcile_deferred(
    all: &[(DiscoveredService, bool)],
    deferred_keys: &BTreeSet<String>,
) -> BTreeSet<usize> {
    let mut excluded: BTreeSet<usize> = all
        .iter()
        .enumerate()
        .filter(|(_, (service, _))| deferred_keys.contains(&service.deferred_self_key()))
        .map(|(index, _)| index)
        .collect();

    loop {
        let mut eager_names: BTreeSet<&str> = BTreeSet::new();
        for (index, (service, _)) in all.iter().enumerate() {
            if excluded.contains(&index) {
                continue;
            }
            for dep in &service.metadata.dependencies {
                if dep.is_deferred {
                    continue;
                }
                for name in &dep.referenced_identifiers {
                    let type_only = service
                        .referenced_imports
                        .iter()
                        .any(|binding| binding.local_name == *name && binding.is_type_only);
                    if !type_only {
                        eager_names.insert(name.as_str());
                    }
                }
            }
        }

        let reinstate: Vec<usize> = excluded
            .iter()
            .copied()
            .filter(|index| eager_names.contains(all[*index].0.class_name.as_str()))
            .collect();
        if reinstate.is_empty() {
            return excluded;
        }
        for index in reinstate {
            excluded.remove(&index);
        }
    }
}

fn detect_duplicates(actives: &[Active]) -> Result<()> {
    let mut by_name: BTreeMap<&str, (Vec<&str>, Vec<&str>)> = BTreeMap::new();
    for active in actives {
        let entry = by_name
            .entry(active.service.class_name.as_str())
            .or_default();
        if active.from_manifest {
            entry.1.push(active.service.file_path.as_str());
        } else {
            entry.0.push(active.service.file_path.as_str());
        }
    }
    for (class_name, (local_paths, manifest_paths)) in by_name {
        if !local_paths.is_empty() && !manifest_paths.is_empty() {
            return Err(Error::duplicate_registration(
                class_name,
                local_paths.iter().map(|p| p.to_string()).collect(),
                manifest_paths[0],
            ));
        }
    }
    Ok(())
}

/// Stable short base-36 digest of a normalized file path.
pub(crate) fn short_hash(path: &str) -> String {
    let digest = Sha256::digest(path.as_bytes());
    let mut value = u64::from_be_bytes(digest[0..8].try_into().expect("8 digest bytes"));
    if value == 0 {
        return "0".to_string();
    }
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut encoded = Vec::new();
    while value > 0 {
        encoded.push(ALPHABET[(value % 36) as usize]);
        value /= 36;
    }
    encoded.reverse();
    let full = String::from_utf8(encoded).expect("base36 is ascii");
    full[..full.len().min(6)].to_string()
}

/// Resolve a referenced-import specifier to its canonical import path,
/// snapping extensionless specifiers onto known service files.
fn canonical_import_path(service_file: &str, specifier: &str, service_paths: &BTreeSet<String>) -> String {
    if is_bare_specifier(specifier) {
        return specifier.to_string();
    }
    let resolved = if specifier.starts_with('.') {
        resolve_relative(service_file, specifier)
    } else {
        normalize_specifier(specifier)
    };
    if service_paths.contains(&resolved) {
        return resolved;
    }
    for ext in RESOLVE_EXTENSIONS {
        let candidate = format!("{resolved}.{ext}");
        if service_paths.contains(&candidate) {
            return candidate;
        }
        let index_candidate = format!("{resolved}/index.{ext}");
        if service_paths.contains(&index_candidate) {
            return index_candidate;
        }
    }
    resolved
}

fn import_path_for(file_path: &str) -> String {
    if is_bare_specifier(file_path) {
        file_path.to_string()
    } else {
        normalize_specifier(file_path)
    }
}

/// Step 6: build the deduplicated import list and the per-service rename
/// maps used when reconstructing dependency expressions.
fn resolve_imports(
    actives: &[Active],
    service_paths: &BTreeSet<String>,
) -> (Vec<ImportEntry>, Vec<HashMap<String, String>>) {
    let mut entries: Vec<ImportEntry> = Vec::new();
    let mut taken_locals: BTreeSet<String> = BTreeSet::new();
    let mut by_target: HashMap<(String, String), String> = HashMap::new();

    // Service imports claim their binding names first.
    for active in actives {
        if active.stub {
            continue;
        }
        let path = import_path_for(&active.service.file_path);
        let key = (path.clone(), active.service.class_name.clone());
        if by_target.contains_key(&key) {
            continue;
        }
        by_target.insert(key, active.binding_name.clone());
        taken_locals.insert(active.binding_name.clone());
        entries.push(ImportEntry {
            path,
            export: active.service.class_name.clone(),
            local: active.binding_name.clone(),
        });
    }
    // Stub binding names are still reserved: the stub class declaration
    // occupies the name in module scope.
    for active in actives {
        if active.stub {
            taken_locals.insert(active.binding_name.clone());
        }
    }

    let mut renames: Vec<HashMap<String, String>> = Vec::with_capacity(actives.len());
    for active in actives {
        let mut rename: HashMap<String, String> = HashMap::new();
        for binding in &active.service.referenced_imports {
            if binding.is_type_only || binding.module_specifier == RUNTIME_SPECIFIER {
                continue;
            }
            let path = canonical_import_path(
                &active.service.file_path,
                &binding.module_specifier,
                service_paths,
            );
            let export = binding.imported.export_name().to_string();
            let key = (path.clone(), export.clone());
            let local = match by_target.get(&key) {
                Some(existing) => existing.clone(),
                None => {
                    let local = free_local(&binding.local_name, &taken_locals);
                    taken_locals.insert(local.clone());
                    by_target.insert(key, local.clone());
                    entries.push(ImportEntry {
                        path,
                        export,
                        local: local.clone(),
                    });
                    local
                }
            };
            if local != binding.local_name {
                rename.insert(binding.local_name.clone(), local);
            }
        }
        renames.push(rename);
    }

    // Same-file references to aliased services need rewriting too.
    for index in 0..actives.len() {
        let file = actives[index].service.file_path.clone();
        let mut extra: Vec<(String, String)> = Vec::new();
        for other in actives {
            if other.service.file_path == file && other.binding_name != other.service.class_name {
                extra.push((other.service.class_name.clone(), other.binding_name.clone()));
            }
        }
        for (from, to) in extra {
            renames[index].entry(from).or_insert(to);
        }
    }

    entries.sort();
    (entries, renames)
}

fn free_local(desired: &str, taken: &BTreeSet<String>) -> String {
    if !taken.contains(desired) {
        return desired.to_string();
    }
    let mut counter = 1usize;
    loop {
        let candidate = format!("{desired}_{counter}");
        if !taken.contains(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// Steps 8-9: assemble the module text.
fn emit_module(
    actives: &[Active],
    imports: &[ImportEntry],
    renames: &[HashMap<String, String>],
    runtime_symbols: &[&str],
    known_paths: &BTreeSet<String>,
    input: &CodegenInput,
) -> String {
    let mut out = String::new();
    out.push_str("// Generated by Alloy. Do not edit.\n");
    out.push_str(&format!(
        "import {{ {} }} from '{RUNTIME_SPECIFIER}';\n",
        runtime_symbols.join(", ")
    ));

    for entry in imports {
        out.push_str(&render_import(entry));
    }

    let stubs: Vec<&Active> = actives.iter().filter(|active| active.stub).collect();
    if !stubs.is_empty() {
        out.push('\n');
        for active in &stubs {
            out.push_str(&format!("class {} {{}}\n", active.binding_name));
        }
    }

    if !input.providers.is_empty() {
        out.push('\n');
        for (index, provider) in input.providers.iter().enumerate() {
            out.push_str(&format!(
                "import * as providers_{index} from '{}';\n",
                import_path_for(provider)
            ));
        }
    }

    out.push_str("\nconst registrations = [\n");
    for (active, rename) in actives.iter().zip(renames) {
        out.push_str(&render_registration(active, rename, known_paths));
    }
    out.push_str("];\n\n");

    out.push_str("const container = new Container();\n");
    out.push_str("for (const [service, metadata] of registrations) {\n");
    out.push_str("  dependenciesRegistry.set(service, metadata);\n");
    out.push_str("}\n");

    if !input.providers.is_empty() {
        let aliases: Vec<String> = (0..input.providers.len())
            .map(|index| format!("providers_{index}"))
            .collect();
        out.push_str(&format!(
            "applyProviders(container, [{}]);\n",
            aliases.join(", ")
        ));
    }

    if !actives.is_empty() {
        out.push('\n');
        for active in actives {
            out.push_str(&format!(
                "const __id_{} = registerServiceIdentifier({}, Symbol.for(\"{}\"));\n",
                active.binding_name, active.binding_name, active.service.identifier_key
            ));
        }
    }

    out.push_str("\nexport const serviceIdentifiers = {\n");
    for active in actives {
        out.push_str(&format!(
            "  {}: __id_{},\n",
            active.export_key, active.binding_name
        ));
    }
    out.push_str("};\n\n");

    out.push_str("export default container;\n");
    out
}

fn render_import(entry: &ImportEntry) -> String {
    match entry.export.as_str() {
        "default" => format!("import {} from '{}';\n", entry.local, entry.path),
        "*" => format!("import * as {} from '{}';\n", entry.local, entry.path),
        export if export == entry.local => {
            format!("import {{ {} }} from '{}';\n", entry.local, entry.path)
        }
        export => format!(
            "import {{ {} as {} }} from '{}';\n",
            export, entry.local, entry.path
        ),
    }
}

fn render_registration(
    active: &Active,
    rename: &HashMap<String, String>,
    known_paths: &BTreeSet<String>,
) -> String {
    let mut fields = vec![format!("scope: \"{}\"", active.service.metadata.scope.as_str())];
    if !active.service.metadata.dependencies.is_empty() {
        let deps: Vec<String> = active
            .service
            .metadata
            .dependencies
            .iter()
            .map(|dep| reconstruct_expression(dep, &active.service.file_path, rename, known_paths))
            .collect();
        fields.push(format!("dependencies: () => [{}]", deps.join(", ")));
    }
    if let Some(factory) = &active.service.metadata.factory {
        fields.push(format!(
            "factory: {}",
            reconstruct_expression(factory, &active.service.file_path, rename, known_paths)
        ));
    }
    format!(
        "  [{}, {{ {} }}],\n",
        active.binding_name,
        fields.join(", ")
    )
}

/// Step 9: reproduce a dependency expression, rewriting aliased
/// identifiers and normalizing relative `import(...)` specifiers. The rest
/// of the text (retry option bags included) is preserved verbatim.
fn reconstruct_expression(
    dep: &DependencyDescriptor,
    service_file: &str,
    rename: &HashMap<String, String>,
    known_paths: &BTreeSet<String>,
) -> String {
    let mut expression = rewrite_import_specifiers(&dep.expression, service_file, known_paths);
    for name in &dep.referenced_identifiers {
        if let Some(replacement) = rename.get(name) {
            expression = rewrite_identifier(&expression, name, replacement);
        }
    }
    expression
}

fn rewrite_import_specifiers(
    expression: &str,
    service_file: &str,
    known_paths: &BTreeSet<String>,
) -> String {
    // Codegen runs infrequently enough that compiling here keeps the
    // function pure and self-contained.
    let pattern = Regex::new(r#"import\(\s*(['"])([^'"]+)(['"])\s*\)"#).expect("static pattern");
    pattern
        .replace_all(expression, |captures: &regex::Captures<'_>| {
            let quote = &captures[1];
            let specifier = &captures[2];
            if specifier.starts_with('.') {
                let resolved = canonical_import_path(service_file, specifier, known_paths);
                format!("import({quote}{resolved}{quote})")
            } else {
                captures[0].to_string()
            }
        })
        .into_owned()
}

/// Word-boundary identifier rewrite that skips string literals and
/// member-access property positions.
fn rewrite_identifier(expression: &str, from: &str, to: &str) -> String {
    let bytes = expression.as_bytes();
    let mut out = String::with_capacity(expression.len());
    let mut i = 0;
    let mut in_string: Option<u8> = None;

    fn is_ident_start(c: u8) -> bool {
        c.is_ascii_alphabetic() || c == b'_' || c == b'$'
    }
    fn is_ident_char(c: u8) -> bool {
        c.is_ascii_alphanumeric() || c == b'_' || c == b'$'
    }

    while i < bytes.len() {
        let c = bytes[i];
        if let Some(quote) = in_string {
            out.push(c as char);
            if c == quote {
                in_string = None;
            }
            i += 1;
            continue;
        }
        if c == b'\'' || c == b'"' || c == b'`' {
            in_string = Some(c);
            out.push(c as char);
            i += 1;
            continue;
        }
        if is_ident_start(c) {
            let start = i;
            while i < bytes.len() && is_ident_char(bytes[i]) {
                i += 1;
            }
            let word = &expression[start..i];
            let preceded_by_dot = out.trim_end().ends_with('.');
            if word == from && !preceded_by_dot {
                out.push_str(to);
            } else {
                out.push_str(word);
            }
            continue;
        }
        out.push(c as char);
        i += 1;
    }
    out
}

/// Group ingested services by the package their identifier key names, for
/// the per-package ambient declarations.
fn package_exports(actives: &[Active]) -> Vec<(String, Vec<String>)> {
    let mut packages: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for active in actives {
        if !active.from_manifest {
            continue;
        }
        if let Ok(parts) = parse_identifier_key(&active.service.identifier_key) {
            packages
                .entry(parts.package)
                .or_default()
                .push(active.service.class_name.clone());
        }
    }
    packages
        .into_iter()
        .map(|(package, mut exports)| {
            exports.sort();
            (package, exports)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_domain::{ImportBinding, ImportedName, ServiceMetadata};

    fn service(class_name: &str, file_path: &str) -> DiscoveredService {
        DiscoveredService {
            class_name: class_name.to_string(),
            file_path: file_path.to_string(),
            identifier_key: format!("alloy:app{file_path}#{class_name}"),
            metadata: ServiceMetadata::default(),
            referenced_imports: vec![],
        }
    }

    fn with_dep(mut svc: DiscoveredService, dep: DependencyDescriptor) -> DiscoveredService {
        svc.metadata.dependencies.push(dep);
        svc
    }

    #[test]
    fn codegen_is_deterministic_across_input_permutations() {
        let a = service("A", "/src/a.ts");
        let b = service("B", "/src/b.ts");
        let forward = generate(&CodegenInput {
            local_services: vec![a.clone(), b.clone()],
            ..Default::default()
        })
        .unwrap();
        let reversed = generate(&CodegenInput {
            local_services: vec![b, a],
            ..Default::default()
        })
        .unwrap();
        assert_eq!(forward, reversed);
    }

    #[test]
    fn deferred_only_services_are_not_imported_eagerly() {
        let d = service("D", "/src/d.ts");
        let c = with_dep(
            service("C", "/src/c.ts"),
            DependencyDescriptor::deferred(
                "Lazy(() => import('./d').then(m => m.D))".to_string(),
                vec!["Lazy".to_string(), "m".to_string()],
                None,
            ),
        );
        let mut deferred_keys = BTreeSet::new();
        deferred_keys.insert("/src/d.ts::D".to_string());

        let output = generate(&CodegenInput {
            local_services: vec![c, d],
            deferred_keys,
            ..Default::default()
        })
        .unwrap();

        assert!(!output.module_text.contains("import { D }"));
        // Registered exactly once, deferred through the wrapper.
        assert!(output
            .module_text
            .contains("Lazy(() => import('/src/d.ts').then(m => m.D))"));
    }

    #[test]
    fn eager_reference_reinstates_a_deferred_service() {
        let d = service("D", "/src/d.ts");
        let c = {
            let mut c = with_dep(
                service("C", "/src/c.ts"),
                DependencyDescriptor::eager("D".to_string(), vec!["D".to_string()]),
            );
            c.referenced_imports.push(ImportBinding {
                local_name: "D".to_string(),
                module_specifier: "./d".to_string(),
                imported: ImportedName::Named("D".to_string()),
                is_type_only: false,
            });
            c
        };
        let mut deferred_keys = BTreeSet::new();
        deferred_keys.insert("/src/d.ts::D".to_string());

        let output = generate(&CodegenInput {
            local_services: vec![c, d],
            deferred_keys,
            ..Default::default()
        })
        .unwrap();

        // Imported exactly once eagerly, registered exactly once.
        assert_eq!(output.module_text.matches("import { D }").count(), 1);
        assert_eq!(output.module_text.matches("[D, {").count(), 1);
    }

    #[test]
    fn class_name_collisions_alias_with_stable_hashes() {
        let first = service("Service", "/src/one/service.ts");
        let second = service("Service", "/src/two/service.ts");
        let output = generate(&CodegenInput {
            local_services: vec![first, second],
            ..Default::default()
        })
        .unwrap();

        let hash_one = short_hash("/src/one/service.ts");
        let hash_two = short_hash("/src/two/service.ts");
        assert!(output
            .module_text
            .contains(&format!("import {{ Service as Service__{hash_one} }}")));
        assert!(output
            .module_text
            .contains(&format!("import {{ Service as Service__{hash_two} }}")));
        assert!(output
            .module_text
            .contains(&format!("Service_{hash_one}: __id_Service__{hash_one}")));
        assert_eq!(
            output
                .module_text
                .matches("Symbol.for(\"alloy:app/src")
                .count(),
            2
        );
    }

    #[test]
    fn duplicate_local_and_manifest_class_aborts() {
        let local = service("Foo", "/src/foo.ts");
        let manifest = service("Foo", "@acme/lib/foo");
        let err = generate(&CodegenInput {
            local_services: vec![local],
            ingested_services: vec![manifest],
            ..Default::default()
        })
        .unwrap_err();
        match err {
            Error::DuplicateRegistration {
                class_name,
                local_paths,
                manifest_path,
            } => {
                assert_eq!(class_name, "Foo");
                assert_eq!(local_paths, vec!["/src/foo.ts"]);
                assert_eq!(manifest_path, "@acme/lib/foo");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn lazy_services_emit_stubs_with_factories() {
        let db = service("Db", "/src/db.ts");
        let output = generate(&CodegenInput {
            local_services: vec![db],
            lazy_service_keys: vec!["alloy:app/src/db.ts#Db".to_string()],
            ..Default::default()
        })
        .unwrap();

        assert!(output.module_text.contains("class Db {}"));
        assert!(!output.module_text.contains("import { Db }"));
        assert!(output
            .module_text
            .contains("factory: Lazy(() => import('/src/db.ts').then(m => m.Db))"));
    }

    #[test]
    fn foreign_lazy_service_keys_abort() {
        let err = generate(&CodegenInput {
            lazy_service_keys: vec!["di:whatever#X".to_string()],
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, Error::UnsupportedLazyIdentifier { .. }));
    }

    #[test]
    fn providers_are_imported_and_applied_in_order() {
        let output = generate(&CodegenInput {
            local_services: vec![service("A", "/src/a.ts")],
            providers: vec!["/src/wiring/db.ts".to_string(), "/src/wiring/log.ts".to_string()],
            ..Default::default()
        })
        .unwrap();
        assert!(output
            .module_text
            .contains("import * as providers_0 from '/src/wiring/db.ts';"));
        assert!(output
            .module_text
            .contains("import * as providers_1 from '/src/wiring/log.ts';"));
        assert!(output
            .module_text
            .contains("applyProviders(container, [providers_0, providers_1]);"));
    }

    #[test]
    fn runtime_imports_are_conditional() {
        let bare = generate(&CodegenInput {
            local_services: vec![service("A", "/src/a.ts")],
            ..Default::default()
        })
        .unwrap();
        assert!(bare.module_text.contains(
            "import { Container, dependenciesRegistry, registerServiceIdentifier } from '@alloy/runtime';"
        ));
        assert!(!bare.module_text.contains(", Lazy,"));

        let with_deferred = generate(&CodegenInput {
            local_services: vec![with_dep(
                service("A", "/src/a.ts"),
                DependencyDescriptor::deferred(
                    "Lazy(() => import('./b').then(m => m.B))".to_string(),
                    vec!["Lazy".to_string(), "m".to_string()],
                    None,
                ),
            )],
            ..Default::default()
        })
        .unwrap();
        assert!(with_deferred.module_text.contains("Lazy"));
    }

    #[test]
    fn relative_import_specifiers_are_rewritten_absolute() {
        let c = with_dep(
            service("C", "/src/services/c.ts"),
            DependencyDescriptor::deferred(
                "Lazy(() => import('../lazy/d').then(m => m.D))".to_string(),
                vec!["Lazy".to_string(), "m".to_string()],
                None,
            ),
        );
        let output = generate(&CodegenInput {
            local_services: vec![c],
            ..Default::default()
        })
        .unwrap();
        assert!(output
            .module_text
            .contains("Lazy(() => import('/src/lazy/d').then(m => m.D))"));
    }

    #[test]
    fn rewrite_identifier_skips_strings_and_property_positions() {
        assert_eq!(rewrite_identifier("Db", "Db", "Db__x"), "Db__x");
        assert_eq!(rewrite_identifier("m.Db", "Db", "Db__x"), "m.Db");
        assert_eq!(rewrite_identifier("'Db'", "Db", "Db__x"), "'Db'");
        assert_eq!(
            rewrite_identifier("[Db, other.Db, 'Db']", "Db", "Db__x"),
            "[Db__x, other.Db, 'Db']"
        );
        assert_eq!(rewrite_identifier("Dbx", "Db", "Db__x"), "Dbx");
    }

    #[test]
    fn retry_option_bags_are_preserved_verbatim() {
        let c = with_dep(
            service("C", "/src/c.ts"),
            DependencyDescriptor::deferred(
                "Lazy(() => import('./d').then(m => m.D), { retries: 3, backoffMs: 10, factor: 1.5 })"
                    .to_string(),
                vec!["Lazy".to_string(), "m".to_string()],
                None,
            ),
        );
        let output = generate(&CodegenInput {
            local_services: vec![c],
            ..Default::default()
        })
        .unwrap();
        assert!(output
            .module_text
            .contains("{ retries: 3, backoffMs: 10, factor: 1.5 }"));
    }
}
