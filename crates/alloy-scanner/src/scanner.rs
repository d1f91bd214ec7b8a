//! The source scanner: one source unit in, discovered services and
//! deferred-reference keys out.

use std::collections::BTreeSet;

use alloy_domain::{
    identifier_key, normalize_specifier, DependencyDescriptor, DiscoveredService, Error,
    ImportBinding, Result, Scope, ServiceMetadata,
};
use tracing::debug;
use tree_sitter::Node;

use crate::idents::collect_identifiers;
use crate::imports::{collect_imports, string_content};
use crate::lazy_refs::{
    call_arguments, callee_tail, collect_deferred_keys, function_return_expression, is_lazy_call,
    parse_retry_options,
};

/// Name of the deferral wrapper recognized by the scanner.
pub const LAZY_WRAPPER: &str = "Lazy";

/// Extensions tried when expanding a relative specifier into resolution
/// candidates (also `index.<ext>` inside the path).
pub const SPECIFIER_EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "js", "jsx", "mjs"];

const ANNOTATION_INJECTABLE: &str = "Injectable";
const ANNOTATION_SINGLETON: &str = "Singleton";
const SCOPE_SINGLETON_LITERAL: &str = "singleton";

/// Project facts the scanner needs to mint identifier keys.
#[derive(Debug, Clone)]
pub struct ScanContext {
    /// Name of the package being compiled
    pub package_name: String,
    /// Slash-normalized project root; file paths are made relative to it
    pub project_root: String,
}

impl ScanContext {
    /// Create a context, normalizing the root
    pub fn new(package_name: impl Into<String>, project_root: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
            project_root: normalize_specifier(&project_root.into()),
        }
    }

    fn relative_path(&self, file_path: &str) -> String {
        file_path
            .strip_prefix(self.project_root.as_str())
            .unwrap_or(file_path)
            .trim_start_matches('/')
            .to_string()
    }
}

/// Output of scanning one source unit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FileScan {
    /// Services discovered in the unit, in declaration order
    pub services: Vec<DiscoveredService>,
    /// Deferred-reference keys contributed by `Lazy(...)` calls
    pub deferred_keys: BTreeSet<String>,
}

/// Pure, deterministic scanner over TypeScript source text.
///
/// A fresh tree-sitter parser is built per scan; the scanner itself holds
/// no state and the same input always yields byte-identical output.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceScanner;

impl SourceScanner {
    /// Create a scanner
    pub fn new() -> Self {
        Self
    }

    /// Scan one source unit.
    ///
    /// Unsupported annotation shapes silently leave a class undiscovered;
    /// hard parse failures propagate.
    pub fn scan(&self, source: &str, file_path: &str, ctx: &ScanContext) -> Result<FileScan> {
        let file_path = normalize_specifier(file_path);
        let tree = parse_typescript(source, &file_path)?;
        let root = tree.root_node();

        let imports = collect_imports(root, source);
        let mut scan = FileScan::default();
        self.walk(root, source, &file_path, ctx, &imports, &mut scan);

        debug!(
            target: "alloy::scanner",
            file = %file_path,
            services = scan.services.len(),
            deferred_keys = scan.deferred_keys.len(),
            "scanned source unit"
        );
        Ok(scan)
    }

    fn walk(
        &self,
        node: Node<'_>,
        source: &str,
        file_path: &str,
        ctx: &ScanContext,
        imports: &[ImportBinding],
        scan: &mut FileScan,
    ) {
        match node.kind() {
            "class_declaration" | "abstract_class_declaration" => {
                if let Some(service) = self.discover_class(node, source, file_path, ctx, imports) {
                    scan.services.push(service);
                }
            }
            "call_expression" => {
                if is_lazy_call(node, source) {
                    collect_deferred_keys(node, source, file_path, &mut scan.deferred_keys);
                }
            }
            _ => {}
        }
        for i in 0..node.named_child_count() {
            if let Some(child) = node.named_child(i) {
                self.walk(child, source, file_path, ctx, imports, scan);
            }
        }
    }

    fn discover_class(
        &self,
        class: Node<'_>,
        source: &str,
        file_path: &str,
        ctx: &ScanContext,
        imports: &[ImportBinding],
    ) -> Option<DiscoveredService> {
        let class_name = class
            .child_by_field_name("name")?
            .utf8_text(source.as_bytes())
            .ok()?
            .to_string();

        let metadata = class_decorators(class)
            .into_iter()
            .find_map(|decorator| parse_annotation(decorator, source))?;

        let referenced: BTreeSet<&str> = metadata
            .dependencies
            .iter()
            .flat_map(|dep| dep.referenced_identifiers.iter())
            .map(String::as_str)
            .collect();
        let referenced_imports = imports
            .iter()
            .filter(|binding| referenced.contains(binding.local_name.as_str()))
            .cloned()
            .collect();

        Some(DiscoveredService {
            identifier_key: identifier_key(
                &ctx.package_name,
                &ctx.relative_path(file_path),
                &class_name,
            ),
            class_name,
            file_path: file_path.to_string(),
            metadata,
            referenced_imports,
        })
    }
}

fn parse_typescript(source: &str, file_path: &str) -> Result<tree_sitter::Tree> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into())
        .map_err(|e| Error::internal(format!("failed to load typescript grammar: {e:?}")))?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| Error::parse(file_path, "tree-sitter returned no tree"))?;
    if tree.root_node().has_error() {
        return Err(Error::parse(file_path, "source contains syntax errors"));
    }
    Ok(tree)
}

/// Decorators attached to a class, including ones hoisted onto a wrapping
/// `export` statement (`@Injectable() export class A`).
fn class_decorators(class: Node<'_>) -> Vec<Node<'_>> {
    let mut decorators = Vec::new();
    for i in 0..class.named_child_count() {
        if let Some(child) = class.named_child(i) {
            if child.kind() == "decorator" {
                decorators.push(child);
            }
        }
    }
    if let Some(parent) = class.parent() {
        if parent.kind() == "export_statement" {
            for i in 0..parent.named_child_count() {
                if let Some(child) = parent.named_child(i) {
                    if child.kind() == "decorator" {
                        decorators.push(child);
                    }
                }
            }
        }
    }
    decorators
}

/// Parse one decorator into service metadata, if it is a recognized
/// annotation. Unrecognized shapes yield `None`.
fn parse_annotation(decorator: Node<'_>, source: &str) -> Option<ServiceMetadata> {
    let expression = decorator.named_child(0)?;
    let (tail, args) = match expression.kind() {
        "call_expression" => {
            let tail = callee_tail(expression, source)?;
            let mut args = Vec::new();
            call_arguments(expression, &mut args);
            (tail, args)
        }
        "identifier" => (expression.utf8_text(source.as_bytes()).ok()?, Vec::new()),
        "member_expression" => (
            expression
                .child_by_field_name("property")?
                .utf8_text(source.as_bytes())
                .ok()?,
            Vec::new(),
        ),
        _ => return None,
    };

    let singleton_annotation = match tail {
        ANNOTATION_SINGLETON => true,
        ANNOTATION_INJECTABLE => false,
        _ => return None,
    };

    let mut scope = Scope::Transient;
    let mut dependencies: Option<Vec<DependencyDescriptor>> = None;

    for (position, arg) in args.iter().enumerate() {
        match arg.kind() {
            "string" => {
                // Positional scope literal: first or second argument only.
                if position < 2
                    && string_content(*arg, source).as_deref() == Some(SCOPE_SINGLETON_LITERAL)
                {
                    scope = Scope::Singleton;
                }
            }
            "object" => {
                let (object_scope, object_deps) = parse_options_object(*arg, source);
                if object_scope == Some(Scope::Singleton) {
                    scope = Scope::Singleton;
                }
                if dependencies.is_none() {
                    dependencies = object_deps;
                }
            }
            _ => {
                if dependencies.is_none() {
                    dependencies = dependency_list(*arg, source);
                }
            }
        }
    }

    // The `Singleton` annotation always wins over positional or
    // object-literal scope.
    if singleton_annotation {
        scope = Scope::Singleton;
    }

    Some(ServiceMetadata {
        scope,
        dependencies: dependencies.unwrap_or_default(),
        factory: None,
    })
}

/// Read `scope:` and `dependencies:` from an object-literal argument.
fn parse_options_object(
    object: Node<'_>,
    source: &str,
) -> (Option<Scope>, Option<Vec<DependencyDescriptor>>) {
    let mut scope = None;
    let mut dependencies = None;
    for i in 0..object.named_child_count() {
        let Some(pair) = object.named_child(i) else {
            continue;
        };
        if pair.kind() != "pair" {
            continue;
        }
        let Some(key) = pair.child_by_field_name("key") else {
            continue;
        };
        let Ok(key_text) = key.utf8_text(source.as_bytes()) else {
            continue;
        };
        let Some(value) = pair.child_by_field_name("value") else {
            continue;
        };
        match key_text {
            "scope" => {
                if string_content(value, source).as_deref() == Some(SCOPE_SINGLETON_LITERAL) {
                    scope = Some(Scope::Singleton);
                }
            }
            "dependencies" => {
                dependencies = dependency_list(value, source);
            }
            _ => {}
        }
    }
    (scope, dependencies)
}

/// Parse a dependency-list form: an array literal, a nullary arrow
/// returning an array literal, or a call expression whose arguments form
/// the list (the `deps(...)` helper).
fn dependency_list(node: Node<'_>, source: &str) -> Option<Vec<DependencyDescriptor>> {
    let elements: Vec<Node<'_>> = match node.kind() {
        "array" => array_elements(node),
        "arrow_function" | "function_expression" => {
            let returned = function_return_expression(node)?;
            if returned.kind() != "array" {
                return None;
            }
            array_elements(returned)
        }
        "call_expression" => {
            // A Lazy call is a dependency, never a dependency list.
            if is_lazy_call(node, source) {
                return None;
            }
            let mut args = Vec::new();
            call_arguments(node, &mut args);
            args
        }
        _ => return None,
    };

    Some(
        elements
            .into_iter()
            .map(|element| descriptor_from_expression(element, source))
            .collect(),
    )
}

fn array_elements(array: Node<'_>) -> Vec<Node<'_>> {
    let mut elements = Vec::new();
    for i in 0..array.named_child_count() {
        if let Some(child) = array.named_child(i) {
            if child.kind() != "comment" {
                elements.push(child);
            }
        }
    }
    elements
}

/// Build a dependency descriptor from one list element.
fn descriptor_from_expression(node: Node<'_>, source: &str) -> DependencyDescriptor {
    let expression = node
        .utf8_text(source.as_bytes())
        .unwrap_or_default()
        .to_string();
    let referenced_identifiers = collect_identifiers(node, source);
    if is_lazy_call(node, source) {
        let retry = parse_retry_options(node, source);
        DependencyDescriptor::deferred(expression, referenced_identifiers, retry)
    } else {
        DependencyDescriptor::eager(expression, referenced_identifiers)
    }
}
