//! Deferred-reference extraction for `Lazy(() => import(...))` calls.

use std::collections::BTreeSet;

use alloy_domain::{deferred_key, is_bare_specifier, resolve_relative, RetryPolicy};
use tree_sitter::Node;

use crate::imports::string_content;
use crate::scanner::{LAZY_WRAPPER, SPECIFIER_EXTENSIONS};

/// The identifier tail of a call's callee (`Lazy` for both `Lazy(...)` and
/// `di.Lazy(...)`).
pub fn callee_tail<'a>(call: Node<'_>, source: &'a str) -> Option<&'a str> {
    let function = call.child_by_field_name("function")?;
    match function.kind() {
        "identifier" => function.utf8_text(source.as_bytes()).ok(),
        "member_expression" => function
            .child_by_field_name("property")?
            .utf8_text(source.as_bytes())
            .ok(),
        _ => None,
    }
}

/// Whether a node is a call to the deferral wrapper.
pub fn is_lazy_call(node: Node<'_>, source: &str) -> bool {
    node.kind() == "call_expression" && callee_tail(node, source) == Some(LAZY_WRAPPER)
}

/// Positional arguments of a call expression.
pub fn call_arguments<'t>(call: Node<'t>, out: &mut Vec<Node<'t>>) {
    if let Some(arguments) = call.child_by_field_name("arguments") {
        for i in 0..arguments.named_child_count() {
            if let Some(arg) = arguments.named_child(i) {
                if arg.kind() != "comment" {
                    out.push(arg);
                }
            }
        }
    }
}

/// Parse the literal retry options bag of a `Lazy(importer, { ... })` call.
///
/// Only literal number values are honored; anything else leaves the field
/// at its default.
pub fn parse_retry_options(call: Node<'_>, source: &str) -> Option<RetryPolicy> {
    let mut args = Vec::new();
    call_arguments(call, &mut args);
    let options = args.get(1).copied()?;
    if options.kind() != "object" {
        return None;
    }
    let mut policy = RetryPolicy::default();
    for i in 0..options.named_child_count() {
        let Some(pair) = options.named_child(i) else {
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
        if value.kind() != "number" {
            continue;
        }
        let Ok(raw) = value.utf8_text(source.as_bytes()) else {
            continue;
        };
        match key_text {
            "retries" => {
                if let Ok(n) = raw.parse::<u32>() {
                    policy.attempts_after_first = n;
                }
            }
            "backoffMs" => {
                if let Ok(n) = raw.parse::<u64>() {
                    policy.initial_backoff_ms = n;
                }
            }
            "factor" => {
                if let Ok(n) = raw.parse::<f64>() {
                    if n > 0.0 {
                        policy.factor = n;
                    }
                }
            }
            _ => {}
        }
    }
    Some(policy)
}

/// Record the deferred-reference keys contributed by one `Lazy(...)` call.
///
/// The first argument must be a function whose return value is a bare
/// dynamic import or a dynamic import chained with `.then(cb)`. Relative
/// specifiers expand into a candidate set over the fixed extension list
/// plus `index.<ext>`; non-relative or non-literal specifiers contribute
/// nothing (the target is conservatively considered eager).
pub fn collect_deferred_keys(
    call: Node<'_>,
    source: &str,
    file_path: &str,
    out: &mut BTreeSet<String>,
) {
    let mut args = Vec::new();
    call_arguments(call, &mut args);
    let Some(importer) = args.first().copied() else {
        return;
    };
    let Some(returned) = function_return_expression(importer) else {
        return;
    };

    let (import_call, export_name) = match split_then_chain(returned, source) {
        Some((import_call, callback)) => {
            let Some(name) = callback_export_name(callback, source) else {
                return;
            };
            (import_call, name)
        }
        None => (returned, "default".to_string()),
    };

    let Some(specifier) = dynamic_import_specifier(import_call, source) else {
        return;
    };
    if is_bare_specifier(&specifier) {
        return;
    }

    for candidate in specifier_candidates(file_path, &specifier) {
        out.insert(deferred_key(&candidate, &export_name));
    }
}

/// Expand a relative specifier into its resolution candidates.
pub fn specifier_candidates(file_path: &str, specifier: &str) -> Vec<String> {
    let resolved = resolve_relative(file_path, specifier);
    let stem = strip_known_extension(&resolved);
    let mut candidates = Vec::new();
    for ext in SPECIFIER_EXTENSIONS {
        candidates.push(format!("{stem}.{ext}"));
    }
    for ext in SPECIFIER_EXTENSIONS {
        candidates.push(format!("{stem}/index.{ext}"));
    }
    candidates
}

fn strip_known_extension(path: &str) -> &str {
    for ext in SPECIFIER_EXTENSIONS {
        if let Some(stem) = path.strip_suffix(&format!(".{ext}")[..]) {
            return stem;
        }
    }
    path
}

/// The expression a nullary function returns, unwrapping parentheses and a
/// single-`return` statement block.
pub fn function_return_expression(function: Node<'_>) -> Option<Node<'_>> {
    let body = match function.kind() {
        "arrow_function" => function.child_by_field_name("body")?,
        "function_expression" | "function_declaration" => function.child_by_field_name("body")?,
        _ => return None,
    };
    unwrap_expression(body)
}

fn unwrap_expression(node: Node<'_>) -> Option<Node<'_>> {
    match node.kind() {
        "parenthesized_expression" => unwrap_expression(node.named_child(0)?),
        "statement_block" => {
            for i in 0..node.named_child_count() {
                let child = node.named_child(i)?;
                if child.kind() == "return_statement" {
                    return unwrap_expression(child.named_child(0)?);
                }
            }
            None
        }
        _ => Some(node),
    }
}

/// Split `import(...).then(cb)` into the import call and the callback.
fn split_then_chain<'t>(node: Node<'t>, source: &str) -> Option<(Node<'t>, Node<'t>)> {
    if node.kind() != "call_expression" {
        return None;
    }
    let function = node.child_by_field_name("function")?;
    if function.kind() != "member_expression" {
        return None;
    }
    let property = function.child_by_field_name("property")?;
    if property.utf8_text(source.as_bytes()).ok()? != "then" {
        return None;
    }
    let object = function.child_by_field_name("object")?;
    let mut args = Vec::new();
    call_arguments(node, &mut args);
    let callback = args.first().copied()?;
    Some((object, callback))
}

/// The string-literal specifier of a dynamic import call, if it is one.
fn dynamic_import_specifier(node: Node<'_>, source: &str) -> Option<String> {
    if node.kind() != "call_expression" {
        return None;
    }
    let function = node.child_by_field_name("function")?;
    if function.kind() != "import" {
        return None;
    }
    let mut args = Vec::new();
    call_arguments(node, &mut args);
    string_content(*args.first()?, source)
}

/// Infer the exported symbol name from a `.then` callback body: property
/// access, bare identifier, or the constructee of a `new` expression.
fn callback_export_name(callback: Node<'_>, source: &str) -> Option<String> {
    let body = function_return_expression(callback)?;
    export_name_of(body, source)
}

fn export_name_of(node: Node<'_>, source: &str) -> Option<String> {
    match node.kind() {
        "member_expression" => node
            .child_by_field_name("property")?
            .utf8_text(source.as_bytes())
            .ok()
            .map(|s| s.to_string()),
        "identifier" => node
            .utf8_text(source.as_bytes())
            .ok()
            .map(|s| s.to_string()),
        "new_expression" => export_name_of(node.child_by_field_name("constructor")?, source),
        _ => None,
    }
}
