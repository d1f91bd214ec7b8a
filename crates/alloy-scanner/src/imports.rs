//! Import-statement collection.

use alloy_domain::{ImportBinding, ImportedName};
use tree_sitter::Node;

/// Collect every import binding declared by the source unit.
///
/// Recognizes default imports, named imports (with and without renaming),
/// namespace imports, and the `type` modifier at both statement and
/// specifier granularity.
pub fn collect_imports(root: Node<'_>, source: &str) -> Vec<ImportBinding> {
    let mut bindings = Vec::new();
    for i in 0..root.named_child_count() {
        let Some(statement) = root.named_child(i) else {
            continue;
        };
        if statement.kind() == "import_statement" {
            collect_from_statement(statement, source, &mut bindings);
        }
    }
    bindings
}

fn collect_from_statement(statement: Node<'_>, source: &str, out: &mut Vec<ImportBinding>) {
    let Some(specifier) = statement
        .child_by_field_name("source")
        .and_then(|s| string_content(s, source))
    else {
        return;
    };

    let statement_type_only = has_type_keyword(statement);

    for i in 0..statement.named_child_count() {
        let Some(clause) = statement.named_child(i) else {
            continue;
        };
        if clause.kind() != "import_clause" {
            continue;
        }
        for j in 0..clause.named_child_count() {
            let Some(part) = clause.named_child(j) else {
                continue;
            };
            match part.kind() {
                "identifier" => {
                    if let Ok(local) = part.utf8_text(source.as_bytes()) {
                        out.push(ImportBinding {
                            local_name: local.to_string(),
                            module_specifier: specifier.clone(),
                            imported: ImportedName::Default,
                            is_type_only: statement_type_only,
                        });
                    }
                }
                "namespace_import" => {
                    if let Some(local) = first_identifier(part, source) {
                        out.push(ImportBinding {
                            local_name: local,
                            module_specifier: specifier.clone(),
                            imported: ImportedName::Namespace,
                            is_type_only: statement_type_only,
                        });
                    }
                }
                "named_imports" => {
                    for k in 0..part.named_child_count() {
                        let Some(spec) = part.named_child(k) else {
                            continue;
                        };
                        if spec.kind() != "import_specifier" {
                            continue;
                        }
                        let Some(name_node) = spec.child_by_field_name("name") else {
                            continue;
                        };
                        let Some(export_name) = identifier_or_string(name_node, source) else {
                            continue;
                        };
                        let local = spec
                            .child_by_field_name("alias")
                            .and_then(|alias| identifier_or_string(alias, source))
                            .unwrap_or_else(|| export_name.clone());
                        out.push(ImportBinding {
                            local_name: local,
                            module_specifier: specifier.clone(),
                            imported: ImportedName::Named(export_name),
                            is_type_only: statement_type_only || has_type_keyword(spec),
                        });
                    }
                }
                _ => {}
            }
        }
    }
}

/// Whether a node carries an anonymous `type` keyword child
/// (`import type { A }` / `import { type A }`).
fn has_type_keyword(node: Node<'_>) -> bool {
    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            if !child.is_named() && child.kind() == "type" {
                return true;
            }
        }
    }
    false
}

fn first_identifier(node: Node<'_>, source: &str) -> Option<String> {
    for i in 0..node.named_child_count() {
        let child = node.named_child(i)?;
        if child.kind() == "identifier" {
            return child
                .utf8_text(source.as_bytes())
                .ok()
                .map(|s| s.to_string());
        }
    }
    None
}

fn identifier_or_string(node: Node<'_>, source: &str) -> Option<String> {
    match node.kind() {
        "identifier" => node
            .utf8_text(source.as_bytes())
            .ok()
            .map(|s| s.to_string()),
        "string" => string_content(node, source),
        _ => None,
    }
}

/// Extract the content of a string literal node.
pub fn string_content(node: Node<'_>, source: &str) -> Option<String> {
    if node.kind() != "string" {
        return None;
    }
    for i in 0..node.named_child_count() {
        let child = node.named_child(i)?;
        if child.kind() == "string_fragment" {
            return child
                .utf8_text(source.as_bytes())
                .ok()
                .map(|s| s.to_string());
        }
    }
    // Empty string literal: no fragment child.
    Some(String::new())
}
