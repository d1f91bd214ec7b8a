//! Lexical identifier collection inside dependency expressions.

use tree_sitter::Node;

/// Collect identifier names referenced inside `node`, in first-occurrence
/// order with duplicates dropped.
///
/// The walk descends into property-assignment initializers and computed
/// property names, and recurses into call arguments (so targets inside
/// `Lazy(...)` stay recorded). Plain property keys and member-access
/// property names are not identifier uses and are skipped; keywords never
/// appear because tree-sitter tokenizes them as anonymous nodes.
pub fn collect_identifiers(node: Node<'_>, source: &str) -> Vec<String> {
    let mut out = Vec::new();
    walk(node, source, &mut out);
    out
}

fn record(name: &str, out: &mut Vec<String>) {
    if !out.iter().any(|seen| seen == name) {
        out.push(name.to_string());
    }
}

fn walk(node: Node<'_>, source: &str, out: &mut Vec<String>) {
    match node.kind() {
        "identifier" => {
            if let Ok(text) = node.utf8_text(source.as_bytes()) {
                record(text, out);
            }
        }
        // `{ a }` — the shorthand value position is an identifier use.
        "shorthand_property_identifier" => {
            if let Ok(text) = node.utf8_text(source.as_bytes()) {
                record(text, out);
            }
        }
        // `a.b.c` — only the object side contains identifier uses.
        "member_expression" => {
            if let Some(object) = node.child_by_field_name("object") {
                walk(object, source, out);
            }
        }
        // `{ key: value }` — descend into the initializer; a computed key
        // (`[expr]: value`) is an expression and is walked too.
        "pair" => {
            if let Some(key) = node.child_by_field_name("key") {
                if key.kind() == "computed_property_name" {
                    walk(key, source, out);
                }
            }
            if let Some(value) = node.child_by_field_name("value") {
                walk(value, source, out);
            }
        }
        // Strings and templates contain no identifier uses (template
        // substitutions are handled by the default arm via their children).
        "string" | "number" | "regex" => {}
        _ => {
            for i in 0..node.named_child_count() {
                if let Some(child) = node.named_child(i) {
                    walk(child, source, out);
                }
            }
        }
    }
}
