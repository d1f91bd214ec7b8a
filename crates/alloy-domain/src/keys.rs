//! Identifier keys and module-specifier normalization.
//!
//! Every discovered service is anchored by a canonical opaque key of the
//! form `alloy:<package>/<relative-path>#<class-name>`. The key doubles as
//! the symbol description in generated code, which is what makes service
//! identifiers stable across minification and across independently built
//! packages.

use crate::error::{Error, Result};

/// Prefix every Alloy identifier key carries
pub const IDENTIFIER_KEY_PREFIX: &str = "alloy:";

/// Decomposed identifier key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierKeyParts {
    /// Package name, possibly scoped (`@scope/name`)
    pub package: String,
    /// Path of the declaring file relative to the package root
    pub relative_path: String,
    /// Declared class name
    pub class_name: String,
}

/// Build the canonical identifier key for a service.
pub fn identifier_key(package: &str, relative_path: &str, class_name: &str) -> String {
    let rel = relative_path
        .replace('\\', "/")
        .trim_start_matches("./")
        .trim_start_matches('/')
        .to_string();
    format!("{IDENTIFIER_KEY_PREFIX}{package}/{rel}#{class_name}")
}

/// Parse and validate an identifier key.
///
/// Used to vet `lazy_services` configuration entries; anything without the
/// `alloy:` prefix is a misconfiguration and surfaces as
/// [`Error::UnsupportedLazyIdentifier`].
pub fn parse_identifier_key(key: &str) -> Result<IdentifierKeyParts> {
    let rest = key
        .strip_prefix(IDENTIFIER_KEY_PREFIX)
        .ok_or_else(|| Error::unsupported_lazy_identifier(key))?;

    let (path_part, class_name) = rest
        .rsplit_once('#')
        .ok_or_else(|| Error::unsupported_lazy_identifier(key))?;

    if class_name.is_empty() || path_part.is_empty() {
        return Err(Error::unsupported_lazy_identifier(key));
    }

    // Scoped packages occupy the first two path segments.
    let segments_in_package = if path_part.starts_with('@') { 2 } else { 1 };
    let mut split = 0usize;
    let mut seen = 0usize;
    for (idx, ch) in path_part.char_indices() {
        if ch == '/' {
            seen += 1;
            if seen == segments_in_package {
                split = idx;
                break;
            }
        }
    }
    let (package, relative_path) = if split > 0 {
        (&path_part[..split], &path_part[split + 1..])
    } else {
        (path_part, "")
    };

    Ok(IdentifierKeyParts {
        package: package.to_string(),
        relative_path: relative_path.to_string(),
        class_name: class_name.to_string(),
    })
}

/// Build a deferred-reference key `"<path>::<export>"`.
pub fn deferred_key(path: &str, export: &str) -> String {
    format!("{path}::{export}")
}

/// Whether a module specifier is a bare package specifier
/// (`react`, `@scope/pkg/sub`) rather than a path.
pub fn is_bare_specifier(spec: &str) -> bool {
    !(spec.starts_with('.') || spec.starts_with('/') || spec.starts_with('\\'))
}

/// Normalize a module specifier to POSIX slashes, collapsing `.` and `..`
/// segments. Path specifiers keep a leading slash; bare specifiers are
/// returned untouched apart from slash normalization.
pub fn normalize_specifier(spec: &str) -> String {
    let slashed = spec.replace('\\', "/");
    if is_bare_specifier(&slashed) {
        return slashed;
    }
    let mut out: Vec<&str> = Vec::new();
    for segment in slashed.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    format!("/{}", out.join("/"))
}

/// Resolve a relative specifier against the directory of `base_file`,
/// producing a normalized absolute path.
pub fn resolve_relative(base_file: &str, spec: &str) -> String {
    let slashed = base_file.replace('\\', "/");
    let dir = match slashed.rsplit_once('/') {
        Some((dir, _)) => dir,
        None => "",
    };
    normalize_specifier(&format!("{dir}/{spec}"))
}
