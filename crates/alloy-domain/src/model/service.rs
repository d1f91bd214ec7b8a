//! Service metadata and the discovered-service record.

use serde::{Deserialize, Serialize};

use super::dependency::DependencyDescriptor;

/// Service lifetime mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// At most one instance per container
    Singleton,
    /// Freshly constructed per resolution
    #[default]
    Transient,
}

impl Scope {
    /// Source-level literal form (`"singleton"` / `"transient"`)
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Singleton => "singleton",
            Scope::Transient => "transient",
        }
    }
}

/// Metadata extracted from a service annotation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ServiceMetadata {
    /// Lifetime mode, default transient
    #[serde(default)]
    pub scope: Scope,
    /// Positional dependency descriptors; position `i` feeds constructor
    /// parameter `i`
    #[serde(default)]
    pub dependencies: Vec<DependencyDescriptor>,
    /// Deferred import fetching the real constructor at resolution time
    /// (service-level deferral); the registered key stays the placeholder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factory: Option<DependencyDescriptor>,
}

/// What an import binding refers to in its source module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportedName {
    /// A named export, possibly renamed locally
    Named(String),
    /// The default export
    Default,
    /// The whole namespace (`* as ns`)
    Namespace,
}

impl ImportedName {
    /// The export name as it appears on the source module
    pub fn export_name(&self) -> &str {
        match self {
            ImportedName::Named(name) => name,
            ImportedName::Default => "default",
            ImportedName::Namespace => "*",
        }
    }
}

/// One import statement binding, as seen by the scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportBinding {
    /// Local name the binding introduces
    pub local_name: String,
    /// Module specifier as written in the source
    pub module_specifier: String,
    /// What the binding refers to on the source module
    pub imported: ImportedName,
    /// True when the statement or the specifier carries the `type` modifier
    pub is_type_only: bool,
}

/// A service discovered by scanning an annotated class declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredService {
    /// The annotated class's declared name; unique per file
    pub class_name: String,
    /// Canonical source location (slash-normalized, absolute unless a bare
    /// package specifier)
    pub file_path: String,
    /// Canonical opaque key anchoring the stable identifier
    pub identifier_key: String,
    /// Extracted service metadata
    pub metadata: ServiceMetadata,
    /// File imports whose local name appears in a dependency expression
    pub referenced_imports: Vec<ImportBinding>,
}

impl DiscoveredService {
    /// The `"<file_path>::<class_name>"` key matched against the
    /// deferred-reference set during codegen.
    pub fn deferred_self_key(&self) -> String {
        crate::keys::deferred_key(&self.file_path, &self.class_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_defaults_to_transient() {
        assert_eq!(Scope::default(), Scope::Transient);
        assert_eq!(ServiceMetadata::default().scope, Scope::Transient);
    }

    #[test]
    fn scope_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Scope::Singleton).unwrap(), "\"singleton\"");
    }
}
