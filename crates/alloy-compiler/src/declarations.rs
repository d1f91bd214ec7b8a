//! Ambient type-declaration emission for the virtual module.

use crate::codegen::{RUNTIME_SPECIFIER, VIRTUAL_MODULE_ID};

/// Render the ambient declaration text: the virtual-module declaration
/// plus, when manifests were ingested, one `<package>/manifest` and
/// `<package>/service-identifiers` module per package.
pub fn render(export_keys: &[String], packages: &[(String, Vec<String>)]) -> String {
    let mut out = String::new();
    out.push_str("// Generated by Alloy. Do not edit.\n");
    out.push_str(&format!("declare module '{VIRTUAL_MODULE_ID}' {{\n"));
    out.push_str(&format!(
        "  import type {{ Container, ServiceId }} from '{RUNTIME_SPECIFIER}';\n\n"
    ));
    out.push_str("  export const serviceIdentifiers: {\n");
    for key in export_keys {
        out.push_str(&format!("    readonly {key}: ServiceId;\n"));
    }
    out.push_str("  };\n\n");
    out.push_str("  const container: Container;\n");
    out.push_str("  export default container;\n");
    out.push_str("}\n");

    for (package, exports) in packages {
        out.push('\n');
        out.push_str(&format!("declare module '{package}/manifest' {{\n"));
        out.push_str("  export const manifest: {\n");
        out.push_str("    readonly schemaVersion: number;\n");
        out.push_str("    readonly packageName: string;\n");
        out.push_str("    readonly buildMode: 'preserve-modules' | 'chunks' | 'bundled';\n");
        out.push_str("    readonly services: ReadonlyArray<Record<string, unknown>>;\n");
        out.push_str("  };\n");
        out.push_str("}\n\n");
        out.push_str(&format!("declare module '{package}/service-identifiers' {{\n"));
        out.push_str(&format!(
            "  import type {{ ServiceId }} from '{RUNTIME_SPECIFIER}';\n\n"
        ));
        for export in exports {
            out.push_str(&format!("  export const {export}: ServiceId;\n"));
        }
        out.push_str("}\n");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declares_the_virtual_module_with_one_entry_per_service() {
        let text = render(&["A".to_string(), "Service_x1y2".to_string()], &[]);
        assert!(text.contains("declare module 'virtual:alloy-container'"));
        assert!(text.contains("readonly A: ServiceId;"));
        assert!(text.contains("readonly Service_x1y2: ServiceId;"));
        assert!(text.contains("export default container;"));
        assert!(!text.contains("/manifest"));
    }

    #[test]
    fn ingested_packages_get_their_own_ambient_modules() {
        let text = render(
            &["DbClient".to_string()],
            &[("@acme/db".to_string(), vec!["DbClient".to_string()])],
        );
        assert!(text.contains("declare module '@acme/db/manifest'"));
        assert!(text.contains("declare module '@acme/db/service-identifiers'"));
        assert!(text.contains("export const DbClient: ServiceId;"));
    }
}
