//! Binding Generator - full regeneration
//!
//! All-or-nothing: any identifier error aborts before a single buffer
//! is returned.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::BindingError;
use crate::exclusion::{protect, ExclusionRules, Preprocessor};
use crate::identifier::Identifier;
use crate::manifest::{AssetEntry, Manifest};
use crate::public_path::DEFAULT_PUBLIC_SCOPE;
use crate::render;

/// What every binding operation needs besides the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingOptions {
    pub public_scope: String,
    #[serde(default)]
    pub exclusions: ExclusionRules,
}

impl Default for BindingOptions {
    fn default() -> Self {
        Self {
            public_scope: DEFAULT_PUBLIC_SCOPE.to_string(),
            exclusions: ExclusionRules::none(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingSet {
    pub declarations: String,
    pub definitions: String,
    pub script: String,
}

impl BindingSet {
    /// `(file name, contents)` for each artifact, in write order.
    pub fn artifacts(&self) -> [(&'static str, &str); 3] {
        [
            (render::DECLARATIONS_FILE, &self.declarations),
            (render::DEFINITIONS_FILE, &self.definitions),
            (render::SCRIPT_FILE, &self.script),
        ]
    }
}

/// Synthesize every identifier, failing on the first overlong or
/// duplicate one.
pub fn resolve_identifiers(
    manifest: &Manifest,
) -> Result<Vec<(&AssetEntry, Identifier)>, BindingError> {
    let mut seen: HashMap<Identifier, &str> = HashMap::with_capacity(manifest.len());
    let mut resolved = Vec::with_capacity(manifest.len());

    for entry in manifest {
        let identifier = entry.identifier()?;
        if let Some(first) = seen.get(&identifier) {
            return Err(BindingError::DuplicateIdentifier {
                identifier: identifier.to_string(),
                first: first.to_string(),
                second: entry.source_path.clone(),
            });
        }
        seen.insert(identifier.clone(), &entry.source_path);
        resolved.push((entry, identifier));
    }
    Ok(resolved)
}

pub fn generate(manifest: &Manifest, options: &BindingOptions) -> Result<BindingSet, BindingError> {
    let resolved = resolve_identifiers(manifest)?;

    let mut declarations = render::declarations_preamble();
    let mut definitions = render::definitions_preamble();

    for (entry, identifier) in &resolved {
        let public_path = entry.public_path(&options.public_scope);
        let rule = options.exclusions.rule_for(&entry.source_path);

        protect(rule, &entry.source_path, &Preprocessor, &mut declarations, |sink| {
            sink.push_str(&render::declaration_line(identifier))
        });
        protect(rule, &entry.source_path, &Preprocessor, &mut definitions, |sink| {
            sink.push_str(&render::definition_line(identifier, &public_path))
        });
    }
    declarations.push_str(&render::declarations_postamble());
    definitions.push_str(&render::definitions_postamble());

    Ok(BindingSet {
        declarations,
        definitions,
        script: render_script(manifest, options),
    })
}

/// The script artifact: one `"alias": "public path"` pair per entry.
pub fn render_script(manifest: &Manifest, options: &BindingOptions) -> String {
    let pairs: Vec<String> = manifest
        .iter()
        .map(|e| render::script_entry(&e.alias, &e.public_path(&options.public_scope)))
        .collect();

    let mut script = render::script_open();
    if !pairs.is_empty() {
        script.push_str(&pairs.join(",\n"));
        script.push('\n');
    }
    script.push_str(render::script_close());
    script
}
