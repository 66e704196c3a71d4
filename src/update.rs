//! Binding Updater - incremental patch of generated files
//!
//! New identifiers are inserted right after the namespace brace;
//! existing ones only get their quoted value replaced, and entries that
//! left the manifest are pruned. Anything the updater cannot place
//! structurally is an error, never a guess.

use std::collections::HashSet;

use crate::document::BindingDocument;
use crate::error::BindingError;
use crate::exclusion::{protect, Preprocessor};
use crate::generate::{resolve_identifiers, BindingOptions};
use crate::manifest::Manifest;
use crate::render;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatedBindings {
    pub declarations: String,
    pub definitions: String,
    /// Identifiers inserted by this update, in manifest order.
    pub inserted: Vec<String>,
    /// Identifiers whose definition value changed.
    pub changed: Vec<String>,
    /// Identifiers dropped because no manifest entry produces them.
    pub removed: Vec<String>,
}

impl UpdatedBindings {
    pub fn is_noop(&self) -> bool {
        self.inserted.is_empty() && self.changed.is_empty() && self.removed.is_empty()
    }
}

pub fn update(
    manifest: &Manifest,
    options: &BindingOptions,
    existing_declarations: &str,
    existing_definitions: &str,
) -> Result<UpdatedBindings, BindingError> {
    let resolved = resolve_identifiers(manifest)?;
    let mut declarations = BindingDocument::parse(render::DECLARATIONS_FILE, existing_declarations)?;
    let mut definitions = BindingDocument::parse(render::DEFINITIONS_FILE, existing_definitions)?;
    let mut inserted = vec![];
    let mut changed = vec![];

    for (entry, identifier) in &resolved {
        let public_path = entry.public_path(&options.public_scope);

        if !declarations.declares(identifier) {
            // A definition without its declaration is as broken as the reverse.
            if definitions.defines(identifier) {
                return Err(BindingError::InconsistentBindingFile {
                    identifier: identifier.to_string(),
                });
            }
            let rule = options.exclusions.rule_for(&entry.source_path);
            let mut declaration = String::new();
            let mut definition = String::new();
            protect(rule, &entry.source_path, &Preprocessor, &mut declaration, |sink| {
                sink.push_str(&render::declaration_line(identifier))
            });
            protect(rule, &entry.source_path, &Preprocessor, &mut definition, |sink| {
                sink.push_str(&render::definition_line(identifier, &public_path))
            });
            declarations.insert_front(&declaration);
            definitions.insert_front(&definition);
            inserted.push(identifier.to_string());
            continue;
        }

        match definitions.set_definition(identifier, &public_path) {
            Some(true) => changed.push(identifier.to_string()),
            Some(false) => {}
            None => {
                return Err(BindingError::InconsistentBindingFile {
                    identifier: identifier.to_string(),
                })
            }
        }
    }

    let live: HashSet<&str> = resolved.iter().map(|(_, id)| id.as_str()).collect();
    let mut stale: Vec<String> = vec![];
    for (identifier, _) in declarations.entries().into_iter().chain(definitions.entries()) {
        if !live.contains(identifier) && !stale.iter().any(|s| s == identifier) {
            stale.push(identifier.to_string());
        }
    }
    for identifier in &stale {
        declarations.remove_entry(identifier);
        definitions.remove_entry(identifier);
    }

    Ok(UpdatedBindings {
        declarations: declarations.render(),
        definitions: definitions.render(),
        inserted,
        changed,
        removed: stale,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exclusion::ExclusionRule;
    use crate::generate::generate;

    fn manifest() -> Manifest {
        let mut m = Manifest::new();
        m.register("/src/app.js", "app.js", b"app v1");
        m.register("/src/site.css", "site.css", b"site");
        m
    }

    #[test]
    fn test_update_after_generate_is_identity() {
        let m = manifest();
        let options = BindingOptions::default();
        let set = generate(&m, &options).unwrap();
        let updated = update(&m, &options, &set.declarations, &set.definitions).unwrap();

        assert_eq!(updated.declarations, set.declarations);
        assert_eq!(updated.definitions, set.definitions);
        assert!(updated.is_noop());
    }

    #[test]
    fn test_fingerprint_change_touches_one_line() {
        let mut m = manifest();
        let options = BindingOptions::default();
        let set = generate(&m, &options).unwrap();

        m.register("/src/app.js", "app.js", b"app v2");
        let updated = update(&m, &options, &set.declarations, &set.definitions).unwrap();

        assert_eq!(updated.declarations, set.declarations);
        assert_eq!(updated.changed, vec!["app_js".to_string()]);
        let diff: Vec<_> = set
            .definitions
            .lines()
            .zip(updated.definitions.lines())
            .filter(|(a, b)| a != b)
            .collect();
        assert_eq!(diff.len(), 1);
        assert!(diff[0].0.contains("app_js"));
        assert_eq!(set.definitions.lines().count(), updated.definitions.lines().count());
    }

    #[test]
    fn test_new_entry_inserted_after_brace() {
        let m = manifest();
        let options = BindingOptions::default();
        let set = generate(&m, &options).unwrap();

        let mut grown = manifest();
        grown.register("/src/new.png", "new.png", b"png");
        let updated = update(&grown, &options, &set.declarations, &set.definitions).unwrap();

        assert!(updated
            .declarations
            .contains("namespace Assets\n{\n  extern const char* new_png;\n  extern const char* app_js;\n"));
        assert!(updated.definitions.contains("{\n  const char* new_png = \"/assets/new-"));
        assert_eq!(updated.inserted, vec!["new_png".to_string()]);

        // A second pass finds everything in place.
        let again = update(&grown, &options, &updated.declarations, &updated.definitions).unwrap();
        assert!(again.is_noop());
        assert_eq!(again.definitions, updated.definitions);
    }

    #[test]
    fn test_new_entry_guarded() {
        let options = BindingOptions {
            exclusions: ExclusionRule::new("NO_NEW", ["/src/new.png"]).into(),
            ..BindingOptions::default()
        };
        let set = generate(&manifest(), &options).unwrap();
        let mut grown = manifest();
        grown.register("/src/new.png", "new.png", b"png");
        let updated = update(&grown, &options, &set.declarations, &set.definitions).unwrap();

        assert!(updated.declarations.contains("{\n#ifndef NO_NEW\n  extern const char* new_png;\n#endif\n"));
        assert!(updated.definitions.contains("{\n#ifndef NO_NEW\n  const char* new_png = "));
    }

    #[test]
    fn test_unrelated_content_preserved() {
        let m = manifest();
        let options = BindingOptions::default();
        let set = generate(&m, &options).unwrap();
        let edited = set.definitions.replace("namespace Assets", "// keep me\nnamespace Assets");

        let updated = update(&m, &options, &set.declarations, &edited).unwrap();
        assert_eq!(updated.definitions, edited);
    }

    #[test]
    fn test_missing_namespace_is_malformed() {
        let m = manifest();
        let set = generate(&m, &BindingOptions::default()).unwrap();
        let broken = set.declarations.replace("namespace Assets\n", "");

        let err = update(&m, &BindingOptions::default(), &broken, &set.definitions).unwrap_err();
        assert!(matches!(err, BindingError::MalformedBindingFile { ref artifact, .. } if artifact == "assets.hpp"));
    }

    #[test]
    fn test_missing_definitions_namespace_is_malformed() {
        let m = manifest();
        let set = generate(&m, &BindingOptions::default()).unwrap();
        let broken = set.definitions.replace("namespace Assets\n", "");

        let err = update(&m, &BindingOptions::default(), &set.declarations, &broken).unwrap_err();
        assert!(matches!(err, BindingError::MalformedBindingFile { ref artifact, .. } if artifact == "assets.cpp"));
    }

    #[test]
    fn test_removed_entry_is_pruned() {
        let options = BindingOptions {
            exclusions: ExclusionRule::new("NO_GONE", ["/src/gone.js"]).into(),
            ..BindingOptions::default()
        };
        let mut before = manifest();
        before.register("/src/gone.js", "gone.js", b"gone");
        let set = generate(&before, &options).unwrap();

        let updated = update(&manifest(), &options, &set.declarations, &set.definitions).unwrap();
        assert_eq!(updated.removed, vec!["gone_js".to_string()]);
        assert!(!updated.declarations.contains("gone_js"));
        assert!(!updated.definitions.contains("gone_js"));
        assert!(!updated.declarations.contains("NO_GONE"));

        // Same bytes as a fresh generation over the shrunken manifest.
        let fresh = generate(&manifest(), &options).unwrap();
        assert_eq!(updated.declarations, fresh.declarations);
        assert_eq!(updated.definitions, fresh.definitions);
    }

    #[test]
    fn test_declared_but_undefined_is_inconsistent() {
        let m = manifest();
        let set = generate(&m, &BindingOptions::default()).unwrap();
        let broken: String = set
            .definitions
            .lines()
            .filter(|l| !l.contains("app_js"))
            .map(|l| format!("{l}\n"))
            .collect();

        let err = update(&m, &BindingOptions::default(), &set.declarations, &broken).unwrap_err();
        assert_eq!(err, BindingError::InconsistentBindingFile { identifier: "app_js".to_string() });
    }

    #[test]
    fn test_prefix_identifier_is_not_a_match() {
        let mut m = Manifest::new();
        m.register("/src/app", "app", b"x");
        let set = generate(&m, &BindingOptions::default()).unwrap();

        let mut longer = Manifest::new();
        longer.register("/src/app_js", "app_js", b"y");
        let updated = update(&longer, &BindingOptions::default(), &set.declarations, &set.definitions).unwrap();
        assert_eq!(updated.inserted, vec!["app_js".to_string()]);
    }

    #[test]
    fn test_duplicates_rejected() {
        let mut m = Manifest::new();
        m.register("/src/a.b", "a.b", b"1");
        m.register("/src/a_b", "a_b", b"2");
        let set = generate(&Manifest::new(), &BindingOptions::default()).unwrap();
        let err = update(&m, &BindingOptions::default(), &set.declarations, &set.definitions).unwrap_err();
        assert!(matches!(err, BindingError::DuplicateIdentifier { .. }));
    }
}
