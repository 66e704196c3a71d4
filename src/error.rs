//! Binding Errors - Terminal, Path-Carrying
//!
//! Every variant names the source path(s) or identifier a human needs
//! to fix the tree without reading generated output.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BindingError {
    #[error("Cannot generate a variable name for `{source_path}`: identifier for `{alias}` is {length} characters long (max {max})", max = crate::identifier::MAX_IDENTIFIER_LENGTH)]
    IdentifierTooLong {
        source_path: String,
        alias: String,
        length: usize,
    },

    #[error("Cannot generate a variable name for `{second}`: `{identifier}` duplicates `{first}`")]
    DuplicateIdentifier {
        identifier: String,
        first: String,
        second: String,
    },

    #[error("Malformed {artifact}: {reason}")]
    MalformedBindingFile { artifact: String, reason: String },

    #[error("Broken register for `{identifier}` in assets.cpp: regenerate the bindings without --update")]
    InconsistentBindingFile { identifier: String },

    #[error("Asset not found for asset_path({alias})")]
    UnresolvedAssetReference { alias: String },
}

impl BindingError {
    /// Paths or identifiers this error is about, for machine-readable reports.
    pub fn subjects(&self) -> Vec<&str> {
        match self {
            Self::IdentifierTooLong { source_path, .. } => vec![source_path],
            Self::DuplicateIdentifier { first, second, .. } => vec![first, second],
            Self::MalformedBindingFile { artifact, .. } => vec![artifact],
            Self::InconsistentBindingFile { identifier } => vec![identifier],
            Self::UnresolvedAssetReference { alias } => vec![alias],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_names_both_paths() {
        let err = BindingError::DuplicateIdentifier {
            identifier: "a_b".to_string(),
            first: "/src/a.b".to_string(),
            second: "/src/a_b".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/src/a.b"));
        assert!(msg.contains("/src/a_b"));
        assert_eq!(err.subjects(), vec!["/src/a.b", "/src/a_b"]);
    }

    #[test]
    fn test_inconsistent_mentions_regeneration() {
        let err = BindingError::InconsistentBindingFile { identifier: "app_js".to_string() };
        assert!(err.to_string().contains("without --update"));
    }
}
