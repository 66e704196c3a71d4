//! Public Path Resolver and asset_path() substitution

use regex::{Captures, Regex};
use std::path::Path;
use std::sync::OnceLock;

use crate::error::BindingError;
use crate::manifest::Manifest;

pub const DEFAULT_PUBLIC_SCOPE: &str = "assets/";

/// Content-addressed file name: `main-v2-<fingerprint>.js`.
///
/// Paths without a stem fall back to `<filename>-<fingerprint>`.
pub fn filename_with_fingerprint(source_path: &str, fingerprint: &str) -> String {
    let path = Path::new(source_path);
    match (path.file_stem(), path.extension()) {
        (Some(stem), Some(ext)) => format!(
            "{}-{}.{}",
            stem.to_string_lossy(),
            fingerprint,
            ext.to_string_lossy()
        ),
        (Some(stem), None) => format!("{}-{}", stem.to_string_lossy(), fingerprint),
        _ => {
            let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
            format!("{}-{}", name, fingerprint)
        }
    }
}

/// `/` + public scope + content-addressed file name.
pub fn public_path(source_path: &str, fingerprint: &str, public_scope: &str) -> String {
    format!("/{}{}", public_scope, filename_with_fingerprint(source_path, fingerprint))
}

fn asset_path_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"asset_path\(([^)]+)\)").expect("static pattern"))
}

/// Replace every `asset_path(<alias>)` in `source` with the alias's
/// public path. One unresolved alias fails the whole document.
pub fn substitute_asset_paths(
    source: &str,
    manifest: &Manifest,
    public_scope: &str,
) -> Result<String, BindingError> {
    let mut missing = None;
    let output = asset_path_pattern().replace_all(source, |caps: &Captures| {
        let alias = caps[1].trim();
        match manifest.lookup_by_alias(alias) {
            Some(entry) => entry.public_path(public_scope),
            None => {
                missing.get_or_insert_with(|| alias.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(alias) => Err(BindingError::UnresolvedAssetReference { alias }),
        None => Ok(output.into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_path_shape() {
        assert_eq!(
            public_path("app/main-v2.js", "abc123", DEFAULT_PUBLIC_SCOPE),
            "/assets/main-v2-abc123.js"
        );
    }

    #[test]
    fn test_public_path_uses_file_name_only() {
        assert_eq!(
            public_path("/srv/app/assets/css/site.min.css", "ff", "static/"),
            "/static/site.min-ff.css"
        );
    }

    #[test]
    fn test_no_extension() {
        assert_eq!(filename_with_fingerprint("bin/LICENSE", "ab"), "LICENSE-ab");
    }

    #[test]
    fn test_dotfile_fallback() {
        assert_eq!(filename_with_fingerprint("conf/.htaccess", "ab"), ".htaccess-ab");
    }

    #[test]
    fn test_substitute() {
        let mut m = Manifest::new();
        m.register("/src/img/logo.png", "img/logo.png", b"png");
        let fp = m.get("/src/img/logo.png").unwrap().fingerprint.clone();

        let css = "a { background: url(asset_path(img/logo.png)); }";
        let out = substitute_asset_paths(css, &m, DEFAULT_PUBLIC_SCOPE).unwrap();
        assert_eq!(out, format!("a {{ background: url(/assets/logo-{fp}.png); }}"));
    }

    #[test]
    fn test_substitute_without_markers_is_identity() {
        let m = Manifest::new();
        assert_eq!(substitute_asset_paths("body {}", &m, "assets/").unwrap(), "body {}");
    }

    #[test]
    fn test_substitute_unresolved_fails_document() {
        let mut m = Manifest::new();
        m.register("/src/a.png", "a.png", b"a");
        let err = substitute_asset_paths("asset_path(a.png) asset_path(b.png)", &m, "assets/")
            .unwrap_err();
        assert_eq!(err, BindingError::UnresolvedAssetReference { alias: "b.png".to_string() });
    }
}
