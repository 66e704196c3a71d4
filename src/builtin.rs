//! Embedded Asset Class - compiled-in alternative to publishing
//!
//! Every asset is compressed and written into a C++ source file as a
//! byte array. A generated `Crails::BuiltinAssets` subclass registers
//! each array under `uri_root + alias`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::BindingError;
use crate::generate::resolve_identifiers;
use crate::manifest::{AssetEntry, Manifest};
use crate::process::Compressor;
use crate::render;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuiltinOptions {
    pub classname: String,
    pub uri_root: String,
    #[serde(default)]
    pub compression: Compressor,
    /// Header and source path, without extension.
    #[serde(default = "default_output")]
    pub output: PathBuf,
}

fn default_output() -> PathBuf {
    PathBuf::from("lib/builtin_assets")
}

impl BuiltinOptions {
    pub fn new(classname: impl Into<String>, uri_root: impl Into<String>) -> Self {
        Self {
            classname: classname.into(),
            uri_root: uri_root.into(),
            compression: Compressor::default(),
            output: default_output(),
        }
    }

    pub fn dir(&self) -> &Path {
        self.output.parent().unwrap_or_else(|| Path::new(""))
    }

    fn stem(&self) -> String {
        self.output
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "builtin_assets".to_string())
    }

    pub fn header_file(&self) -> String {
        format!("{}.hpp", self.stem())
    }

    pub fn source_file(&self) -> String {
        format!("{}.cpp", self.stem())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltinSet {
    pub header: String,
    pub source: String,
}

/// Generate the embedded asset class. `payload` supplies the compressed
/// bytes of each entry, in manifest order; nothing is returned unless
/// every identifier resolves and every payload succeeds.
pub fn generate_builtin<F, E>(
    manifest: &Manifest,
    options: &BuiltinOptions,
    mut payload: F,
) -> Result<BuiltinSet, E>
where
    F: FnMut(&AssetEntry) -> Result<Vec<u8>, E>,
    E: From<BindingError>,
{
    if !crate::identifier::Identifier::is_valid(&options.classname) {
        return Err(BindingError::MalformedBindingFile {
            artifact: options.header_file(),
            reason: format!("`{}` is not a valid class name", options.classname),
        }
        .into());
    }
    let resolved = resolve_identifiers(manifest)?;
    let classname = options.classname.as_str();

    let mut header = render::builtin_header_preamble(classname);
    let mut source = render::builtin_source_preamble(&options.header_file());
    for (entry, identifier) in &resolved {
        header.push_str(&render::builtin_member_declaration(identifier));

        let uri = format!("{}{}", options.uri_root, entry.alias);
        source.push_str(&render::builtin_member_definition(classname, identifier, &uri));
        source.push_str(&render::builtin_byte_array(identifier, &payload(entry)?));
    }
    header.push_str(render::builtin_header_postamble());

    source.push_str(&render::builtin_constructor_open(
        classname,
        &options.uri_root,
        options.compression.program(),
    ));
    for (entry, identifier) in &resolved {
        source.push_str(&render::builtin_registration(&entry.alias, identifier));
    }
    source.push_str("}\n");

    Ok(BuiltinSet { header, source })
}
