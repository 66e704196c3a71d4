//! Build Pipeline - Single Entry Point
//!
//! collect -> publish -> generate | update -> write. Artifacts are only
//! written once every buffer has been produced, so a failing build
//! leaves the bindings directory untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

use crate::builtin::generate_builtin;
use crate::config::BuildConfig;
use crate::error::BindingError;
use crate::generate::{generate, render_script};
use crate::hashing::compute_manifest_hash;
use crate::log::Logger;
use crate::manifest::Manifest;
use crate::process::{compress_to_vec, is_stylesheet_partial, ProcessorSet};
use crate::publish::{PublishReport, Publisher};
use crate::render;
use crate::update::update;
use crate::ENGINE_VERSION;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Input not found: {}", path.display())]
    InputNotFound { path: PathBuf },

    #[error("Path is not valid UTF-8: {}", path.display())]
    InvalidPath { path: PathBuf },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration requires engine >= {0}, current is {1}")]
    EngineVersionMismatch(String, String),

    #[error("Invalid collection pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Processing {} failed: {message}", path.display())]
    Processor { path: PathBuf, message: String },

    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn is_binding(&self) -> bool {
        matches!(self, Self::Binding(_))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    /// Rewrite every artifact from scratch.
    #[default]
    Generate,
    /// Patch the existing artifacts in place.
    Update,
    /// Embed compressed assets in a generated C++ class.
    Builtin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildReport {
    pub id: String,
    pub engine_version: String,
    pub created_at: DateTime<Utc>,
    pub mode: BuildMode,
    pub entries: usize,
    pub publish: Option<PublishReport>,
    pub artifacts: Vec<PathBuf>,
    /// Identifiers inserted by an update run.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inserted: Vec<String>,
    /// Identifiers pruned by an update run.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed: Vec<String>,
    pub manifest_hash: String,
}

/// One row of `assetmap-cli manifest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestRow {
    pub source_path: String,
    pub alias: String,
    pub fingerprint: String,
    pub identifier: String,
    pub public_path: String,
}

/// Artifact buffers, ready to be written into `dir`.
#[derive(Default)]
struct Artifacts {
    dir: PathBuf,
    files: Vec<(String, String)>,
    inserted: Vec<String>,
    removed: Vec<String>,
}

pub struct BuildPipeline {
    config: BuildConfig,
    logger: Logger,
}

impl BuildPipeline {
    pub fn new(config: BuildConfig) -> Self {
        let logger = config.logger();
        Self { config, logger }
    }

    pub fn with_logger(config: BuildConfig, logger: Logger) -> Self {
        Self { config, logger }
    }

    /// Collect every configured input, in order.
    pub fn collect(&self) -> Result<Manifest, PipelineError> {
        if self.config.inputs.is_empty() {
            return Err(PipelineError::Config("No inputs configured".into()));
        }
        let pattern = self.config.collection_pattern()?;
        let mut manifest = Manifest::new();
        for scope in &self.config.inputs {
            let count = manifest.collect(scope, &pattern)?;
            if count == 0 {
                self.logger.warn(format!("Nothing matched in `{}`", scope.root.display()));
                continue;
            }
            self.logger.log(
                "collect",
                format!("{} file(s) from `{}`", count, scope.root.display()),
            );
        }
        Ok(manifest)
    }

    pub fn publish(&self, manifest: &mut Manifest, processors: ProcessorSet) -> Result<PublishReport, PipelineError> {
        Publisher::with_processors(&self.config, &self.logger, processors).publish(manifest)
    }

    /// Full build with processors detected on `PATH`.
    pub fn run(&self, mode: BuildMode) -> Result<BuildReport, PipelineError> {
        self.run_with(mode, ProcessorSet::detect())
    }

    pub fn run_with(&self, mode: BuildMode, processors: ProcessorSet) -> Result<BuildReport, PipelineError> {
        let mut manifest = self.collect()?;
        let published = self.publish(&mut manifest, processors)?;
        self.finish(mode, &manifest, Some(published))
    }

    /// Collect and bind without publishing. Stylesheet partials are
    /// dropped the same way publishing would drop them.
    pub fn run_bindings(&self, mode: BuildMode) -> Result<BuildReport, PipelineError> {
        let mut manifest = self.collect()?;
        manifest.retain(|e| {
            let partial = is_stylesheet_partial(Path::new(&e.source_path));
            if partial {
                self.logger.debug("bindings", format!("Skipping partial `{}`", e.source_path));
            }
            !partial
        });
        self.finish(mode, &manifest, None)
    }

    pub fn manifest_listing(&self) -> Result<Vec<ManifestRow>, PipelineError> {
        let manifest = self.collect()?;
        manifest
            .iter()
            .map(|entry| {
                Ok(ManifestRow {
                    source_path: entry.source_path.clone(),
                    alias: entry.alias.clone(),
                    fingerprint: entry.fingerprint.clone(),
                    identifier: entry.identifier()?.to_string(),
                    public_path: entry.public_path(&self.config.public_scope),
                })
            })
            .collect()
    }

    fn finish(
        &self,
        mode: BuildMode,
        manifest: &Manifest,
        publish: Option<PublishReport>,
    ) -> Result<BuildReport, PipelineError> {
        let artifacts = self.bindings(mode, manifest)?;
        let manifest_hash = compute_manifest_hash(manifest)?;
        let written = self.write_artifacts(&artifacts.dir, &artifacts.files)?;

        Ok(BuildReport {
            id: Uuid::new_v4().to_string(),
            engine_version: ENGINE_VERSION.to_string(),
            created_at: Utc::now(),
            mode,
            entries: manifest.len(),
            publish,
            artifacts: written,
            inserted: artifacts.inserted,
            removed: artifacts.removed,
            manifest_hash,
        })
    }

    fn bindings(&self, mode: BuildMode, manifest: &Manifest) -> Result<Artifacts, PipelineError> {
        let options = self.config.binding_options();
        let dir = self.config.bindings_dir.clone();
        match mode {
            BuildMode::Generate => {
                let set = generate(manifest, &options)?;
                Ok(Artifacts {
                    dir,
                    files: set
                        .artifacts()
                        .into_iter()
                        .map(|(name, text)| (name.to_string(), text.to_string()))
                        .collect(),
                    ..Artifacts::default()
                })
            }
            BuildMode::Update => {
                let declarations = self.read_artifact(render::DECLARATIONS_FILE)?;
                let definitions = self.read_artifact(render::DEFINITIONS_FILE)?;
                let updated = update(manifest, &options, &declarations, &definitions)?;
                if updated.is_noop() {
                    self.logger.debug("bindings", "Bindings already up to date");
                }
                for identifier in &updated.removed {
                    self.logger.log("bindings", format!("Pruned `{}`", identifier));
                }
                Ok(Artifacts {
                    dir,
                    files: vec![
                        (render::DECLARATIONS_FILE.to_string(), updated.declarations),
                        (render::DEFINITIONS_FILE.to_string(), updated.definitions),
                        (render::SCRIPT_FILE.to_string(), render_script(manifest, &options)),
                    ],
                    inserted: updated.inserted,
                    removed: updated.removed,
                })
            }
            BuildMode::Builtin => {
                let Some(builtin) = &self.config.builtin else {
                    return Err(PipelineError::Config(
                        "builtin mode needs `builtin.classname` and `builtin.uriRoot`".into(),
                    ));
                };
                let set = generate_builtin(manifest, builtin, |entry| {
                    self.logger.debug(
                        "bindings",
                        format!("{} <- {}", builtin.compression.program(), entry.source_path),
                    );
                    compress_to_vec(builtin.compression, Path::new(&entry.source_path))
                })?;
                Ok(Artifacts {
                    dir: builtin.dir().to_path_buf(),
                    files: vec![
                        (builtin.header_file(), set.header),
                        (builtin.source_file(), set.source),
                    ],
                    ..Artifacts::default()
                })
            }
        }
    }

    fn read_artifact(&self, name: &'static str) -> Result<String, PipelineError> {
        let path = self.config.bindings_dir.join(name);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BindingError::MalformedBindingFile {
                    artifact: name.to_string(),
                    reason: format!("{} does not exist", path.display()),
                }
                .into())
            }
            Err(source) => Err(PipelineError::Io { path, source }),
        }
    }

    fn write_artifacts(&self, dir: &Path, files: &[(String, String)]) -> Result<Vec<PathBuf>, PipelineError> {
        fs::create_dir_all(dir).map_err(|source| PipelineError::Io { path: dir.to_path_buf(), source })?;

        let mut written = Vec::with_capacity(files.len());
        for (name, text) in files {
            let path = dir.join(name);
            if unchanged(&path, text) {
                self.logger.debug("bindings", format!("`{}` unchanged", path.display()));
            } else {
                fs::write(&path, text).map_err(|source| PipelineError::Io { path: path.clone(), source })?;
                self.logger.log("bindings", format!("Wrote `{}`", path.display()));
            }
            written.push(path);
        }
        Ok(written)
    }
}

/// Skip rewriting identical files so build tools keep their mtimes.
fn unchanged(path: &Path, text: &str) -> bool {
    fs::read_to_string(path).map_or(false, |current| current == text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::BuiltinOptions;
    use crate::config::Compression;
    use crate::manifest::Scope;
    use crate::process::{ScriptProcessor, StylesheetProcessor};
    use tempfile::TempDir;

    fn offline() -> ProcessorSet {
        ProcessorSet::new(vec![
            Box::new(StylesheetProcessor::without_compiler()),
            Box::new(ScriptProcessor::without_minifier()),
        ])
    }

    fn project() -> (TempDir, BuildConfig) {
        let dir = TempDir::new().unwrap();
        let assets = dir.path().join("assets");
        fs::create_dir_all(assets.join("img")).unwrap();
        fs::write(assets.join("app.js"), "start();").unwrap();
        fs::write(assets.join("img/logo.png"), "png").unwrap();
        let config = BuildConfig {
            inputs: vec![Scope::new("", &assets)],
            output: dir.path().join("public"),
            bindings_dir: dir.path().join("lib"),
            compression: Compression::None,
            ..BuildConfig::default()
        };
        (dir, config)
    }

    #[test]
    fn test_run_writes_all_artifacts() {
        let (_dir, config) = project();
        let pipeline = BuildPipeline::with_logger(config.clone(), Logger::quiet());
        let report = pipeline.run_with(BuildMode::Generate, offline()).unwrap();

        assert_eq!(report.entries, 2);
        assert_eq!(report.artifacts.len(), 3);
        assert_eq!(report.publish.unwrap().written.len(), 2);
        let hpp = fs::read_to_string(config.bindings_dir.join("assets.hpp")).unwrap();
        assert!(hpp.contains("extern const char* app_js;"));
        assert!(hpp.contains("extern const char* img_logo_png;"));
    }

    #[test]
    fn test_update_without_artifacts_is_malformed() {
        let (_dir, config) = project();
        let pipeline = BuildPipeline::with_logger(config.clone(), Logger::quiet());
        let err = pipeline.run_bindings(BuildMode::Update).unwrap_err();

        assert!(err.is_binding());
        assert!(!config.bindings_dir.join("assets.js").exists());
    }

    #[test]
    fn test_update_after_generate_is_stable() {
        let (_dir, config) = project();
        let pipeline = BuildPipeline::with_logger(config.clone(), Logger::quiet());
        let first = pipeline.run_bindings(BuildMode::Generate).unwrap();
        let cpp = fs::read_to_string(config.bindings_dir.join("assets.cpp")).unwrap();
        let second = pipeline.run_bindings(BuildMode::Update).unwrap();

        assert_eq!(fs::read_to_string(config.bindings_dir.join("assets.cpp")).unwrap(), cpp);
        assert!(second.inserted.is_empty());
        assert_eq!(first.manifest_hash, second.manifest_hash);
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn test_failed_build_writes_nothing() {
        let (dir, mut config) = project();
        // `a.b` and `a_b` both synthesize to `a_b`.
        let clash = dir.path().join("clash");
        fs::create_dir_all(&clash).unwrap();
        fs::write(clash.join("a.b"), "1").unwrap();
        fs::write(clash.join("a_b"), "2").unwrap();
        config.inputs = vec![Scope::new("", &clash)];

        let pipeline = BuildPipeline::with_logger(config.clone(), Logger::quiet());
        let err = pipeline.run_bindings(BuildMode::Generate).unwrap_err();
        assert!(matches!(err, PipelineError::Binding(BindingError::DuplicateIdentifier { .. })));
        assert!(!config.bindings_dir.exists());
    }

    #[test]
    fn test_bindings_skip_stylesheet_partials() {
        let (dir, config) = project();
        fs::write(dir.path().join("assets/_mixins.scss"), "$c: red;").unwrap();
        fs::write(dir.path().join("assets/site.scss"), "body{}").unwrap();

        let pipeline = BuildPipeline::with_logger(config.clone(), Logger::quiet());
        let report = pipeline.run_bindings(BuildMode::Generate).unwrap();

        assert_eq!(report.entries, 3);
        let hpp = fs::read_to_string(config.bindings_dir.join("assets.hpp")).unwrap();
        assert!(hpp.contains("extern const char* site_scss;"));
        assert!(!hpp.contains("_mixins_scss"));
    }

    #[test]
    fn test_update_reports_pruned_entries() {
        let (dir, config) = project();
        let pipeline = BuildPipeline::with_logger(config.clone(), Logger::quiet());
        pipeline.run_bindings(BuildMode::Generate).unwrap();

        fs::remove_file(dir.path().join("assets/img/logo.png")).unwrap();
        let report = pipeline.run_bindings(BuildMode::Update).unwrap();

        assert_eq!(report.removed, vec!["img_logo_png".to_string()]);
        let cpp = fs::read_to_string(config.bindings_dir.join("assets.cpp")).unwrap();
        assert!(!cpp.contains("img_logo_png"));
    }

    #[test]
    fn test_builtin_needs_options() {
        let (_dir, config) = project();
        let pipeline = BuildPipeline::with_logger(config, Logger::quiet());
        let err = pipeline.run_bindings(BuildMode::Builtin).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn test_builtin_writes_class() {
        if which::which("gzip").is_err() {
            return;
        }
        let (dir, mut config) = project();
        let mut options = BuiltinOptions::new("EmbeddedAssets", "/static/");
        options.output = dir.path().join("gen/embedded");
        config.builtin = Some(options);

        let pipeline = BuildPipeline::with_logger(config.clone(), Logger::quiet());
        let report = pipeline.run_bindings(BuildMode::Builtin).unwrap();

        assert_eq!(report.artifacts.len(), 2);
        let cpp = fs::read_to_string(dir.path().join("gen/embedded.cpp")).unwrap();
        assert!(cpp.contains("const char* EmbeddedAssets::app_js = \"/static/app.js\";"));
        // gzip magic
        assert!(cpp.contains("static const unsigned char app_js[] = {\n  0x1f, 0x8b,"));
        assert!(dir.path().join("gen/embedded.hpp").exists());
        assert!(!config.bindings_dir.exists());
    }

    #[test]
    fn test_manifest_listing() {
        let (_dir, config) = project();
        let rows = BuildPipeline::with_logger(config, Logger::quiet())
            .manifest_listing()
            .unwrap();
        assert_eq!(rows[0].alias, "app.js");
        assert_eq!(rows[0].identifier, "app_js");
        assert!(rows[0].public_path.starts_with("/assets/app-"));
        assert_eq!(rows[1].identifier, "img_logo_png");
    }

    #[test]
    fn test_no_inputs() {
        let pipeline = BuildPipeline::with_logger(BuildConfig::default(), Logger::quiet());
        assert!(matches!(pipeline.collect(), Err(PipelineError::Config(_))));
    }
}
