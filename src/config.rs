//! Build Configuration
//!
//! Loaded from `assets.json` (camelCase keys, every field optional) and
//! then overridden by CLI flags. The resolved value is passed to every
//! stage; nothing reads process-wide state.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::builtin::BuiltinOptions;
use crate::exclusion::{ExclusionRule, ExclusionRules};
use crate::generate::BindingOptions;
use crate::log::Logger;
use crate::manifest::Scope;
use crate::pipeline::PipelineError;
use crate::public_path::DEFAULT_PUBLIC_SCOPE;
use crate::ENGINE_VERSION;

pub const DEFAULT_CONFIG_FILE: &str = "assets.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BuildConfig {
    #[serde(default)]
    pub inputs: Vec<Scope>,
    #[serde(default = "default_output")]
    pub output: PathBuf,
    #[serde(default = "default_bindings_dir")]
    pub bindings_dir: PathBuf,
    #[serde(default = "default_public_scope")]
    pub public_scope: String,
    #[serde(default = "default_pattern")]
    pub pattern: String,
    #[serde(default)]
    pub compression: Compression,
    #[serde(default = "default_true")]
    pub source_maps: bool,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub exclusions: ExclusionRules,
    #[serde(default)]
    pub engine_min_version: Option<String>,
    /// Embedded asset class settings, used by builtin mode.
    #[serde(default)]
    pub builtin: Option<BuiltinOptions>,
}

fn default_true() -> bool { true }
fn default_output() -> PathBuf { PathBuf::from("public") }
fn default_bindings_dir() -> PathBuf { PathBuf::from("lib") }
fn default_public_scope() -> String { DEFAULT_PUBLIC_SCOPE.to_string() }
fn default_pattern() -> String { ".*".to_string() }

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Gzip,
    Brotli,
    All,
    None,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            inputs: vec![],
            output: default_output(),
            bindings_dir: default_bindings_dir(),
            public_scope: default_public_scope(),
            pattern: default_pattern(),
            compression: Compression::default(),
            source_maps: true,
            verbose: false,
            exclusions: ExclusionRules::none(),
            engine_min_version: None,
            builtin: None,
        }
    }
}

impl BuildConfig {
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let content = fs::read_to_string(path).map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, PipelineError> {
        let config: Self = serde_json::from_str(content)?;
        config.check_engine_version()?;
        Ok(config)
    }

    /// `path` when given, else `assets.json` in the working directory
    /// when present, else defaults.
    pub fn discover(path: Option<&Path>) -> Result<Self, PipelineError> {
        match path {
            Some(path) => Self::load(path),
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::load(Path::new(DEFAULT_CONFIG_FILE))
            }
            None => Ok(Self::default()),
        }
    }

    fn check_engine_version(&self) -> Result<(), PipelineError> {
        let Some(min) = &self.engine_min_version else {
            return Ok(());
        };
        let engine_ver = semver::Version::parse(ENGINE_VERSION)
            .map_err(|_| PipelineError::Config("Invalid engine version".into()))?;
        let min_ver = semver::Version::parse(min)
            .map_err(|e| PipelineError::Config(format!("Invalid engineMinVersion `{}`: {}", min, e)))?;

        if engine_ver < min_ver {
            return Err(PipelineError::EngineVersionMismatch(
                min.clone(),
                ENGINE_VERSION.to_string(),
            ));
        }
        Ok(())
    }

    /// Add a rule given in the `SYMBOL:path[:path...]` form.
    pub fn add_exclusion(&mut self, text: &str) -> Result<(), PipelineError> {
        let rule = ExclusionRule::parse(text).map_err(|e| PipelineError::Config(e.to_string()))?;
        self.exclusions.push(rule);
        Ok(())
    }

    pub fn collection_pattern(&self) -> Result<Regex, PipelineError> {
        Ok(Regex::new(&self.pattern)?)
    }

    pub fn binding_options(&self) -> BindingOptions {
        BindingOptions {
            public_scope: self.public_scope.clone(),
            exclusions: self.exclusions.clone(),
        }
    }

    pub fn logger(&self) -> Logger {
        Logger::new(self.verbose)
    }

    /// `<output>/<publicScope>`, where published files land.
    pub fn public_dir(&self) -> PathBuf {
        self.output.join(&self.public_scope)
    }
}
