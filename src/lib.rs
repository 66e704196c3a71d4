//! AssetMap Core - Asset Manifest & Binding Generator
//!
//! Collects static assets, publishes them under content-addressed names
//! and keeps a set of generated bindings (`assets.hpp`, `assets.cpp`,
//! `assets.js`) in sync with the manifest.
//!
//! # Guarantees
//! 1. Manifest order is generation order
//! 2. Same manifest, same bytes
//! 3. Identifiers are valid and unique, or nothing is written
//! 4. Updating leaves unrelated lines untouched

pub mod builtin;
pub mod config;
pub mod document;
pub mod error;
pub mod exclusion;
pub mod generate;
pub mod hashing;
pub mod identifier;
pub mod log;
pub mod manifest;
pub mod pipeline;
pub mod process;
pub mod public_path;
pub mod publish;
pub mod render;
pub mod update;

pub use builtin::{generate_builtin, BuiltinOptions, BuiltinSet};
pub use config::{BuildConfig, Compression};
pub use error::BindingError;
pub use exclusion::{ExclusionRule, ExclusionRules};
pub use generate::{generate, BindingOptions, BindingSet};
pub use hashing::{canonical_json, compute_manifest_hash, fingerprint};
pub use identifier::Identifier;
pub use log::Logger;
pub use manifest::{AssetEntry, Manifest, Scope};
pub use process::Compressor;
pub use pipeline::{BuildMode, BuildPipeline, BuildReport, PipelineError};
pub use public_path::{public_path, substitute_asset_paths};
pub use update::{update, UpdatedBindings};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
