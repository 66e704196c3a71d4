//! Fingerprint Store / Manifest
//!
//! Ordered mapping from source path to (fingerprint, alias). Insertion
//! order is the generation order of every binding artifact, so it is
//! never sorted after the fact.

use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;
use jwalk::WalkDir;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::BindingError;
use crate::hashing::fingerprint;
use crate::identifier::Identifier;
use crate::pipeline::PipelineError;
use crate::public_path::public_path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetEntry {
    pub source_path: String,
    pub fingerprint: String,
    pub alias: String,
}

impl AssetEntry {
    pub fn identifier(&self) -> Result<Identifier, BindingError> {
        Identifier::synthesize(&self.alias).map_err(|e| BindingError::IdentifierTooLong {
            source_path: self.source_path.clone(),
            alias: e.alias,
            length: e.length,
        })
    }

    pub fn public_path(&self, public_scope: &str) -> String {
        public_path(&self.source_path, &self.fingerprint, public_scope)
    }
}

/// A named collection root. Aliases of files under `root` are prefixed
/// with `name` unless it is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    #[serde(default, rename = "scope")]
    pub name: String,
    #[serde(rename = "path")]
    pub root: PathBuf,
}

impl Scope {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self { name: name.into(), root: root.into() }
    }

    /// Parse `name=dir` or a bare `dir`.
    pub fn parse(text: &str) -> Self {
        match text.split_once('=') {
            Some((name, root)) => Self::new(name, root),
            None => Self::new("", text),
        }
    }

    /// Alias of `source` relative to this scope, `/`-separated.
    /// `None` when `source` does not live under the scope root.
    pub fn alias_for(&self, source: &Path) -> Option<String> {
        let rel = source.strip_prefix(&self.root).ok()?;
        let rel: Vec<_> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        if rel.is_empty() {
            return None;
        }
        let rel = rel.join("/");
        if self.name.is_empty() {
            Some(rel)
        } else {
            Some(format!("{}/{}", self.name.trim_end_matches('/'), rel))
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Manifest {
    entries: Vec<AssetEntry>,
    index: HashMap<String, usize>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register content under `source_path`. Re-registering replaces the
    /// fingerprint and alias but keeps the entry's position.
    pub fn register(
        &mut self,
        source_path: impl Into<String>,
        alias: impl Into<String>,
        content: &[u8],
    ) -> &AssetEntry {
        let source_path = source_path.into();
        let entry = AssetEntry {
            fingerprint: fingerprint(content),
            alias: alias.into(),
            source_path,
        };

        let slot = match self.index.get(&entry.source_path) {
            Some(&i) => {
                self.entries[i] = entry;
                i
            }
            None => {
                let i = self.entries.len();
                self.index.insert(entry.source_path.clone(), i);
                self.entries.push(entry);
                i
            }
        };
        &self.entries[slot]
    }

    /// Walk `scope.root` (sorted by file name) and register every file
    /// whose name matches `pattern`. Returns the number of files registered.
    pub fn collect(&mut self, scope: &Scope, pattern: &Regex) -> Result<usize, PipelineError> {
        let input = scope.root.clone();
        if !input.exists() {
            return Err(PipelineError::InputNotFound { path: input });
        }
        // A single file input is aliased relative to its directory.
        if input.is_file() {
            let mut scope = scope.clone();
            scope.root = input.parent().map(Path::to_path_buf).unwrap_or_default();
            return self.collect_file(&scope, &input, pattern).map(usize::from);
        }

        let mut count = 0;
        for entry in WalkDir::new(&input).sort(true).follow_links(true) {
            let entry = entry.map_err(|e| PipelineError::Io {
                path: input.clone(),
                source: io::Error::other(e.to_string()),
            })?;
            if entry.file_type().is_file() && self.collect_file(scope, &entry.path(), pattern)? {
                count += 1;
            }
        }
        Ok(count)
    }

    fn collect_file(&mut self, scope: &Scope, path: &Path, pattern: &Regex) -> Result<bool, PipelineError> {
        let Some(name) = path.file_name() else {
            return Ok(false);
        };
        if !pattern.is_match(&name.to_string_lossy()) {
            return Ok(false);
        }
        // Processors reopen files by their stored path.
        let Some(source_path) = path.to_str() else {
            return Err(PipelineError::InvalidPath { path: path.to_path_buf() });
        };
        let Some(alias) = scope.alias_for(path) else {
            return Ok(false);
        };
        let content = fs::read(path).map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.register(source_path, alias, &content);
        Ok(true)
    }

    pub fn get(&self, source_path: &str) -> Option<&AssetEntry> {
        self.index.get(source_path).map(|&i| &self.entries[i])
    }

    /// Reverse lookup: first entry (in manifest order) carrying `alias`.
    pub fn lookup_by_alias(&self, alias: &str) -> Option<&AssetEntry> {
        self.entries.iter().find(|e| e.alias == alias)
    }

    pub fn remove(&mut self, source_path: &str) -> Option<AssetEntry> {
        let i = self.index.remove(source_path)?;
        let entry = self.entries.remove(i);
        self.reindex();
        Some(entry)
    }

    /// Keep only entries for which `keep` returns true. Every remaining
    /// entry is visited exactly once, in order, and keeps its relative
    /// position.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&AssetEntry) -> bool,
    {
        self.entries.retain(|e| keep(e));
        self.reindex();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AssetEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn reindex(&mut self) {
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.source_path.clone(), i))
            .collect();
    }
}

impl<'a> IntoIterator for &'a Manifest {
    type Item = &'a AssetEntry;
    type IntoIter = std::slice::Iter<'a, AssetEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl Serialize for Manifest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(&self.entries)
    }
}
