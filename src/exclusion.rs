//! Exclusion Guard
//!
//! Wraps generated lines for selected source paths in a conditional
//! block. The guard is syntax-agnostic; [`GuardSyntax`] supplies the
//! open/close markers for each target.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionRule {
    pub symbol: String,
    #[serde(default)]
    pub paths: BTreeSet<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid --ifndef parameter `{0}`: expected SYMBOL:path[:path...]")]
pub struct InvalidExclusion(pub String);

impl ExclusionRule {
    pub fn new<I, S>(symbol: impl Into<String>, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            symbol: symbol.into(),
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse the CLI form `SYMBOL:path[:path...]`.
    pub fn parse(text: &str) -> Result<Self, InvalidExclusion> {
        let mut parts = text.split(':');
        let symbol = parts.next().unwrap_or_default();
        let paths: BTreeSet<String> = parts.map(str::to_string).collect();
        if symbol.is_empty() || paths.is_empty() {
            return Err(InvalidExclusion(text.to_string()));
        }
        Ok(Self { symbol: symbol.to_string(), paths })
    }

    pub fn matches(&self, source_path: &str) -> bool {
        self.paths.contains(source_path)
    }
}

/// Ordered rule list; the first rule naming a path guards it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExclusionRules(Vec<ExclusionRule>);

impl ExclusionRules {
    pub fn new(rules: Vec<ExclusionRule>) -> Self {
        Self(rules)
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn push(&mut self, rule: ExclusionRule) {
        self.0.push(rule);
    }

    pub fn rule_for(&self, source_path: &str) -> Option<&ExclusionRule> {
        self.0.iter().find(|r| r.matches(source_path))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<ExclusionRule> for ExclusionRules {
    fn from(rule: ExclusionRule) -> Self {
        Self(vec![rule])
    }
}

/// Guard markers for one target syntax.
pub trait GuardSyntax {
    fn open(&self, symbol: &str) -> String;
    fn close(&self) -> String;
}

/// `#ifndef SYMBOL` / `#endif`, shared by the header and source artifacts.
pub struct Preprocessor;

impl GuardSyntax for Preprocessor {
    fn open(&self, symbol: &str) -> String {
        format!("#ifndef {}\n", symbol)
    }

    fn close(&self) -> String {
        "#endif\n".to_string()
    }
}

/// Emit `emit`'s output into `sink`, guarded when `rule` names `source_path`.
pub fn protect<F>(
    rule: Option<&ExclusionRule>,
    source_path: &str,
    syntax: &dyn GuardSyntax,
    sink: &mut String,
    emit: F,
) where
    F: FnOnce(&mut String),
{
    match rule.filter(|r| r.matches(source_path)) {
        Some(rule) => {
            sink.push_str(&syntax.open(&rule.symbol));
            emit(sink);
            sink.push_str(&syntax.close());
        }
        None => emit(sink),
    }
}
