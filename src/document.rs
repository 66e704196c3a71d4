//! Three-zone model of a previously generated binding file
//!
//! ```text
//! preamble   everything up to and including `namespace Assets` / `{`
//! body       one classified line per entry, guard or hand edit
//! postamble  the first `}` line and everything after it
//! ```
//!
//! Rendering the parsed zones reproduces the input byte-for-byte, so an
//! update only ever changes the spans it means to change.

use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;

use crate::error::BindingError;
use crate::identifier::Identifier;
use crate::render::{escape_c_string, NAMESPACE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    /// `extern const char* <id>;`
    Declaration(String),
    /// `const char* <id> = "<value>";` with the byte range of `<value>`.
    Definition { identifier: String, value: Range<usize> },
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyLine {
    pub raw: String,
    pub kind: LineKind,
}

fn declaration_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*extern\s+const\s+char\s*\*\s*([A-Za-z_][A-Za-z0-9_]*)\s*;")
            .expect("static pattern")
    })
}

fn definition_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"^\s*const\s+char\s*\*\s*([A-Za-z_][A-Za-z0-9_]*)\s*=\s*"((?:[^"\\]|\\.)*)"\s*;"#)
            .expect("static pattern")
    })
}

impl BodyLine {
    pub fn classify(raw: &str) -> Self {
        let kind = if let Some(caps) = declaration_pattern().captures(raw) {
            LineKind::Declaration(caps[1].to_string())
        } else if let Some(caps) = definition_pattern().captures(raw) {
            LineKind::Definition {
                identifier: caps[1].to_string(),
                value: caps.get(2).map(|m| m.range()).unwrap_or(0..0),
            }
        } else {
            LineKind::Other
        };
        Self { raw: raw.to_string(), kind }
    }

    pub fn identifier(&self) -> Option<&str> {
        match &self.kind {
            LineKind::Declaration(id) => Some(id),
            LineKind::Definition { identifier, .. } => Some(identifier),
            LineKind::Other => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingDocument {
    artifact: String,
    preamble: String,
    body: Vec<BodyLine>,
    postamble: String,
}

impl BindingDocument {
    pub fn parse(artifact: &str, text: &str) -> Result<Self, BindingError> {
        let malformed = |reason: String| BindingError::MalformedBindingFile {
            artifact: artifact.to_string(),
            reason,
        };
        let lines: Vec<&str> = text.split_inclusive('\n').collect();
        let open_marker = format!("namespace {}", NAMESPACE);

        let open = lines
            .windows(2)
            .position(|w| w[0].trim_end() == open_marker && w[1].trim_end() == "{")
            .ok_or_else(|| malformed(format!("`{} {{` not found", open_marker)))?;
        let body_start = open + 2;
        let close = lines[body_start..]
            .iter()
            .position(|l| l.trim_end() == "}")
            .map(|i| body_start + i)
            .ok_or_else(|| malformed(format!("`{}` block is never closed", open_marker)))?;

        Ok(Self {
            artifact: artifact.to_string(),
            preamble: lines[..body_start].concat(),
            body: lines[body_start..close].iter().map(|l| BodyLine::classify(l)).collect(),
            postamble: lines[close..].concat(),
        })
    }

    pub fn body(&self) -> &[BodyLine] {
        &self.body
    }

    /// `(identifier, raw_line)` pairs in file order.
    pub fn entries(&self) -> Vec<(&str, &str)> {
        self.body
            .iter()
            .filter_map(|l| l.identifier().map(|id| (id, l.raw.as_str())))
            .collect()
    }

    pub fn declares(&self, identifier: &Identifier) -> bool {
        self.body
            .iter()
            .any(|l| matches!(&l.kind, LineKind::Declaration(id) if id == identifier.as_str()))
    }

    pub fn defines(&self, identifier: &Identifier) -> bool {
        self.body.iter().any(|l| {
            matches!(&l.kind, LineKind::Definition { identifier: id, .. } if id == identifier.as_str())
        })
    }

    /// Insert rendered lines directly after the namespace brace.
    pub fn insert_front(&mut self, rendered: &str) {
        let lines: Vec<BodyLine> = rendered.split_inclusive('\n').map(BodyLine::classify).collect();
        self.body.splice(0..0, lines);
    }

    /// Replace the quoted value of `identifier`'s definition, returning
    /// whether the line changed. `None` when no definition line exists.
    pub fn set_definition(&mut self, identifier: &Identifier, value: &str) -> Option<bool> {
        let escaped = escape_c_string(value);
        for line in &mut self.body {
            if let LineKind::Definition { identifier: id, value: range } = &mut line.kind {
                if id.as_str() == identifier.as_str() {
                    if line.raw[range.clone()] == escaped {
                        return Some(false);
                    }
                    line.raw.replace_range(range.clone(), &escaped);
                    *range = range.start..range.start + escaped.len();
                    return Some(true);
                }
            }
        }
        None
    }

    /// Drop every line generated for `identifier`, along with an
    /// `#ifndef`/`#endif` pair that guarded nothing else. Returns whether
    /// anything was removed.
    pub fn remove_entry(&mut self, identifier: &str) -> bool {
        let mut removed = false;
        while let Some(i) = self.body.iter().position(|l| l.identifier() == Some(identifier)) {
            self.body.remove(i);
            removed = true;
            let guarded = i > 0
                && i < self.body.len()
                && self.body[i - 1].raw.trim_start().starts_with("#ifndef ")
                && self.body[i].raw.trim() == "#endif";
            if guarded {
                self.body.drain(i - 1..=i);
            }
        }
        removed
    }

    pub fn render(&self) -> String {
        let mut out = String::with_capacity(
            self.preamble.len() + self.postamble.len() + self.body.iter().map(|l| l.raw.len()).sum::<usize>(),
        );
        out.push_str(&self.preamble);
        for line in &self.body {
            out.push_str(&line.raw);
        }
        out.push_str(&self.postamble);
        out
    }
}
