//! Identifier Synthesizer
//!
//! Turns an alias such as `app/main-v2.js` into a valid C++ identifier
//! (`app_main_v2_js`). Synthesis is a pure function of the alias;
//! collisions between distinct aliases are detected by the callers.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const MAX_IDENTIFIER_LENGTH: usize = 255;

pub const RESERVED_KEYWORDS: &[&str] = &[
    "alignas", "alignof", "and", "and_eq", "asm", "atomic_cancel", "atomic_commit",
    "atomic_noexcept", "auto",
    "bitand", "bitor", "bool", "break",
    "case", "catch", "char", "char16_t", "char32_t", "class", "compl", "concept", "const",
    "constexpr", "const_cast", "continue",
    "co_await", "co_return", "co_yield",
    "decltype", "default", "delete", "do", "double", "dynamic_cast",
    "else", "enum", "explicit", "export", "extern",
    "false", "float", "for", "friend",
    "goto",
    "if", "import", "inline", "int",
    "long",
    "module", "mutable",
    "namespace", "new", "noexcept", "not", "not_eq", "nullptr",
    "operator", "or", "or_eq",
    "private", "protected", "public",
    "register", "reinterpret_cast", "requires", "return",
    "short", "signed", "sizeof", "static", "static_assert", "static_cast", "struct", "switch",
    "synchronized",
    "template", "this", "thread_local", "throw", "true", "try", "typedef", "typeid", "typename",
    "union", "unsigned", "using",
    "virtual", "void", "volatile",
    "wchar_t", "while",
    "xor", "xor_eq",
];

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

/// Synthesized identifier exceeded [`MAX_IDENTIFIER_LENGTH`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TooLong {
    pub alias: String,
    pub length: usize,
}

impl Identifier {
    /// Synthesize an identifier from an alias.
    pub fn synthesize(alias: &str) -> Result<Self, TooLong> {
        let mut output = String::with_capacity(alias.len() + 2);

        if alias.as_bytes().first().map_or(false, u8::is_ascii_digit) {
            output.push('_');
        }
        // Byte-wise: every byte of a multi-byte character becomes `_`.
        output.extend(alias.bytes().map(|b| {
            if b.is_ascii_alphanumeric() { b as char } else { '_' }
        }));
        if output.is_empty() {
            output.push('_');
        }
        if RESERVED_KEYWORDS.contains(&output.as_str()) {
            output.push('_');
        }

        if output.len() > MAX_IDENTIFIER_LENGTH {
            return Err(TooLong { alias: alias.to_string(), length: output.len() });
        }
        Ok(Self(output))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `s` is already in synthesized form.
    pub fn is_valid(s: &str) -> bool {
        let mut bytes = s.bytes();
        match bytes.next() {
            Some(b) if b == b'_' || b.is_ascii_alphabetic() => {}
            _ => return false,
        }
        bytes.all(|b| b == b'_' || b.is_ascii_alphanumeric())
            && !RESERVED_KEYWORDS.contains(&s)
            && s.len() <= MAX_IDENTIFIER_LENGTH
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
