//! Binding file grammar
//!
//! Every generated line is produced here so the generator and the
//! updater agree byte-for-byte on what a declaration looks like.

use crate::identifier::Identifier;

pub const NAMESPACE: &str = "Assets";
pub const INCLUDE_GUARD: &str = "APPLICATION_ASSETS_HPP";

pub const DECLARATIONS_FILE: &str = "assets.hpp";
pub const DEFINITIONS_FILE: &str = "assets.cpp";
pub const SCRIPT_FILE: &str = "assets.js";

/// The line pair that opens the namespace block in both C++ artifacts.
pub fn namespace_open() -> String {
    format!("namespace {}\n{{\n", NAMESPACE)
}

pub fn namespace_close() -> &'static str {
    "}\n"
}

pub fn declarations_preamble() -> String {
    format!(
        "#ifndef {guard}\n#define {guard}\n{ns}",
        guard = INCLUDE_GUARD,
        ns = namespace_open()
    )
}

pub fn declarations_postamble() -> String {
    format!("{}#endif\n", namespace_close())
}

pub fn definitions_preamble() -> String {
    format!("#include \"{}\"\n{}", DECLARATIONS_FILE, namespace_open())
}

pub fn definitions_postamble() -> String {
    namespace_close().to_string()
}

pub fn declaration_line(identifier: &Identifier) -> String {
    format!("  extern const char* {};\n", identifier)
}

pub fn definition_line(identifier: &Identifier, public_path: &str) -> String {
    format!("  const char* {} = \"{}\";\n", identifier, escape_c_string(public_path))
}

pub fn script_open() -> String {
    format!("export const {} = {{\n", NAMESPACE)
}

pub fn script_close() -> &'static str {
    "}\n"
}

/// `  "<alias>": "<public_path>"` without separator or newline.
pub fn script_entry(alias: &str, public_path: &str) -> String {
    format!("  {}: {}", quote_js(alias), quote_js(public_path))
}

/// Body of a C string literal, without the surrounding quotes.
pub fn escape_c_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}

// --- Embedded asset class ---

/// Bytes per row of an embedded array.
const BYTES_PER_ROW: usize = 12;

pub fn builtin_header_preamble(classname: &str) -> String {
    let guard = format!("{}_HPP", classname.to_ascii_uppercase());
    format!(
        "#ifndef {guard}\n#define {guard}\n#include <crails/builtin_assets.hpp>\n\nclass {classname} : public Crails::BuiltinAssets\n{{\npublic:\n  {classname}();\n\n"
    )
}

pub fn builtin_member_declaration(identifier: &Identifier) -> String {
    format!("  static const char* {};\n", identifier)
}

pub fn builtin_header_postamble() -> &'static str {
    "};\n#endif\n"
}

pub fn builtin_source_preamble(header_file: &str) -> String {
    format!("#include \"{}\"\n\n", header_file)
}

pub fn builtin_member_definition(classname: &str, identifier: &Identifier, uri: &str) -> String {
    format!("const char* {}::{} = \"{}\";\n", classname, identifier, escape_c_string(uri))
}

/// `static const unsigned char <id>[]` plus its `<id>_len`.
pub fn builtin_byte_array(identifier: &Identifier, data: &[u8]) -> String {
    let mut out = format!("static const unsigned char {}[] = {{\n", identifier);
    for row in data.chunks(BYTES_PER_ROW) {
        let bytes: Vec<String> = row.iter().map(|b| format!("0x{:02x}", b)).collect();
        out.push_str("  ");
        out.push_str(&bytes.join(", "));
        out.push_str(",\n");
    }
    out.push_str("};\n");
    out.push_str(&format!("static const unsigned int {}_len = {};\n", identifier, data.len()));
    out
}

pub fn builtin_constructor_open(classname: &str, uri_root: &str, strategy: &str) -> String {
    format!(
        "{classname}::{classname}() : Crails::BuiltinAssets(\"{}\", \"{}\")\n{{\n",
        escape_c_string(uri_root),
        strategy
    )
}

pub fn builtin_registration(alias: &str, identifier: &Identifier) -> String {
    format!(
        "  add(\"{}\", reinterpret_cast<const char*>(::{id}), {id}_len);\n",
        escape_c_string(alias),
        id = identifier
    )
}

fn quote_js(value: &str) -> String {
    // A JSON string literal is a valid JS string literal.
    serde_json::Value::String(value.to_string()).to_string()
}
