//! Identifier helpers for generated JavaScript
//!
//! Names flowing through the linker come from export lists and may be any
//! string. These helpers decide when a name can be written bare and how to
//! turn an arbitrary string into a usable binding name.

use cow_utils::CowUtils;

const RESERVED_WORDS: &[&str] = &[
    "await",
    "break",
    "case",
    "catch",
    "class",
    "const",
    "continue",
    "debugger",
    "default",
    "delete",
    "do",
    "else",
    "enum",
    "export",
    "extends",
    "false",
    "finally",
    "for",
    "function",
    "if",
    "implements",
    "import",
    "in",
    "instanceof",
    "interface",
    "let",
    "new",
    "null",
    "package",
    "private",
    "protected",
    "public",
    "return",
    "static",
    "super",
    "switch",
    "this",
    "throw",
    "true",
    "try",
    "typeof",
    "var",
    "void",
    "while",
    "with",
    "yield",
];

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_identifier_part(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// Check whether `name` can be used as a bare binding name
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    is_identifier_start(first) && chars.all(is_identifier_part) && !RESERVED_WORDS.contains(&name)
}

/// Convert an arbitrary string into something usable as part of an identifier
///
/// Runs of invalid characters collapse into a single `_`, and a leading
/// character that cannot start an identifier gets a `_` prefix. The result is
/// not checked against reserved words because callers always combine it with
/// a prefix or pass it through the allocator.
pub fn to_identifier(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 1);
    if let Some(first) = name.chars().next()
        && !is_identifier_start(first)
    {
        out.push('_');
    }
    let mut in_invalid_run = false;
    for c in name.chars() {
        if is_identifier_part(c) {
            out.push(c);
            in_invalid_run = false;
        } else if !in_invalid_run {
            out.push('_');
            in_invalid_run = true;
        }
    }
    out
}

/// Render `s` as a double-quoted string literal
///
/// Line terminators and other control characters are escaped, so the literal
/// always stays on one line.
pub fn string_literal(s: &str) -> String {
    let escaped = s.cow_replace('\\', "\\\\");
    let escaped = escaped.cow_replace('"', "\\\"");
    let mut out = String::with_capacity(escaped.len() + 2);
    out.push('"');
    for c in escaped.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{2028}' | '\u{2029}' => out.push_str(&format!("\\u{:04x}", u32::from(c))),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", u32::from(c))),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Render a property access chain, e.g. `.foo["bar-baz"]`
pub fn property_access<S: AsRef<str>>(properties: &[S]) -> String {
    let mut out = String::new();
    for property in properties {
        let property = property.as_ref();
        // reserved words are valid property names after a dot
        if is_identifier(property) || RESERVED_WORDS.contains(&property) {
            out.push('.');
            out.push_str(property);
        } else {
            out.push('[');
            out.push_str(&string_literal(property));
            out.push(']');
        }
    }
    out
}

/// Render a name in export-specifier position (`x as <name>`)
pub fn export_specifier_name(name: &str) -> String {
    if is_identifier(name) || name == crate::types::DEFAULT_EXPORT {
        name.to_owned()
    } else {
        string_literal(name)
    }
}
