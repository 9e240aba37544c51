//! Helpers shared by the Rust templates.

use convert_case::{Boundary, Case, Casing};

/// Keywords that need the `r#` prefix to be used as identifiers
const RUST_KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "do", "dyn",
    "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl", "in", "let", "loop",
    "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref", "return", "static",
    "struct", "trait", "true", "try", "type", "typeof", "union", "unsafe", "unsized", "use", "virtual",
    "where", "while", "yield",
];

/// Keywords that cannot be raw identifiers at all
pub const NON_RAW_KEYWORDS: &[&str] = &["self", "Self", "super", "crate"];

/// Convert a generated type name to a snake_case module / file stem.
///
/// Digits stay attached to the preceding word, matching the identifier
/// normalizer (`Address2Line` → `address2_line`).
pub fn to_snake_case(s: &str) -> String {
    s.with_boundaries(&[Boundary::Underscore, Boundary::LowerUpper, Boundary::Acronym])
        .to_case(Case::Snake)
}

/// Escape a string for use in Rust string literals
pub fn escape_rust_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

/// Prefix keywords with `r#` so they can be used as field names
pub fn escape_rust_keyword(ident: &str) -> String {
    if RUST_KEYWORDS.contains(&ident) {
        format!("r#{}", ident)
    } else {
        ident.to_string()
    }
}

/// Whether an identifier can be emitted at all, escaped or not
pub fn is_emittable_ident(ident: &str) -> bool {
    !ident.is_empty() && ident != "_" && !NON_RAW_KEYWORDS.contains(&ident)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snake_case_file_stems() {
        assert_eq!(to_snake_case("ProductStatus"), "product_status");
        assert_eq!(to_snake_case("CategoryRepository"), "category_repository");
        assert_eq!(to_snake_case("Address2Line"), "address2_line");
        assert_eq!(to_snake_case("_2faToken"), "2fa_token");
    }

    #[test]
    fn test_escape_rust_string() {
        assert_eq!(escape_rust_string("hello\nworld"), "hello\\nworld");
        assert_eq!(escape_rust_string("say \"hello\""), "say \\\"hello\\\"");
    }

    #[test]
    fn test_escape_rust_keyword() {
        assert_eq!(escape_rust_keyword("type"), "r#type");
        assert_eq!(escape_rust_keyword("match"), "r#match");
        assert_eq!(escape_rust_keyword("name"), "name");
        assert!(!is_emittable_ident("self"));
        assert!(is_emittable_ident("self_ref"));
    }
}
