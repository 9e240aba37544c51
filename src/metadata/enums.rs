//! Enumerated-value columns.
//!
//! A column is enumerated when its declaration carries a closed value list:
//! a MySQL `enum('a','b')` type, a PostgreSQL enum type, or an explicit
//! snapshot `values:` list. Every such column gets its own generated type;
//! identical value lists on different columns are never merged.

use super::model::{EnumCase, EnumDescriptor};
use super::naming::{normalize, NamingPolicy};
use crate::error::GenerationError;
use std::collections::HashMap;

/// Case name for the empty string value
pub const EMPTY_VALUE: &str = "EMPTY_VALUE";

/// Parse the value list out of an `enum('a','b')` declaration.
///
/// Quotes inside values are doubled (`'it''s'`) or backslash-escaped.
/// Returns `None` for anything that is not an enum declaration.
///
/// ```
/// use schemagen::metadata::enums::parse_enum_literal;
///
/// assert_eq!(
///     parse_enum_literal("enum('draft','it''s live')"),
///     Some(vec!["draft".to_string(), "it's live".to_string()])
/// );
/// assert_eq!(parse_enum_literal("varchar(20)"), None);
/// ```
pub fn parse_enum_literal(native_type: &str) -> Option<Vec<String>> {
    let trimmed = native_type.trim();
    let head = trimmed.get(..4)?;
    if !head.eq_ignore_ascii_case("enum") {
        return None;
    }
    let body = trimmed[4..].trim_start().strip_prefix('(')?;

    let mut values = Vec::new();
    let mut chars = body.chars().peekable();
    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.next()? != '\'' {
            return None;
        }
        let mut value = String::new();
        loop {
            match chars.next()? {
                '\'' if chars.peek() == Some(&'\'') => {
                    chars.next();
                    value.push('\'');
                }
                '\'' => break,
                '\\' => value.push(chars.next()?),
                c => value.push(c),
            }
        }
        values.push(value);
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        match chars.next()? {
            ',' => continue,
            ')' => break,
            _ => return None,
        }
    }
    if chars.any(|c| !c.is_whitespace()) {
        return None;
    }
    Some(values)
}

/// Case name for one raw value, before collision checks
pub fn case_name(raw: &str, position: usize, policy: &NamingPolicy) -> String {
    if raw.is_empty() {
        return EMPTY_VALUE.to_string();
    }
    let normalized = normalize(raw, policy.enum_case);
    if normalized.is_empty() {
        // Values made only of symbols keep their position instead
        format!("VALUE_{}", position + 1)
    } else {
        normalized
    }
}

/// Build the descriptor for one enumerated column.
///
/// The type name is left empty; it is claimed in the run's type scope once
/// every table has been read.
pub fn extract_enum(
    table: &str,
    column: &str,
    values: &[String],
    policy: &NamingPolicy,
) -> Result<EnumDescriptor, GenerationError> {
    let mut seen: HashMap<String, &str> = HashMap::new();
    let mut cases = Vec::with_capacity(values.len());
    for (position, raw) in values.iter().enumerate() {
        let name = case_name(raw, position, policy);
        if let Some(first) = seen.get(&name) {
            return Err(GenerationError::EnumCollision {
                table: table.to_string(),
                column: column.to_string(),
                case_name: name,
                first: first.to_string(),
                second: raw.clone(),
            });
        }
        seen.insert(name.clone(), raw);
        cases.push(EnumCase {
            raw_value: raw.clone(),
            case_name: name,
        });
    }
    Ok(EnumDescriptor {
        type_name: String::new(),
        source_name: format!("{}_{}", table, column),
        cases,
    })
}
