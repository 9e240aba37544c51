//! Native column type to semantic type mapping.
//!
//! [`TypeMap`] is an immutable lookup keyed by `(Dialect, native name)`. It is
//! built once per run and injected into the assembler; overrides replace or
//! extend the built-in table for one dialect.

use crate::dialect::Dialect;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Engine-agnostic value category of a column
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    SmallInt,
    Integer,
    BigInt,
    Float,
    Double,
    /// Fixed-point number carried as text to keep its exact digits
    Decimal,
    Boolean,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Interval,
    Uuid,
    Text,
    Binary,
    Json,
    Array(Box<SemanticType>),
    Enumerated,
    /// Unknown native type, carried as text
    Opaque,
}

impl SemanticType {
    pub fn is_integer(&self) -> bool {
        matches!(self, SemanticType::SmallInt | SemanticType::Integer | SemanticType::BigInt)
    }

    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            SemanticType::Text | SemanticType::Opaque | SemanticType::Enumerated | SemanticType::Decimal
        )
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SemanticType::SmallInt => f.write_str("small_int"),
            SemanticType::Integer => f.write_str("integer"),
            SemanticType::BigInt => f.write_str("big_int"),
            SemanticType::Float => f.write_str("float"),
            SemanticType::Double => f.write_str("double"),
            SemanticType::Decimal => f.write_str("decimal"),
            SemanticType::Boolean => f.write_str("boolean"),
            SemanticType::Date => f.write_str("date"),
            SemanticType::Time => f.write_str("time"),
            SemanticType::Timestamp => f.write_str("timestamp"),
            SemanticType::TimestampTz => f.write_str("timestamp_tz"),
            SemanticType::Interval => f.write_str("interval"),
            SemanticType::Uuid => f.write_str("uuid"),
            SemanticType::Text => f.write_str("text"),
            SemanticType::Binary => f.write_str("binary"),
            SemanticType::Json => f.write_str("json"),
            SemanticType::Array(element) => write!(f, "array<{}>", element),
            SemanticType::Enumerated => f.write_str("enumerated"),
            SemanticType::Opaque => f.write_str("opaque"),
        }
    }
}

/// Result of one lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMapping {
    pub semantic: SemanticType,
    /// True when the native type was unknown and mapped to `Opaque`
    pub fallback: bool,
}

const POSTGRES_TYPES: &[(&str, SemanticType)] = &[
    ("smallint", SemanticType::SmallInt),
    ("int2", SemanticType::SmallInt),
    ("smallserial", SemanticType::SmallInt),
    ("serial2", SemanticType::SmallInt),
    ("integer", SemanticType::Integer),
    ("int", SemanticType::Integer),
    ("int4", SemanticType::Integer),
    ("serial", SemanticType::Integer),
    ("serial4", SemanticType::Integer),
    ("bigint", SemanticType::BigInt),
    ("int8", SemanticType::BigInt),
    ("bigserial", SemanticType::BigInt),
    ("serial8", SemanticType::BigInt),
    ("real", SemanticType::Float),
    ("float4", SemanticType::Float),
    ("double precision", SemanticType::Double),
    ("float8", SemanticType::Double),
    ("numeric", SemanticType::Decimal),
    ("decimal", SemanticType::Decimal),
    ("money", SemanticType::Decimal),
    ("boolean", SemanticType::Boolean),
    ("bool", SemanticType::Boolean),
    ("date", SemanticType::Date),
    ("time", SemanticType::Time),
    ("time without time zone", SemanticType::Time),
    ("time with time zone", SemanticType::Time),
    ("timetz", SemanticType::Time),
    ("timestamp", SemanticType::Timestamp),
    ("timestamp without time zone", SemanticType::Timestamp),
    ("timestamp with time zone", SemanticType::TimestampTz),
    ("timestamptz", SemanticType::TimestampTz),
    ("interval", SemanticType::Interval),
    ("uuid", SemanticType::Uuid),
    ("text", SemanticType::Text),
    ("character varying", SemanticType::Text),
    ("varchar", SemanticType::Text),
    ("character", SemanticType::Text),
    ("char", SemanticType::Text),
    ("bpchar", SemanticType::Text),
    ("citext", SemanticType::Text),
    ("name", SemanticType::Text),
    ("inet", SemanticType::Text),
    ("cidr", SemanticType::Text),
    ("macaddr", SemanticType::Text),
    ("xml", SemanticType::Text),
    ("bytea", SemanticType::Binary),
    ("json", SemanticType::Json),
    ("jsonb", SemanticType::Json),
];

const MYSQL_TYPES: &[(&str, SemanticType)] = &[
    ("tinyint(1)", SemanticType::Boolean),
    ("bit(1)", SemanticType::Boolean),
    ("bool", SemanticType::Boolean),
    ("boolean", SemanticType::Boolean),
    ("tinyint", SemanticType::SmallInt),
    ("smallint", SemanticType::SmallInt),
    ("year", SemanticType::SmallInt),
    ("mediumint", SemanticType::Integer),
    ("int", SemanticType::Integer),
    ("integer", SemanticType::Integer),
    ("bigint", SemanticType::BigInt),
    ("float", SemanticType::Float),
    ("double", SemanticType::Double),
    ("double precision", SemanticType::Double),
    ("real", SemanticType::Double),
    ("decimal", SemanticType::Decimal),
    ("numeric", SemanticType::Decimal),
    ("dec", SemanticType::Decimal),
    ("fixed", SemanticType::Decimal),
    ("date", SemanticType::Date),
    ("time", SemanticType::Time),
    ("datetime", SemanticType::Timestamp),
    ("timestamp", SemanticType::TimestampTz),
    ("char", SemanticType::Text),
    ("varchar", SemanticType::Text),
    ("tinytext", SemanticType::Text),
    ("text", SemanticType::Text),
    ("mediumtext", SemanticType::Text),
    ("longtext", SemanticType::Text),
    ("enum", SemanticType::Text),
    ("binary", SemanticType::Binary),
    ("varbinary", SemanticType::Binary),
    ("bit", SemanticType::Binary),
    ("tinyblob", SemanticType::Binary),
    ("blob", SemanticType::Binary),
    ("mediumblob", SemanticType::Binary),
    ("longblob", SemanticType::Binary),
    ("json", SemanticType::Json),
];

const SQLITE_TYPES: &[(&str, SemanticType)] = &[
    ("integer", SemanticType::BigInt),
    ("bigint", SemanticType::BigInt),
    ("int", SemanticType::Integer),
    ("mediumint", SemanticType::Integer),
    ("smallint", SemanticType::SmallInt),
    ("tinyint", SemanticType::SmallInt),
    ("real", SemanticType::Double),
    ("double", SemanticType::Double),
    ("double precision", SemanticType::Double),
    ("float", SemanticType::Double),
    ("numeric", SemanticType::Decimal),
    ("decimal", SemanticType::Decimal),
    ("boolean", SemanticType::Boolean),
    ("bool", SemanticType::Boolean),
    ("date", SemanticType::Date),
    ("time", SemanticType::Time),
    ("datetime", SemanticType::Timestamp),
    ("timestamp", SemanticType::Timestamp),
    ("text", SemanticType::Text),
    ("varchar", SemanticType::Text),
    ("character varying", SemanticType::Text),
    ("char", SemanticType::Text),
    ("character", SemanticType::Text),
    ("clob", SemanticType::Text),
    ("blob", SemanticType::Binary),
    ("json", SemanticType::Json),
    ("uuid", SemanticType::Uuid),
];

/// Immutable `(Dialect, native type)` → [`SemanticType`] lookup
#[derive(Debug, Clone, Default)]
pub struct TypeMap {
    entries: HashMap<(Dialect, String), SemanticType>,
}

impl TypeMap {
    /// Empty map: every lookup falls back to `Opaque`
    pub fn empty() -> Self {
        Self::default()
    }

    /// Built-in tables for every supported dialect
    pub fn builtin() -> Self {
        let mut entries = HashMap::new();
        for (dialect, table) in [
            (Dialect::Postgres, POSTGRES_TYPES),
            (Dialect::MySql, MYSQL_TYPES),
            (Dialect::Sqlite, SQLITE_TYPES),
        ] {
            for (native, semantic) in table {
                entries.insert((dialect, native.to_string()), semantic.clone());
            }
        }
        TypeMap { entries }
    }

    /// Add or replace one mapping
    ///
    /// # Example
    /// ```
    /// use schemagen::Dialect;
    /// use schemagen::metadata::types::{SemanticType, TypeMap};
    ///
    /// let map = TypeMap::builtin().with_override(Dialect::Postgres, "geometry", SemanticType::Binary);
    /// assert_eq!(map.map(Dialect::Postgres, "geometry").semantic, SemanticType::Binary);
    /// ```
    pub fn with_override(mut self, dialect: Dialect, native: &str, semantic: SemanticType) -> Self {
        self.entries.insert((dialect, normalize_declaration(native)), semantic);
        self
    }

    fn lookup(&self, dialect: Dialect, key: &str) -> Option<&SemanticType> {
        self.entries.get(&(dialect, key.to_string()))
    }

    /// Map a native declaration, falling back to `Opaque` when unknown
    pub fn map(&self, dialect: Dialect, native: &str) -> TypeMapping {
        match self.resolve(dialect, native) {
            Some(semantic) => TypeMapping {
                semantic,
                fallback: false,
            },
            None => TypeMapping {
                semantic: SemanticType::Opaque,
                fallback: true,
            },
        }
    }

    fn resolve(&self, dialect: Dialect, native: &str) -> Option<SemanticType> {
        let full = normalize_declaration(native);
        if let Some(semantic) = self.lookup(dialect, &full) {
            return Some(semantic.clone());
        }

        let base = base_name(&full);
        if let Some(semantic) = self.lookup(dialect, &base) {
            return Some(semantic.clone());
        }

        if let Some(element) = base.strip_suffix("[]") {
            return self
                .resolve(dialect, element)
                .map(|e| SemanticType::Array(Box::new(e)));
        }
        // pg_catalog names array types after their element with a leading underscore
        if dialect == Dialect::Postgres {
            if let Some(element) = base.strip_prefix('_') {
                return self
                    .resolve(dialect, element)
                    .map(|e| SemanticType::Array(Box::new(e)));
            }
        }
        None
    }
}

/// Lowercase and collapse whitespace
fn normalize_declaration(native: &str) -> String {
    native
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Strip `(...)` parameters and sign/padding modifiers
fn base_name(declaration: &str) -> String {
    let mut stripped = String::with_capacity(declaration.len());
    let mut depth = 0usize;
    let mut quoted = false;
    for c in declaration.chars() {
        match c {
            '\'' if depth > 0 => quoted = !quoted,
            '(' if !quoted => depth += 1,
            ')' if !quoted && depth > 0 => depth -= 1,
            _ if depth == 0 => stripped.push(c),
            _ => {}
        }
    }
    stripped
        .split_whitespace()
        .filter(|word| !matches!(*word, "unsigned" | "signed" | "zerofill"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn semantic(dialect: Dialect, native: &str) -> SemanticType {
        TypeMap::builtin().map(dialect, native).semantic
    }

    #[test]
    fn test_postgres_core_types() {
        assert_eq!(semantic(Dialect::Postgres, "integer"), SemanticType::Integer);
        assert_eq!(semantic(Dialect::Postgres, "character varying(255)"), SemanticType::Text);
        assert_eq!(semantic(Dialect::Postgres, "numeric(10,2)"), SemanticType::Decimal);
        assert_eq!(semantic(Dialect::Postgres, "timestamp(6) with time zone"), SemanticType::TimestampTz);
        assert_eq!(semantic(Dialect::Postgres, "JSONB"), SemanticType::Json);
    }

    #[test]
    fn test_postgres_arrays() {
        assert_eq!(
            semantic(Dialect::Postgres, "_int4"),
            SemanticType::Array(Box::new(SemanticType::Integer))
        );
        assert_eq!(
            semantic(Dialect::Postgres, "text[]"),
            SemanticType::Array(Box::new(SemanticType::Text))
        );
    }

    #[test]
    fn test_mysql_full_declaration_wins() {
        assert_eq!(semantic(Dialect::MySql, "tinyint(1)"), SemanticType::Boolean);
        assert_eq!(semantic(Dialect::MySql, "tinyint(4)"), SemanticType::SmallInt);
        assert_eq!(semantic(Dialect::MySql, "int(11) unsigned zerofill"), SemanticType::Integer);
        assert_eq!(semantic(Dialect::MySql, "enum('a','b(c)')"), SemanticType::Text);
    }

    #[test]
    fn test_same_name_differs_by_dialect() {
        assert_eq!(semantic(Dialect::MySql, "timestamp"), SemanticType::TimestampTz);
        assert_eq!(semantic(Dialect::Postgres, "timestamp"), SemanticType::Timestamp);
        assert_eq!(semantic(Dialect::Sqlite, "integer"), SemanticType::BigInt);
    }

    #[test]
    fn test_unknown_type_falls_back_to_opaque() {
        let mapping = TypeMap::builtin().map(Dialect::Postgres, "geometry(Point,4326)");
        assert_eq!(mapping.semantic, SemanticType::Opaque);
        assert!(mapping.fallback);
        assert!(!TypeMap::builtin().map(Dialect::Postgres, "uuid").fallback);
    }

    #[test]
    fn test_override_applies_to_one_dialect() {
        let map = TypeMap::builtin().with_override(Dialect::MySql, "Year", SemanticType::Integer);
        assert_eq!(map.map(Dialect::MySql, "year").semantic, SemanticType::Integer);
        assert!(map.map(Dialect::Postgres, "year").fallback);
    }
}
