//! Schema introspection: raw structural facts read from a relational database.
//!
//! A [`SchemaReader`] answers five questions per run: which tables exist, and
//! for each table its columns, foreign keys, indexes and enumerated-value
//! declarations. Everything returned here is raw catalog data; interpretation
//! happens in [`crate::metadata`].

pub mod database;
#[cfg(any(feature = "postgres", feature = "mysql", feature = "sqlite"))]
pub mod diesel_reader;
pub mod snapshot;

use crate::dialect::Dialect;
use crate::error::GenerationError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use database::DatabaseConfig;
#[cfg(any(feature = "postgres", feature = "mysql", feature = "sqlite"))]
pub use database::Database;
#[cfg(any(feature = "postgres", feature = "mysql", feature = "sqlite"))]
pub use diesel_reader::DieselSchemaReader;
pub use snapshot::{SchemaSnapshot, SnapshotSchemaReader};

/// Column as reported by the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawColumn {
    pub name: String,
    /// Native declaration, e.g. `decimal(10,2)` or `enum('a','b')`
    pub native_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    pub max_length: Option<i64>,
    pub precision: Option<i64>,
    pub scale: Option<i64>,
    pub auto_increment: bool,
    /// 1-based position within the table
    pub ordinal: i64,
}

/// Action taken on the referencing rows when the referenced row changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferentialAction {
    #[default]
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl ReferentialAction {
    /// Parse an `information_schema` / pragma rule such as `SET NULL`
    pub fn from_rule(rule: &str) -> Self {
        match rule.trim().to_uppercase().replace('_', " ").as_str() {
            "RESTRICT" => ReferentialAction::Restrict,
            "CASCADE" => ReferentialAction::Cascade,
            "SET NULL" => ReferentialAction::SetNull,
            "SET DEFAULT" => ReferentialAction::SetDefault,
            _ => ReferentialAction::NoAction,
        }
    }

    /// Parse a `pg_constraint.confdeltype` / `confupdtype` code
    pub fn from_pg_code(code: &str) -> Self {
        match code {
            "r" => ReferentialAction::Restrict,
            "c" => ReferentialAction::Cascade,
            "n" => ReferentialAction::SetNull,
            "d" => ReferentialAction::SetDefault,
            _ => ReferentialAction::NoAction,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            ReferentialAction::NoAction => "NO ACTION",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::SetDefault => "SET DEFAULT",
        }
    }
}

impl fmt::Display for ReferentialAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Foreign key constraint, columns in constraint order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawForeignKey {
    pub name: String,
    pub columns: Vec<String>,
    pub referenced_table: String,
    /// Empty when the key implicitly references the target's primary key
    #[serde(default)]
    pub referenced_columns: Vec<String>,
    #[serde(default)]
    pub on_delete: ReferentialAction,
    #[serde(default)]
    pub on_update: ReferentialAction,
}

/// Index or key constraint, columns in key order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawIndex {
    pub name: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub primary: bool,
}

/// Column whose declaration restricts values to a closed list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEnumColumn {
    pub column: String,
    pub values: Vec<String>,
}

/// Everything read for one table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub name: String,
    pub columns: Vec<RawColumn>,
    pub foreign_keys: Vec<RawForeignKey>,
    pub indexes: Vec<RawIndex>,
    pub enums: Vec<RawEnumColumn>,
}

/// Source of raw schema facts.
///
/// Implementations hold whatever connection they need; the pipeline owns the
/// reader for the duration of one run and drops it afterwards.
pub trait SchemaReader {
    /// Dialect the native type names follow
    fn dialect(&self) -> Dialect;

    /// Schema (namespace / database) being read
    fn schema_name(&self) -> &str;

    /// Table names passing `filter`
    fn list_tables(&mut self, filter: &TableFilter) -> Result<Vec<String>, GenerationError>;

    fn read_columns(&mut self, table: &str) -> Result<Vec<RawColumn>, GenerationError>;

    fn read_foreign_keys(&mut self, table: &str) -> Result<Vec<RawForeignKey>, GenerationError>;

    fn read_indexes(&mut self, table: &str) -> Result<Vec<RawIndex>, GenerationError>;

    fn read_enum_declarations(&mut self, table: &str) -> Result<Vec<RawEnumColumn>, GenerationError>;

    /// Read all facts for one table
    fn read_table(&mut self, table: &str) -> Result<RawTable, GenerationError> {
        Ok(RawTable {
            name: table.to_string(),
            columns: self.read_columns(table)?,
            foreign_keys: self.read_foreign_keys(table)?,
            indexes: self.read_indexes(table)?,
            enums: self.read_enum_declarations(table)?,
        })
    }
}

/// Name-based include/exclude filter.
///
/// Entries are exact table names or wildcard patterns using `*` and `?`.
/// An empty include list includes every table.
#[derive(Debug, Clone, Default)]
pub struct TableFilter {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl TableFilter {
    pub fn new<S: AsRef<str>>(include: &[S], exclude: &[S]) -> Result<Self, regex::Error> {
        Ok(Self {
            include: include.iter().map(|p| glob_regex(p.as_ref())).collect::<Result<_, _>>()?,
            exclude: exclude.iter().map(|p| glob_regex(p.as_ref())).collect::<Result<_, _>>()?,
        })
    }

    /// Filter that accepts every table
    pub fn all() -> Self {
        Self::default()
    }

    pub fn matches(&self, table: &str) -> bool {
        let included = self.include.is_empty() || self.include.iter().any(|re| re.is_match(table));
        included && !self.exclude.iter().any(|re| re.is_match(table))
    }

    /// Keep matching names, sorted and deduplicated
    pub fn apply<I: IntoIterator<Item = String>>(&self, names: I) -> Vec<String> {
        let mut kept: Vec<String> = names.into_iter().filter(|n| self.matches(n)).collect();
        kept.sort();
        kept.dedup();
        kept
    }
}

fn glob_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let escaped = regex::escape(pattern).replace(r"\*", ".*").replace(r"\?", ".");
    Regex::new(&format!("^{}$", escaped))
}
