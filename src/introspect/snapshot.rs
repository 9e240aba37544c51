//! Offline schema snapshots.
//!
//! A snapshot is a YAML description of a schema that can be generated from
//! without a database connection:
//!
//! ```yaml
//! dialect: mysql
//! schema: shop
//! tables:
//!   - name: product
//!     primary_key: [id]
//!     columns:
//!       - { name: id, type: int, nullable: false, auto_increment: true }
//!       - { name: status, type: "enum('draft','active')", nullable: false }
//!       - { name: category_id, type: int }
//!     foreign_keys:
//!       - { name: fk_product_category, columns: [category_id], referenced_table: category, referenced_columns: [id] }
//! ```
//!
//! Columns are nullable unless stated otherwise. Enumerated values come
//! either from an explicit `values:` list or from a MySQL-style
//! `enum('a','b')` type.

use super::{RawColumn, RawEnumColumn, RawForeignKey, RawIndex, SchemaReader, TableFilter};
use crate::dialect::Dialect;
use crate::error::GenerationError;
use crate::metadata::enums::parse_enum_literal;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

fn default_nullable() -> bool {
    true
}

/// Whole-schema snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaSnapshot {
    pub dialect: Dialect,
    #[serde(default)]
    pub schema: String,
    #[serde(default)]
    pub tables: Vec<SnapshotTable>,
}

/// One table in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnapshotTable {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<SnapshotColumn>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub primary_key: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub foreign_keys: Vec<RawForeignKey>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<RawIndex>,
}

/// One column in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnapshotColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub native_type: String,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<i64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub auto_increment: bool,
    /// Closed value list for enumerated columns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
}

impl SchemaSnapshot {
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Load a snapshot file. An unreadable snapshot is treated like an
    /// unreachable database.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, GenerationError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            GenerationError::connection(format!("Failed to read snapshot {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content).map_err(|e| {
            GenerationError::connection(format!("Failed to parse snapshot {}: {}", path.display(), e))
        })
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Capture every table passing `filter` from a live reader
    pub fn capture(reader: &mut dyn SchemaReader, filter: &TableFilter) -> Result<Self, GenerationError> {
        let mut tables = Vec::new();
        for name in reader.list_tables(filter)? {
            let raw = reader.read_table(&name)?;
            let primary_key = raw
                .indexes
                .iter()
                .find(|i| i.primary)
                .map(|i| i.columns.clone())
                .unwrap_or_default();
            let columns = raw
                .columns
                .iter()
                .map(|c| SnapshotColumn {
                    name: c.name.clone(),
                    native_type: c.native_type.clone(),
                    nullable: c.nullable,
                    default: c.default.clone(),
                    max_length: c.max_length,
                    precision: c.precision,
                    scale: c.scale,
                    auto_increment: c.auto_increment,
                    values: raw.enums.iter().find(|e| e.column == c.name).map(|e| e.values.clone()),
                })
                .collect();
            tables.push(SnapshotTable {
                name,
                columns,
                primary_key,
                foreign_keys: raw.foreign_keys,
                indexes: raw.indexes.into_iter().filter(|i| !i.primary).collect(),
            });
        }
        Ok(SchemaSnapshot {
            dialect: reader.dialect(),
            schema: reader.schema_name().to_string(),
            tables,
        })
    }

    fn table(&self, name: &str) -> Result<&SnapshotTable, GenerationError> {
        self.tables
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| GenerationError::schema_read(name, "table not found in snapshot"))
    }
}

/// [`SchemaReader`] over an in-memory [`SchemaSnapshot`]
#[derive(Debug, Clone)]
pub struct SnapshotSchemaReader {
    snapshot: SchemaSnapshot,
}

impl SnapshotSchemaReader {
    pub fn new(snapshot: SchemaSnapshot) -> Self {
        Self { snapshot }
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        SchemaSnapshot::from_yaml(yaml).map(Self::new)
    }

    pub fn snapshot(&self) -> &SchemaSnapshot {
        &self.snapshot
    }
}

impl SchemaReader for SnapshotSchemaReader {
    fn dialect(&self) -> Dialect {
        self.snapshot.dialect
    }

    fn schema_name(&self) -> &str {
        &self.snapshot.schema
    }

    fn list_tables(&mut self, filter: &TableFilter) -> Result<Vec<String>, GenerationError> {
        Ok(filter.apply(self.snapshot.tables.iter().map(|t| t.name.clone())))
    }

    fn read_columns(&mut self, table: &str) -> Result<Vec<RawColumn>, GenerationError> {
        let table = self.snapshot.table(table)?;
        Ok(table
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| RawColumn {
                name: c.name.clone(),
                native_type: c.native_type.clone(),
                nullable: c.nullable,
                default: c.default.clone(),
                max_length: c.max_length,
                precision: c.precision,
                scale: c.scale,
                auto_increment: c.auto_increment,
                ordinal: i as i64 + 1,
            })
            .collect())
    }

    fn read_foreign_keys(&mut self, table: &str) -> Result<Vec<RawForeignKey>, GenerationError> {
        Ok(self.snapshot.table(table)?.foreign_keys.clone())
    }

    fn read_indexes(&mut self, table: &str) -> Result<Vec<RawIndex>, GenerationError> {
        let table = self.snapshot.table(table)?;
        let mut indexes = Vec::with_capacity(table.indexes.len() + 1);
        if !table.primary_key.is_empty() {
            indexes.push(RawIndex {
                name: format!("{}_pkey", table.name),
                columns: table.primary_key.clone(),
                unique: true,
                primary: true,
            });
        }
        indexes.extend(table.indexes.iter().cloned());
        Ok(indexes)
    }

    fn read_enum_declarations(&mut self, table: &str) -> Result<Vec<RawEnumColumn>, GenerationError> {
        let table = self.snapshot.table(table)?;
        Ok(table
            .columns
            .iter()
            .filter_map(|c| {
                let values = c.values.clone().or_else(|| parse_enum_literal(&c.native_type))?;
                Some(RawEnumColumn {
                    column: c.name.clone(),
                    values,
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHOP: &str = r#"
dialect: mysql
schema: shop
tables:
  - name: product
    primary_key: [id]
    columns:
      - { name: id, type: int, nullable: false, auto_increment: true }
      - { name: status, type: "enum('draft','active')", nullable: false, default: draft }
      - { name: kind, type: product_kind, values: [physical, digital] }
    indexes:
      - { name: uq_kind, columns: [kind], unique: true }
"#;

    #[test]
    fn test_reads_columns_with_ordinals() {
        let mut reader = SnapshotSchemaReader::from_yaml(SHOP).unwrap();
        let columns = reader.read_columns("product").unwrap();
        assert_eq!(columns.len(), 3);
        assert_eq!(columns[0].ordinal, 1);
        assert!(!columns[0].nullable);
        assert!(columns[2].nullable);
        assert_eq!(columns[1].default.as_deref(), Some("draft"));
    }

    #[test]
    fn test_enum_declarations_from_literal_and_values() {
        let mut reader = SnapshotSchemaReader::from_yaml(SHOP).unwrap();
        let enums = reader.read_enum_declarations("product").unwrap();
        assert_eq!(enums.len(), 2);
        assert_eq!(enums[0].values, vec!["draft", "active"]);
        assert_eq!(enums[1].values, vec!["physical", "digital"]);
    }

    #[test]
    fn test_primary_key_listed_as_index() {
        let mut reader = SnapshotSchemaReader::from_yaml(SHOP).unwrap();
        let indexes = reader.read_indexes("product").unwrap();
        assert!(indexes[0].primary);
        assert_eq!(indexes[0].columns, vec!["id"]);
        assert!(indexes[1].unique && !indexes[1].primary);
    }

    #[test]
    fn test_missing_table_is_schema_read_error() {
        let mut reader = SnapshotSchemaReader::from_yaml(SHOP).unwrap();
        let err = reader.read_columns("ghost").unwrap_err();
        assert!(matches!(err, GenerationError::SchemaRead { ref table, .. } if table == "ghost"));
    }

    #[test]
    fn test_capture_round_trips_through_yaml() {
        let mut reader = SnapshotSchemaReader::from_yaml(SHOP).unwrap();
        let captured = SchemaSnapshot::capture(&mut reader, &TableFilter::all()).unwrap();
        let yaml = captured.to_yaml().unwrap();
        let reparsed = SchemaSnapshot::from_yaml(&yaml).unwrap();
        assert_eq!(reparsed.tables[0].primary_key, vec!["id"]);
        assert_eq!(reparsed.tables[0].indexes.len(), 1);
        assert_eq!(
            reparsed.tables[0].columns[1].values,
            Some(vec!["draft".to_string(), "active".to_string()])
        );
    }
}
