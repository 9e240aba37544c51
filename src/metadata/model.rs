//! Per-run metadata model handed to templates.
//!
//! Descriptors are built once by the assembler and never mutated afterwards.

use super::types::SemanticType;
use crate::introspect::ReferentialAction;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a table within one run: its position in the sorted table set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableId(pub usize);

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Statically representable column default
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DefaultValue {
    Integer(i64),
    /// Fixed-point or floating literal, digits kept verbatim
    Number(String),
    Boolean(bool),
    Text(String),
}

impl fmt::Display for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Integer(v) => write!(f, "{}", v),
            DefaultValue::Number(v) => f.write_str(v),
            DefaultValue::Boolean(v) => write!(f, "{}", v),
            DefaultValue::Text(v) => write!(f, "{:?}", v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumCase {
    pub raw_value: String,
    pub case_name: String,
}

/// Generated enumerated type of one column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumDescriptor {
    pub type_name: String,
    /// `{table}_{column}`, the raw name the type name was derived from
    pub source_name: String,
    pub cases: Vec<EnumCase>,
}

impl EnumDescriptor {
    pub fn case_for(&self, raw_value: &str) -> Option<&str> {
        self.cases
            .iter()
            .find(|c| c.raw_value == raw_value)
            .map(|c| c.case_name.as_str())
    }

    pub fn raw_for(&self, case_name: &str) -> Option<&str> {
        self.cases
            .iter()
            .find(|c| c.case_name == case_name)
            .map(|c| c.raw_value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub field_name: String,
    pub native_type: String,
    pub semantic_type: SemanticType,
    pub nullable: bool,
    pub is_primary: bool,
    pub auto_increment: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enumeration: Option<EnumDescriptor>,
}

/// One source column and the target column it references
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnPair {
    pub source: String,
    /// Empty when the target is unresolved and the key names no columns
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AssociationTarget {
    Resolved { table: TableId, table_name: String, type_name: String },
    /// Referenced table is excluded, absent or failed in this run
    Unresolved { table_name: String },
}

impl AssociationTarget {
    pub fn table_name(&self) -> &str {
        match self {
            AssociationTarget::Resolved { table_name, .. } | AssociationTarget::Unresolved { table_name } => {
                table_name
            }
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, AssociationTarget::Resolved { .. })
    }
}

/// Many-to-one link derived from a foreign key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationDescriptor {
    pub name: String,
    pub constraint: String,
    pub column_pairs: Vec<ColumnPair>,
    pub target: AssociationTarget,
    pub on_delete: ReferentialAction,
    pub on_update: ReferentialAction,
    pub is_composite: bool,
    pub is_self_reference: bool,
    /// True when any source column is nullable
    pub optional: bool,
}

impl AssociationDescriptor {
    pub fn source_columns(&self) -> impl Iterator<Item = &str> {
        self.column_pairs.iter().map(|p| p.source.as_str())
    }
}

/// Everything known about one table after assembly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub id: TableId,
    pub schema: String,
    pub table_name: String,
    pub type_name: String,
    pub columns: Vec<ColumnDescriptor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub associations: Vec<AssociationDescriptor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub primary_key: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unique_keys: Vec<Vec<String>>,
    /// Name of the companion access stub, when stubs are generated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_stub_name: Option<String>,
}

impl TableDescriptor {
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn association(&self, name: &str) -> Option<&AssociationDescriptor> {
        self.associations.iter().find(|a| a.name == name)
    }

    pub fn primary_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.primary_key.iter().filter_map(move |name| self.column(name))
    }

    /// Columns carrying an enumerated type, in ordinal order
    pub fn enums(&self) -> impl Iterator<Item = (&ColumnDescriptor, &EnumDescriptor)> {
        self.columns
            .iter()
            .filter_map(|c| c.enumeration.as_ref().map(|e| (c, e)))
    }

    /// Every generated member name: column fields, then associations
    pub fn field_names(&self) -> Vec<&str> {
        self.columns
            .iter()
            .map(|c| c.field_name.as_str())
            .chain(self.associations.iter().map(|a| a.name.as_str()))
            .collect()
    }
}
