//! Error taxonomy for a generation run.
//!
//! Only [`GenerationError::Connection`] aborts a run. Every other variant is
//! scoped to one table or one artifact and ends up in the run's diagnostics.

use crate::codegen::templates::ArtifactKind;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading, assembling, rendering or writing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GenerationError {
    /// Database unreachable, unauthenticated, or built for another backend
    #[error("Connection error: {reason}")]
    Connection { reason: String },

    /// A listed table could not be read (e.g. dropped by concurrent DDL)
    #[error("Failed to read schema for table '{table}': {reason}")]
    SchemaRead { table: String, reason: String },

    /// A composite foreign key covers only part of the referenced key
    #[error(
        "Foreign key '{constraint}' on table '{table}' references {referenced_columns:?} of '{target}', \
         which is a partial key of {key:?}"
    )]
    PartialKey {
        table: String,
        constraint: String,
        target: String,
        referenced_columns: Vec<String>,
        key: Vec<String>,
    },

    /// Two enum values normalize to the same case name
    #[error(
        "Enum values {first:?} and {second:?} of column '{table}.{column}' both normalize to '{case_name}'"
    )]
    EnumCollision {
        table: String,
        column: String,
        case_name: String,
        first: String,
        second: String,
    },

    /// A table never left the `Pending` state
    #[error("Metadata extraction failed for table '{table}': {reason}")]
    MetadataExtraction { table: String, reason: String },

    /// A template rejected a descriptor
    #[error("Template '{artifact}' failed for '{descriptor}': {reason}")]
    Template {
        descriptor: String,
        artifact: ArtifactKind,
        reason: String,
    },

    /// Writing an artifact to disk failed
    #[error("Failed to write '{}': {message}", path.display())]
    FileWrite { path: PathBuf, message: String },

    /// The run was cancelled or its deadline passed
    #[error("Cancelled: {reason}")]
    Cancelled { reason: String },
}

impl GenerationError {
    pub fn connection(reason: impl fmt::Display) -> Self {
        GenerationError::Connection {
            reason: reason.to_string(),
        }
    }

    pub fn schema_read(table: &str, reason: impl fmt::Display) -> Self {
        GenerationError::SchemaRead {
            table: table.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Only connection failures abort the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(self, GenerationError::Connection { .. })
    }

    /// Table the error is scoped to, if any
    pub fn table(&self) -> Option<&str> {
        match self {
            GenerationError::SchemaRead { table, .. }
            | GenerationError::PartialKey { table, .. }
            | GenerationError::EnumCollision { table, .. }
            | GenerationError::MetadataExtraction { table, .. } => Some(table),
            GenerationError::Template { descriptor, .. } => Some(descriptor),
            _ => None,
        }
    }

    /// Stable snake_case label used in diagnostics
    pub fn label(&self) -> &'static str {
        match self {
            GenerationError::Connection { .. } => "connection_error",
            GenerationError::SchemaRead { .. } => "schema_read_error",
            GenerationError::PartialKey { .. } => "partial_key_error",
            GenerationError::EnumCollision { .. } => "enum_collision_error",
            GenerationError::MetadataExtraction { .. } => "metadata_extraction_error",
            GenerationError::Template { .. } => "template_error",
            GenerationError::FileWrite { .. } => "file_write_error",
            GenerationError::Cancelled { .. } => "cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_connection_is_fatal() {
        assert!(GenerationError::connection("refused").is_fatal());
        assert!(!GenerationError::schema_read("users", "gone").is_fatal());
    }

    #[test]
    fn test_display_names_table() {
        let err = GenerationError::schema_read("users", "relation does not exist");
        assert_eq!(
            err.to_string(),
            "Failed to read schema for table 'users': relation does not exist"
        );
        assert_eq!(err.table(), Some("users"));
        assert_eq!(err.label(), "schema_read_error");
    }

    #[test]
    fn test_serializes_with_kind_tag() {
        let err = GenerationError::Cancelled {
            reason: "deadline".to_string(),
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "cancelled");
        assert_eq!(json["reason"], "deadline");
    }
}
