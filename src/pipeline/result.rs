//! Outcome of one generation run.
//!
//! The orchestrator builds a [`GenerationResult`] once at the end of a run
//! and never mutates it afterwards. Everything in it serializes to JSON.

use crate::codegen::templates::ArtifactKind;
use crate::codegen::ConflictPolicy;
use crate::dialect::Dialect;
use crate::error::GenerationError;
use crate::metadata::TableDescriptor;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

/// Warning or error recorded during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub table: Option<String>,
    pub severity: Severity,
    pub kind: String,
    pub message: String,
}

impl Diagnostic {
    pub fn warning(table: &str, kind: &str, message: impl Into<String>) -> Self {
        Diagnostic {
            table: Some(table.to_string()),
            severity: Severity::Warning,
            kind: kind.to_string(),
            message: message.into(),
        }
    }

    pub fn error(error: &GenerationError) -> Self {
        Diagnostic {
            table: error.table().map(str::to_string),
            severity: Severity::Error,
            kind: error.label().to_string(),
            message: error.to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(table) => write!(f, "[{}] {}: {}", self.kind, table, self.message),
            None => write!(f, "[{}] {}", self.kind, self.message),
        }
    }
}

/// Overall status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// No error diagnostics (warnings allowed)
    Success,
    /// Errors, but at least one table produced output
    PartialFailure,
    /// Errors and no table produced output
    Failure,
    Cancelled,
}

impl RunStatus {
    pub fn evaluate(cancelled: bool, has_errors: bool, tables_produced: usize) -> Self {
        if cancelled {
            RunStatus::Cancelled
        } else if !has_errors {
            RunStatus::Success
        } else if tables_produced > 0 {
            RunStatus::PartialFailure
        } else {
            RunStatus::Failure
        }
    }

    /// Process exit code used by the CLI
    pub fn exit_code(&self) -> i32 {
        match self {
            RunStatus::Success => 0,
            RunStatus::PartialFailure => 2,
            RunStatus::Failure => 1,
            RunStatus::Cancelled => 130,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunStatus::Success => "success",
            RunStatus::PartialFailure => "partial failure",
            RunStatus::Failure => "failure",
            RunStatus::Cancelled => "cancelled",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    Written,
    /// Target existed under `fail-on-exists`
    Skipped,
    /// Dry run: nothing touched
    Planned,
    Failed,
}

/// One emitted (or attempted) source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactRecord {
    pub kind: ArtifactKind,
    pub logical_name: String,
    /// Owning table; `None` for the module index
    pub table: Option<String>,
    pub path: PathBuf,
    pub status: ArtifactStatus,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    Generated,
    /// Some artifacts of the table failed to render or write
    Partial,
    Failed,
    Cancelled,
}

impl TableStatus {
    pub fn produced_output(&self) -> bool {
        matches!(self, TableStatus::Generated | TableStatus::Partial)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableOutcome {
    pub table: String,
    pub status: TableStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<GenerationError>,
}

/// Aggregate result of [`crate::generate`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationResult {
    pub status: RunStatus,
    pub dialect: Dialect,
    pub schema: String,
    pub output_root: PathBuf,
    pub conflict_policy: ConflictPolicy,
    /// Sorted by table name
    pub tables: Vec<TableOutcome>,
    /// Sorted by path
    pub artifacts: Vec<ArtifactRecord>,
    pub diagnostics: Vec<Diagnostic>,
    /// Assembled descriptors of every table that reached `Finalized`
    pub model: Vec<TableDescriptor>,
}

impl GenerationResult {
    pub fn table(&self, name: &str) -> Option<&TableOutcome> {
        self.tables.iter().find(|t| t.table == name)
    }

    pub fn descriptor(&self, table_name: &str) -> Option<&TableDescriptor> {
        self.model.iter().find(|t| t.table_name == table_name)
    }

    pub fn artifact(&self, kind: ArtifactKind, logical_name: &str) -> Option<&ArtifactRecord> {
        self.artifacts
            .iter()
            .find(|a| a.kind == kind && a.logical_name == logical_name)
    }

    pub fn artifact_at(&self, path: &Path) -> Option<&ArtifactRecord> {
        self.artifacts.iter().find(|a| a.path == path)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_error())
    }

    pub fn count(&self, status: ArtifactStatus) -> usize {
        self.artifacts.iter().filter(|a| a.status == status).count()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_evaluation() {
        assert_eq!(RunStatus::evaluate(false, false, 0), RunStatus::Success);
        assert_eq!(RunStatus::evaluate(false, true, 3), RunStatus::PartialFailure);
        assert_eq!(RunStatus::evaluate(false, true, 0), RunStatus::Failure);
        assert_eq!(RunStatus::evaluate(true, false, 3), RunStatus::Cancelled);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(RunStatus::Success.exit_code(), 0);
        assert_eq!(RunStatus::PartialFailure.exit_code(), 2);
        assert_eq!(RunStatus::Failure.exit_code(), 1);
        assert_eq!(RunStatus::Cancelled.exit_code(), 130);
    }

    #[test]
    fn test_error_diagnostic_carries_label() {
        let diagnostic = Diagnostic::error(&GenerationError::schema_read("orders", "gone"));
        assert_eq!(diagnostic.table.as_deref(), Some("orders"));
        assert_eq!(diagnostic.kind, "schema_read_error");
        assert!(diagnostic.is_error());
        assert_eq!(
            diagnostic.to_string(),
            "[schema_read_error] orders: Failed to read schema for table 'orders': gone"
        );
    }
}
