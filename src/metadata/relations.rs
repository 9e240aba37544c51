//! Foreign keys to many-to-one associations.
//!
//! Resolution is split in two so that a table whose keys are invalid can be
//! dropped before anything links to it: [`validate_foreign_key`] runs over
//! every table first, then [`resolve_associations`] links the survivors.

use super::model::{AssociationDescriptor, AssociationTarget, ColumnDescriptor, ColumnPair, TableId};
use super::naming::{NameScope, NamingPolicy};
use crate::error::GenerationError;
use crate::introspect::RawForeignKey;
use crate::pipeline::result::Diagnostic;
use std::collections::{BTreeSet, HashMap};

/// Key facts of a table that can be the target of an association
#[derive(Debug, Clone, Copy)]
pub struct TargetKeys<'a> {
    pub id: TableId,
    pub table_name: &'a str,
    pub type_name: &'a str,
    pub primary_key: &'a [String],
    pub unique_keys: &'a [Vec<String>],
}

impl TargetKeys<'_> {
    /// Referenced columns, defaulting to the primary key
    fn referenced<'k>(&'k self, fk: &'k RawForeignKey) -> &'k [String] {
        if fk.referenced_columns.is_empty() {
            self.primary_key
        } else {
            &fk.referenced_columns
        }
    }
}

/// Associations and warnings produced for one table
#[derive(Debug, Default)]
pub struct Resolution {
    pub associations: Vec<AssociationDescriptor>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Check one foreign key of `table` against its columns and, when
/// available, its target's keys.
pub fn validate_foreign_key(
    table: &str,
    fk: &RawForeignKey,
    columns: &[ColumnDescriptor],
    target: Option<&TargetKeys<'_>>,
) -> Result<(), GenerationError> {
    if fk.columns.is_empty() {
        return Err(GenerationError::schema_read(
            table,
            format!("foreign key '{}' has no columns", fk.name),
        ));
    }
    if let Some(missing) = fk.columns.iter().find(|c| !columns.iter().any(|col| &col.name == *c)) {
        return Err(GenerationError::schema_read(
            table,
            format!("foreign key '{}' uses unknown column '{}'", fk.name, missing),
        ));
    }

    let Some(target) = target else {
        return Ok(());
    };
    let referenced = target.referenced(fk);
    if referenced.len() != fk.columns.len() {
        return Err(GenerationError::schema_read(
            table,
            format!(
                "foreign key '{}' pairs {} columns with {} referenced columns",
                fk.name,
                fk.columns.len(),
                referenced.len()
            ),
        ));
    }

    if is_partial_key(referenced, target) {
        return Err(GenerationError::PartialKey {
            table: table.to_string(),
            constraint: fk.name.clone(),
            target: target.table_name.to_string(),
            referenced_columns: referenced.to_vec(),
            key: target.primary_key.to_vec(),
        });
    }
    Ok(())
}

/// A strict subset of the target's primary key that matches no unique key
fn is_partial_key(referenced: &[String], target: &TargetKeys<'_>) -> bool {
    let referenced: BTreeSet<&str> = referenced.iter().map(String::as_str).collect();
    let primary: BTreeSet<&str> = target.primary_key.iter().map(String::as_str).collect();
    if referenced.len() >= primary.len() || !referenced.is_subset(&primary) {
        return false;
    }
    !target
        .unique_keys
        .iter()
        .any(|key| key.iter().map(String::as_str).collect::<BTreeSet<_>>() == referenced)
}

/// Source column with a trailing key marker removed
fn strip_key_suffix(column: &str) -> &str {
    let lower = column.to_ascii_lowercase();
    if lower.ends_with("_id") || lower.ends_with("_fk") {
        return &column[..column.len() - 3];
    }
    if let Some(stem) = column.strip_suffix("Id") {
        if stem.ends_with(|c: char| c.is_ascii_lowercase() || c.is_ascii_digit()) {
            return stem;
        }
    }
    column
}

/// Raw base name of the association derived from `fk`
pub fn association_base_name(fk: &RawForeignKey) -> &str {
    if let [column] = fk.columns.as_slice() {
        let stem = strip_key_suffix(column);
        if stem.chars().any(|c| c.is_ascii_alphanumeric()) {
            return stem;
        }
    }
    &fk.referenced_table
}

/// Link every foreign key of one table.
///
/// `targets` holds only tables that are part of the run and passed
/// validation; anything else becomes an unresolved association. Keys are
/// processed in constraint-name order and their names are claimed in the
/// table's field `scope`.
pub fn resolve_associations(
    owner: TableId,
    table: &str,
    foreign_keys: &[RawForeignKey],
    columns: &[ColumnDescriptor],
    targets: &HashMap<&str, TargetKeys<'_>>,
    scope: &mut NameScope,
    policy: &NamingPolicy,
) -> Resolution {
    let mut ordered: Vec<&RawForeignKey> = foreign_keys.iter().collect();
    ordered.sort_by(|a, b| a.name.cmp(&b.name));

    let mut resolution = Resolution::default();
    for fk in ordered {
        let base = policy.field_name(association_base_name(fk));
        let name = scope.claim(&base, &fk.name);

        let (target, referenced): (AssociationTarget, Vec<String>) =
            match targets.get(fk.referenced_table.as_str()) {
                Some(keys) => (
                    AssociationTarget::Resolved {
                        table: keys.id,
                        table_name: keys.table_name.to_string(),
                        type_name: keys.type_name.to_string(),
                    },
                    keys.referenced(fk).to_vec(),
                ),
                None => {
                    resolution.diagnostics.push(Diagnostic::warning(
                        table,
                        "unresolved_association",
                        format!(
                            "foreign key '{}' references table '{}', which is not part of this run",
                            fk.name, fk.referenced_table
                        ),
                    ));
                    (
                        AssociationTarget::Unresolved {
                            table_name: fk.referenced_table.clone(),
                        },
                        fk.referenced_columns.clone(),
                    )
                }
            };

        let column_pairs: Vec<ColumnPair> = fk
            .columns
            .iter()
            .enumerate()
            .map(|(i, source)| ColumnPair {
                source: source.clone(),
                target: referenced.get(i).cloned().unwrap_or_default(),
            })
            .collect();
        let optional = fk
            .columns
            .iter()
            .any(|c| columns.iter().any(|col| &col.name == c && col.nullable));
        let is_self_reference = matches!(target, AssociationTarget::Resolved { table, .. } if table == owner);

        resolution.associations.push(AssociationDescriptor {
            name,
            constraint: fk.name.clone(),
            is_composite: column_pairs.len() > 1,
            column_pairs,
            target,
            on_delete: fk.on_delete,
            on_update: fk.on_update,
            is_self_reference,
            optional,
        });
    }
    resolution
}
