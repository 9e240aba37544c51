//! Per-table metadata assembly.
//!
//! Every table moves through
//! `Pending → ColumnsExtracted → AssociationsLinked → Finalized`, or ends in
//! `Failed`. Phase 1 ([`MetadataAssembler::ingest`]) extracts columns and
//! enums table by table; phase 2 ([`MetadataAssembler::link`]) validates
//! foreign keys across the whole set, drops offenders, then links the rest.
//!
//! Type names share one scope per run and are claimed in a fixed order:
//! entity names at construction, enum names and access-stub names during
//! linking. Both follow sorted table order, so the names do not depend on
//! the order tables were read in.

use super::enums::extract_enum;
use super::model::{ColumnDescriptor, DefaultValue, EnumDescriptor, TableDescriptor, TableId};
use super::naming::{NameScope, NamingPolicy};
use super::relations::{resolve_associations, validate_foreign_key, Resolution, TargetKeys};
use super::types::{SemanticType, TypeMap};
use crate::dialect::Dialect;
use crate::error::GenerationError;
use crate::introspect::{RawForeignKey, RawTable};
use crate::pipeline::result::Diagnostic;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableState {
    Pending,
    ColumnsExtracted,
    AssociationsLinked,
    Finalized,
    Failed,
}

impl fmt::Display for TableState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TableState::Pending => "pending",
            TableState::ColumnsExtracted => "columns extracted",
            TableState::AssociationsLinked => "associations linked",
            TableState::Finalized => "finalized",
            TableState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Knobs that change the shape of the model
#[derive(Debug, Clone)]
pub struct AssemblyOptions {
    pub naming: NamingPolicy,
    /// Give enumerated columns their own type; otherwise they map to text
    pub emit_enums: bool,
    /// Claim an access-stub name per table
    pub access_stubs: bool,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        AssemblyOptions {
            naming: NamingPolicy::default(),
            emit_enums: true,
            access_stubs: true,
        }
    }
}

/// Output of a full assembly
#[derive(Debug, Clone, Default)]
pub struct Assembly {
    /// Finalized tables in sorted order
    pub tables: Vec<TableDescriptor>,
    /// Tables that did not finalize, with the reason
    pub failures: Vec<(String, GenerationError)>,
    pub diagnostics: Vec<Diagnostic>,
}

struct TableSlot {
    id: TableId,
    name: String,
    type_name: String,
    state: TableState,
    columns: Vec<ColumnDescriptor>,
    foreign_keys: Vec<RawForeignKey>,
    primary_key: Vec<String>,
    unique_keys: Vec<Vec<String>>,
    field_scope: NameScope,
    resolution: Resolution,
    access_stub_name: Option<String>,
    error: Option<GenerationError>,
    pending_reason: Option<String>,
}

impl TableSlot {
    fn fail(&mut self, error: GenerationError) {
        warn!("Table '{}' excluded: {}", self.name, error);
        self.state = TableState::Failed;
        self.error = Some(error);
    }

    fn target_keys(&self) -> TargetKeys<'_> {
        TargetKeys {
            id: self.id,
            table_name: &self.name,
            type_name: &self.type_name,
            primary_key: &self.primary_key,
            unique_keys: &self.unique_keys,
        }
    }
}

struct Extracted {
    columns: Vec<ColumnDescriptor>,
    primary_key: Vec<String>,
    unique_keys: Vec<Vec<String>>,
    diagnostics: Vec<Diagnostic>,
}

/// Builds [`TableDescriptor`]s for one run
pub struct MetadataAssembler<'m> {
    type_map: &'m TypeMap,
    dialect: Dialect,
    schema: String,
    options: AssemblyOptions,
    slots: Vec<TableSlot>,
    index: HashMap<String, usize>,
    type_scope: NameScope,
    diagnostics: Vec<Diagnostic>,
    linked: bool,
}

impl<'m> MetadataAssembler<'m> {
    /// Register the run's table set and claim entity type names.
    ///
    /// `tables` is sorted and deduplicated here; table identities are
    /// positions in that order.
    pub fn new(
        type_map: &'m TypeMap,
        dialect: Dialect,
        schema: impl Into<String>,
        options: AssemblyOptions,
        mut tables: Vec<String>,
    ) -> Self {
        tables.sort();
        tables.dedup();

        let mut type_scope = options.naming.type_scope();
        let mut slots = Vec::with_capacity(tables.len());
        let mut index = HashMap::with_capacity(tables.len());
        for (position, name) in tables.into_iter().enumerate() {
            let type_name = type_scope.claim(&options.naming.type_name(&name), &name);
            index.insert(name.clone(), position);
            slots.push(TableSlot {
                id: TableId(position),
                type_name,
                state: TableState::Pending,
                columns: Vec::new(),
                foreign_keys: Vec::new(),
                primary_key: Vec::new(),
                unique_keys: Vec::new(),
                field_scope: options.naming.field_scope(),
                resolution: Resolution::default(),
                access_stub_name: None,
                error: None,
                pending_reason: None,
                name,
            });
        }

        MetadataAssembler {
            type_map,
            dialect,
            schema: schema.into(),
            options,
            slots,
            index,
            type_scope,
            diagnostics: Vec::new(),
            linked: false,
        }
    }

    pub fn state(&self, table: &str) -> Option<TableState> {
        self.index.get(table).map(|&i| self.slots[i].state)
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|s| s.name.as_str())
    }

    /// Phase 1 for one table: `Pending → ColumnsExtracted` or `Failed`.
    ///
    /// A table with no columns stays `Pending`.
    pub fn ingest(&mut self, raw: RawTable) {
        let Some(&position) = self.index.get(&raw.name) else {
            debug!("Ignoring table '{}' outside the run's table set", raw.name);
            return;
        };
        if self.slots[position].state != TableState::Pending {
            debug!("Table '{}' already ingested", raw.name);
            return;
        }
        if raw.columns.is_empty() {
            self.slots[position].pending_reason = Some("no readable columns".to_string());
            return;
        }

        let slot = &mut self.slots[position];
        match extract_columns(
            &raw,
            self.type_map,
            self.dialect,
            &self.options,
            &mut slot.field_scope,
        ) {
            Ok(extracted) => {
                debug!("Extracted {} columns from '{}'", extracted.columns.len(), raw.name);
                slot.columns = extracted.columns;
                slot.primary_key = extracted.primary_key;
                slot.unique_keys = extracted.unique_keys;
                slot.foreign_keys = raw.foreign_keys;
                slot.state = TableState::ColumnsExtracted;
                self.diagnostics.extend(extracted.diagnostics);
            }
            Err(error) => slot.fail(error),
        }
    }

    /// Record a table that could not be read
    pub fn fail(&mut self, table: &str, error: GenerationError) {
        if let Some(&position) = self.index.get(table) {
            self.slots[position].fail(error);
        }
    }

    /// Phase 2: name enums, validate keys across all tables, then link.
    pub fn link(&mut self) {
        if self.linked {
            return;
        }
        self.linked = true;

        let naming = &self.options.naming;
        for slot in self.slots.iter_mut().filter(|s| s.state == TableState::ColumnsExtracted) {
            for column in &mut slot.columns {
                if let Some(enumeration) = column.enumeration.as_mut() {
                    let base = naming.type_name(&enumeration.source_name);
                    enumeration.type_name = self.type_scope.claim(&base, &enumeration.source_name);
                }
            }
        }

        // Validate against every extracted table before dropping any of them
        let mut rejected: Vec<(usize, GenerationError)> = Vec::new();
        {
            let targets = self.targets();
            for (position, slot) in self.slots.iter().enumerate() {
                if slot.state != TableState::ColumnsExtracted {
                    continue;
                }
                let failure = slot.foreign_keys.iter().find_map(|fk| {
                    validate_foreign_key(
                        &slot.name,
                        fk,
                        &slot.columns,
                        targets.get(fk.referenced_table.as_str()),
                    )
                    .err()
                });
                if let Some(error) = failure {
                    rejected.push((position, error));
                }
            }
        }
        for (position, error) in rejected {
            self.slots[position].fail(error);
        }

        let mut linked: Vec<(usize, NameScope, Resolution)> = Vec::new();
        {
            let targets = self.targets();
            for (position, slot) in self.slots.iter().enumerate() {
                if slot.state != TableState::ColumnsExtracted {
                    continue;
                }
                let mut scope = slot.field_scope.clone();
                let resolution = resolve_associations(
                    slot.id,
                    &slot.name,
                    &slot.foreign_keys,
                    &slot.columns,
                    &targets,
                    &mut scope,
                    naming,
                );
                linked.push((position, scope, resolution));
            }
        }
        for (position, scope, resolution) in linked {
            let slot = &mut self.slots[position];
            slot.field_scope = scope;
            slot.resolution = resolution;
            slot.state = TableState::AssociationsLinked;
        }

        if self.options.access_stubs {
            for slot in self.slots.iter_mut().filter(|s| s.state == TableState::AssociationsLinked) {
                let base = format!("{}Repository", slot.type_name);
                slot.access_stub_name = Some(self.type_scope.claim(&base, &slot.name));
            }
        }
    }

    fn targets(&self) -> HashMap<&str, TargetKeys<'_>> {
        self.slots
            .iter()
            .filter(|s| s.state == TableState::ColumnsExtracted)
            .map(|s| (s.name.as_str(), s.target_keys()))
            .collect()
    }

    /// Close the run: linked tables become `Finalized`, the rest fail.
    ///
    /// Tables still `Pending` fail with a metadata extraction error, or as
    /// cancelled when the run stopped before reading them.
    pub fn finalize(mut self, cancelled: bool) -> Assembly {
        self.link();

        let mut assembly = Assembly {
            diagnostics: std::mem::take(&mut self.diagnostics),
            ..Assembly::default()
        };
        for mut slot in self.slots {
            match slot.state {
                TableState::AssociationsLinked => {
                    slot.state = TableState::Finalized;
                    assembly.diagnostics.append(&mut slot.resolution.diagnostics);
                    assembly.tables.push(TableDescriptor {
                        id: slot.id,
                        schema: self.schema.clone(),
                        table_name: slot.name,
                        type_name: slot.type_name,
                        columns: slot.columns,
                        associations: slot.resolution.associations,
                        primary_key: slot.primary_key,
                        unique_keys: slot.unique_keys,
                        access_stub_name: slot.access_stub_name,
                    });
                }
                TableState::Pending if cancelled => {
                    let error = GenerationError::Cancelled {
                        reason: format!("table '{}' was not read before the run stopped", slot.name),
                    };
                    assembly.failures.push((slot.name, error));
                }
                TableState::Pending => {
                    let error = GenerationError::MetadataExtraction {
                        reason: slot
                            .pending_reason
                            .unwrap_or_else(|| "table was never read".to_string()),
                        table: slot.name.clone(),
                    };
                    warn!("Table '{}' excluded: {}", slot.name, error);
                    assembly.failures.push((slot.name, error));
                }
                TableState::Failed | TableState::ColumnsExtracted | TableState::Finalized => {
                    let error = slot.error.unwrap_or_else(|| GenerationError::MetadataExtraction {
                        table: slot.name.clone(),
                        reason: format!("table stopped in state '{}'", slot.state),
                    });
                    assembly.failures.push((slot.name, error));
                }
            }
        }
        assembly
    }
}

fn extract_columns(
    raw: &RawTable,
    type_map: &TypeMap,
    dialect: Dialect,
    options: &AssemblyOptions,
    field_scope: &mut NameScope,
) -> Result<Extracted, GenerationError> {
    let naming = &options.naming;
    let mut raw_columns: Vec<_> = raw.columns.iter().collect();
    raw_columns.sort_by_key(|c| c.ordinal);

    let primary_key = raw
        .indexes
        .iter()
        .find(|i| i.primary)
        .map(|i| i.columns.clone())
        .unwrap_or_default();

    let mut unique_indexes: Vec<_> = raw.indexes.iter().filter(|i| i.unique && !i.primary).collect();
    unique_indexes.sort_by(|a, b| a.name.cmp(&b.name));
    let mut unique_keys: Vec<Vec<String>> = Vec::new();
    for index in unique_indexes {
        if index.columns != primary_key && !unique_keys.contains(&index.columns) {
            unique_keys.push(index.columns.clone());
        }
    }

    let declared: HashMap<&str, &Vec<String>> = raw
        .enums
        .iter()
        .map(|e| (e.column.as_str(), &e.values))
        .collect();

    let mut diagnostics = Vec::new();
    let mut columns = Vec::with_capacity(raw_columns.len());
    for column in raw_columns {
        let (semantic_type, enumeration) = match declared.get(column.name.as_str()) {
            Some(values) if values.is_empty() => {
                diagnostics.push(Diagnostic::warning(
                    &raw.name,
                    "empty_enum",
                    format!("column '{}' declares no enumerated values; mapped as text", column.name),
                ));
                (SemanticType::Text, None)
            }
            Some(values) if options.emit_enums => (
                SemanticType::Enumerated,
                Some(extract_enum(&raw.name, &column.name, values, naming)?),
            ),
            Some(_) => (SemanticType::Text, None),
            None => {
                let mapping = type_map.map(dialect, &column.native_type);
                if mapping.fallback {
                    diagnostics.push(Diagnostic::warning(
                        &raw.name,
                        "type_fallback",
                        format!(
                            "column '{}' has unknown type '{}'; mapped as opaque text",
                            column.name, column.native_type
                        ),
                    ));
                }
                (mapping.semantic, None)
            }
        };

        let field_name = field_scope.claim(&naming.field_name(&column.name), &column.name);
        let is_primary = primary_key.contains(&column.name);
        let default = parse_default(
            column.default.as_deref(),
            dialect,
            &semantic_type,
            enumeration.as_ref(),
        );

        columns.push(ColumnDescriptor {
            name: column.name.clone(),
            field_name,
            native_type: column.native_type.clone(),
            semantic_type,
            nullable: column.nullable && !is_primary,
            is_primary,
            auto_increment: column.auto_increment,
            default,
            max_length: column.max_length,
            precision: column.precision,
            scale: column.scale,
            enumeration,
        });
    }

    Ok(Extracted {
        columns,
        primary_key,
        unique_keys,
        diagnostics,
    })
}

enum Literal {
    Quoted(String),
    Bare(String),
}

/// Split a leading `'...'` literal into its content and the remainder
fn split_quoted(s: &str) -> Option<(String, &str)> {
    let mut content = String::new();
    let mut chars = s.char_indices().skip(1).peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '\'' if matches!(chars.peek(), Some((_, '\''))) => {
                chars.next();
                content.push('\'');
            }
            '\'' => return Some((content, &s[i + 1..])),
            '\\' => {
                let (_, escaped) = chars.next()?;
                content.push(escaped);
            }
            c => content.push(c),
        }
    }
    None
}

fn strip_parens(mut s: &str) -> &str {
    while s.len() >= 2 && s.starts_with('(') && s.ends_with(')') {
        s = s[1..s.len() - 1].trim();
    }
    s
}

fn parse_literal(raw: &str) -> Option<Literal> {
    let s = strip_parens(raw.trim());
    if s.starts_with('\'') {
        let (content, rest) = split_quoted(s)?;
        let rest = rest.trim();
        return if rest.is_empty() || rest.starts_with("::") {
            Some(Literal::Quoted(content))
        } else {
            None
        };
    }
    let bare = match s.find("::") {
        Some(i) => strip_parens(s[..i].trim()),
        None => s,
    };
    if bare.is_empty() || bare.eq_ignore_ascii_case("null") || bare.contains('(') {
        return None;
    }
    Some(Literal::Bare(bare.to_string()))
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "b'1'" | "yes" => Some(true),
        "false" | "f" | "0" | "b'0'" | "no" => Some(false),
        _ => None,
    }
}

fn is_number(s: &str) -> bool {
    !s.is_empty()
        && s.chars().any(|c| c.is_ascii_digit())
        && s.chars().all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
        && s.parse::<f64>().is_ok()
}

/// Statically representable default, if any.
///
/// Integer, decimal, boolean and string literals are kept (PostgreSQL
/// `'x'::type` casts included). Function calls, `NULL` and expressions are
/// dropped. MySQL reports string defaults unquoted; those are accepted for
/// textual columns.
pub fn parse_default(
    raw: Option<&str>,
    dialect: Dialect,
    semantic: &SemanticType,
    enumeration: Option<&EnumDescriptor>,
) -> Option<DefaultValue> {
    let literal = parse_literal(raw?)?;
    let text = match literal {
        Literal::Quoted(text) => text,
        Literal::Bare(token) => {
            let textual = matches!(
                semantic,
                SemanticType::Text | SemanticType::Enumerated | SemanticType::Opaque
            );
            if textual && dialect != Dialect::MySql {
                return None;
            }
            token
        }
    };

    match semantic {
        SemanticType::Boolean => parse_bool(&text).map(DefaultValue::Boolean),
        s if s.is_integer() => text.parse::<i64>().ok().map(DefaultValue::Integer),
        SemanticType::Decimal | SemanticType::Float | SemanticType::Double => {
            is_number(&text).then(|| DefaultValue::Number(text))
        }
        SemanticType::Enumerated => enumeration?
            .case_for(&text)
            .is_some()
            .then(|| DefaultValue::Text(text)),
        SemanticType::Binary | SemanticType::Array(_) => None,
        _ => Some(DefaultValue::Text(text)),
    }
}
