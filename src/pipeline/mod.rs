//! Pipeline orchestration: the single `generate` entry point.
//!
//! A run has two halves:
//!
//! 1. **Read and assemble** on the calling thread, in sorted table order:
//!    list tables, read each one, then link associations across the set.
//! 2. **Render and write** on a bounded pool of scoped worker threads. Workers
//!    claim tables from a shared cursor and send per-table outputs over a
//!    channel to the aggregator, which is the only code building the result.
//!
//! The result is sorted before it is returned, so neither the reader's table
//! order nor worker scheduling shows up in it.

pub mod control;
pub mod result;

use crate::codegen::emitter::{self, RenderedArtifact};
use crate::codegen::fs_utils::{self, ConflictPolicy, WriteOutcome};
use crate::codegen::templates::{ArtifactKind, ModuleEntry, RenderOptions, TemplateSet};
use crate::error::GenerationError;
use crate::introspect::{SchemaReader, TableFilter};
use crate::metadata::{Assembly, AssemblyOptions, MetadataAssembler, NamingPolicy, TableDescriptor, TypeMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

pub use control::{CancellationToken, RunControl};
pub use result::{
    ArtifactRecord, ArtifactStatus, Diagnostic, GenerationResult, RunStatus, Severity, TableOutcome, TableStatus,
};

/// Inputs of one run besides the reader and the template set
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub filter: TableFilter,
    /// Logical namespace; also the directory under `output_root`
    pub namespace: String,
    pub output_root: PathBuf,
    pub conflict_policy: ConflictPolicy,
    pub access_stubs: bool,
    pub emit_enums: bool,
    /// Emit the module index (`mod.rs` for Rust)
    pub emit_index: bool,
    /// Render/write worker threads
    pub workers: usize,
    pub timeout: Option<Duration>,
    pub cancel: CancellationToken,
    /// Overrides the template set's naming policy
    pub naming: Option<NamingPolicy>,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        GenerateOptions {
            filter: TableFilter::all(),
            namespace: "models".to_string(),
            output_root: PathBuf::from("src"),
            conflict_policy: ConflictPolicy::FailOnExists,
            access_stubs: true,
            emit_enums: true,
            emit_index: true,
            workers: 1,
            timeout: None,
            cancel: CancellationToken::new(),
            naming: None,
        }
    }
}

impl GenerateOptions {
    fn render_options(&self) -> RenderOptions {
        RenderOptions {
            namespace: self.namespace.clone(),
            access_stubs: self.access_stubs,
            emit_enums: self.emit_enums,
        }
    }

    fn assembly_options(&self, naming: NamingPolicy) -> AssemblyOptions {
        AssemblyOptions {
            naming,
            emit_enums: self.emit_enums,
            access_stubs: self.access_stubs,
        }
    }
}

/// Read every table passing the filter and assemble the metadata model.
///
/// Fails only when the table list cannot be read; per-table read failures
/// end up in [`Assembly::failures`].
pub fn assemble(
    reader: &mut dyn SchemaReader,
    type_map: &TypeMap,
    options: &GenerateOptions,
    naming: NamingPolicy,
    control: &RunControl,
) -> Result<Assembly, GenerationError> {
    let tables = reader.list_tables(&options.filter).map_err(|e| {
        if e.is_fatal() {
            e
        } else {
            GenerationError::connection(e)
        }
    })?;
    info!("Found {} tables in schema '{}'", tables.len(), reader.schema_name());

    let mut assembler = MetadataAssembler::new(
        type_map,
        reader.dialect(),
        reader.schema_name(),
        options.assembly_options(naming),
        tables,
    );
    let names: Vec<String> = assembler.table_names().map(str::to_string).collect();

    let mut cancelled = false;
    for name in &names {
        if control.check().is_err() {
            warn!("Run stopped before reading '{}'", name);
            cancelled = true;
            break;
        }
        debug!("Reading table '{}'", name);
        match reader.read_table(name) {
            Ok(raw) => assembler.ingest(raw),
            Err(error) => assembler.fail(name, error),
        }
    }

    Ok(assembler.finalize(cancelled))
}

/// Per-table output sent from a worker to the aggregator
struct TableOutput {
    table: String,
    status: TableStatus,
    error: Option<GenerationError>,
    artifacts: Vec<ArtifactRecord>,
    diagnostics: Vec<Diagnostic>,
    modules: Vec<ModuleEntry>,
}

fn record(artifact: RenderedArtifact, path: PathBuf, status: ArtifactStatus) -> ArtifactRecord {
    ArtifactRecord {
        kind: artifact.kind,
        logical_name: artifact.logical_name,
        table: artifact.table,
        path,
        status,
        content: artifact.content,
    }
}

/// Write one rendered artifact, turning the outcome into a record
fn emit(
    artifact: RenderedArtifact,
    output_root: &Path,
    policy: ConflictPolicy,
) -> (ArtifactRecord, Option<GenerationError>) {
    match fs_utils::write_artifact(&artifact, output_root, policy) {
        Ok(WriteOutcome::Written(path)) => (record(artifact, path, ArtifactStatus::Written), None),
        Ok(WriteOutcome::Skipped(path)) => (record(artifact, path, ArtifactStatus::Skipped), None),
        Ok(WriteOutcome::Planned(path)) => (record(artifact, path, ArtifactStatus::Planned), None),
        Err(error) => {
            let path = output_root.join(&artifact.relative_path);
            (record(artifact, path, ArtifactStatus::Failed), Some(error))
        }
    }
}

fn process_table(
    table: &TableDescriptor,
    templates: &dyn TemplateSet,
    options: &GenerateOptions,
    control: &RunControl,
) -> TableOutput {
    let mut output = TableOutput {
        table: table.table_name.clone(),
        status: TableStatus::Generated,
        error: None,
        artifacts: Vec::new(),
        diagnostics: Vec::new(),
        modules: Vec::new(),
    };
    if let Err(error) = control.check() {
        output.status = TableStatus::Cancelled;
        output.error = Some(error);
        return output;
    }

    let mut produced = 0usize;
    let mut failed = 0usize;
    // Enums and stubs import the entity module, so they are only written
    // alongside it
    let mut entity_written = true;
    for rendered in emitter::render(table, templates, &options.render_options()) {
        let artifact = match rendered {
            Ok(artifact) if !entity_written => {
                let error = GenerationError::Template {
                    descriptor: table.table_name.clone(),
                    artifact: artifact.kind,
                    reason: format!("skipped because entity '{}' was not generated", table.type_name),
                };
                warn!("{}", error);
                output.diagnostics.push(Diagnostic::error(&error));
                failed += 1;
                continue;
            }
            Ok(artifact) => artifact,
            Err(error) => {
                if matches!(error, GenerationError::Template { artifact: ArtifactKind::Entity, .. }) {
                    entity_written = false;
                }
                warn!("{}", error);
                output.diagnostics.push(Diagnostic::error(&error));
                failed += 1;
                continue;
            }
        };
        if let Err(error) = control.check() {
            output.status = TableStatus::Cancelled;
            output.error = Some(error);
            return output;
        }

        let kind = artifact.kind;
        let module = artifact.module_entry(templates);
        let (record, error) = emit(artifact, &options.output_root, options.conflict_policy);
        match error {
            Some(error) => {
                if kind == ArtifactKind::Entity {
                    entity_written = false;
                }
                warn!("{}", error);
                output.diagnostics.push(Diagnostic::error(&error));
                failed += 1;
            }
            None => {
                produced += 1;
                output.modules.push(module);
            }
        }
        output.artifacts.push(record);
    }

    output.status = match (produced, failed) {
        (_, 0) => TableStatus::Generated,
        (0, _) => TableStatus::Failed,
        _ => TableStatus::Partial,
    };
    debug!("Table '{}': {} artifacts, {} failed", output.table, produced, failed);
    output
}

/// Render and write every table on a bounded pool of scoped threads
fn render_and_write(
    tables: &[TableDescriptor],
    templates: &dyn TemplateSet,
    options: &GenerateOptions,
    control: &RunControl,
) -> Vec<TableOutput> {
    if tables.is_empty() {
        return Vec::new();
    }
    let workers = options.workers.clamp(1, tables.len());
    let cursor = AtomicUsize::new(0);
    let (sender, receiver) = mpsc::channel::<TableOutput>();

    thread::scope(|scope| {
        for _ in 0..workers {
            let sender = sender.clone();
            let cursor = &cursor;
            scope.spawn(move || loop {
                let position = cursor.fetch_add(1, Ordering::SeqCst);
                let Some(table) = tables.get(position) else {
                    break;
                };
                if sender.send(process_table(table, templates, options, control)).is_err() {
                    break;
                }
            });
        }
        drop(sender);
        receiver.iter().collect()
    })
}

/// Run the whole pipeline.
///
/// Returns `Err` only for [`GenerationError::Connection`]; everything else
/// is recorded in the result's diagnostics and table outcomes.
///
/// # Example
/// ```
/// use schemagen::codegen::{ConflictPolicy, RustTemplates};
/// use schemagen::introspect::SnapshotSchemaReader;
/// use schemagen::metadata::TypeMap;
/// use schemagen::pipeline::{generate, GenerateOptions, RunStatus};
///
/// let mut reader = SnapshotSchemaReader::from_yaml(
///     "dialect: postgres\nschema: public\ntables:\n  - name: tag\n    primary_key: [id]\n    columns:\n      - { name: id, type: integer, nullable: false }\n",
/// )
/// .unwrap();
/// let options = GenerateOptions {
///     conflict_policy: ConflictPolicy::DryRun,
///     ..GenerateOptions::default()
/// };
/// let result = generate(&mut reader, &RustTemplates::new(), &TypeMap::builtin(), &options).unwrap();
/// assert_eq!(result.status, RunStatus::Success);
/// ```
pub fn generate(
    reader: &mut dyn SchemaReader,
    templates: &dyn TemplateSet,
    type_map: &TypeMap,
    options: &GenerateOptions,
) -> Result<GenerationResult, GenerationError> {
    let control = RunControl::new(options.cancel.clone(), options.timeout);
    let dialect = reader.dialect();
    let schema = reader.schema_name().to_string();
    let naming = options.naming.clone().unwrap_or_else(|| templates.naming());

    info!(
        "Generating {} code for {} schema '{}' into {}",
        templates.name(),
        dialect,
        schema,
        options.output_root.display()
    );
    let assembly = assemble(reader, type_map, options, naming, &control)?;
    info!(
        "Assembled {} tables ({} excluded)",
        assembly.tables.len(),
        assembly.failures.len()
    );

    let mut diagnostics = assembly.diagnostics;
    let mut tables: Vec<TableOutcome> = Vec::new();
    for (table, error) in assembly.failures {
        let status = if matches!(error, GenerationError::Cancelled { .. }) {
            TableStatus::Cancelled
        } else {
            diagnostics.push(Diagnostic::error(&error));
            TableStatus::Failed
        };
        tables.push(TableOutcome {
            table,
            status,
            error: Some(error),
        });
    }

    let mut artifacts = Vec::new();
    let mut modules = Vec::new();
    for output in render_and_write(&assembly.tables, templates, options, &control) {
        tables.push(TableOutcome {
            table: output.table,
            status: output.status,
            error: output.error,
        });
        artifacts.extend(output.artifacts);
        diagnostics.extend(output.diagnostics);
        modules.extend(output.modules);
    }

    if options.emit_index && !modules.is_empty() && control.check().is_ok() {
        match emitter::render_index(&modules, templates, &options.render_options()) {
            Some(Ok(index)) => {
                let (record, error) = emit(index, &options.output_root, options.conflict_policy);
                if let Some(error) = error {
                    warn!("{}", error);
                    diagnostics.push(Diagnostic::error(&error));
                }
                artifacts.push(record);
            }
            Some(Err(error)) => {
                warn!("{}", error);
                diagnostics.push(Diagnostic::error(&error));
            }
            None => {}
        }
    }

    tables.sort_by(|a, b| a.table.cmp(&b.table));
    artifacts.sort_by(|a, b| a.path.cmp(&b.path).then(a.kind.cmp(&b.kind)));
    diagnostics.sort_by(|a, b| {
        a.table
            .cmp(&b.table)
            .then(a.severity.cmp(&b.severity))
            .then(a.kind.cmp(&b.kind))
            .then(a.message.cmp(&b.message))
    });

    let has_errors = diagnostics.iter().any(Diagnostic::is_error);
    let produced = tables.iter().filter(|t| t.status.produced_output()).count();
    let status = RunStatus::evaluate(control.was_stopped(), has_errors, produced);

    for diagnostic in diagnostics.iter().filter(|d| !d.is_error()) {
        warn!("{}", diagnostic);
    }
    info!(
        "Run finished: {} ({} artifacts, {} diagnostics)",
        status,
        artifacts.len(),
        diagnostics.len()
    );

    Ok(GenerationResult {
        status,
        dialect,
        schema,
        output_root: options.output_root.clone(),
        conflict_policy: options.conflict_policy,
        tables,
        artifacts,
        diagnostics,
        model: assembly.tables,
    })
}
