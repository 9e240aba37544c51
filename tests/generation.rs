//! End-to-end generation runs over YAML schema snapshots.

use schemagen::codegen::{ArtifactKind, ConflictPolicy, ModuleEntry, RenderOptions, RustTemplates, TemplateSet};
use schemagen::introspect::{
    RawColumn, RawEnumColumn, RawForeignKey, RawIndex, SchemaReader, SnapshotSchemaReader, TableFilter,
};
use schemagen::metadata::{AssociationTarget, ColumnDescriptor, EnumDescriptor, NamingPolicy, SemanticType, TableDescriptor, TypeMap};
use schemagen::pipeline::{generate, ArtifactStatus, CancellationToken, GenerateOptions, GenerationResult, RunStatus, Severity, TableStatus};
use schemagen::{Dialect, GenerationError};
use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

const SHOP: &str = r#"
dialect: mysql
schema: shop
tables:
  - name: category
    primary_key: [id]
    columns:
      - { name: id, type: int, nullable: false, auto_increment: true }
      - { name: name, type: "varchar(255)", nullable: false, max_length: 255 }
      - { name: parent_id, type: int }
    foreign_keys:
      - { name: fk_category_parent, columns: [parent_id], referenced_table: category, referenced_columns: [id] }
  - name: product
    primary_key: [id]
    columns:
      - { name: id, type: int, nullable: false, auto_increment: true }
      - { name: name, type: "varchar(255)", nullable: false }
      - { name: price, type: "decimal(10,2)", nullable: false, precision: 10, scale: 2 }
      - { name: status, type: "enum('draft','active')", nullable: false, default: draft }
      - { name: category_id, type: int, nullable: false }
    foreign_keys:
      - { name: fk_product_category, columns: [category_id], referenced_table: category, referenced_columns: [id] }
"#;

const ORDERS: &str = r#"
dialect: postgres
schema: public
tables:
  - name: order_line
    primary_key: [order_id, line_no]
    columns:
      - { name: order_id, type: bigint, nullable: false }
      - { name: line_no, type: integer, nullable: false }
      - { name: sku, type: text, nullable: false }
  - name: shipment
    primary_key: [id]
    columns:
      - { name: id, type: bigint, nullable: false }
      - { name: order_id, type: bigint, nullable: false }
      - { name: line_no, type: integer, nullable: false }
    foreign_keys:
      - { name: fk_shipment_line, columns: [order_id, line_no], referenced_table: order_line, referenced_columns: [order_id, line_no] }
"#;

fn reader(yaml: &str) -> SnapshotSchemaReader {
    SnapshotSchemaReader::from_yaml(yaml).expect("Failed to parse snapshot")
}

fn dry_run() -> GenerateOptions {
    GenerateOptions {
        conflict_policy: ConflictPolicy::DryRun,
        output_root: "out".into(),
        ..GenerateOptions::default()
    }
}

fn run(reader: &mut dyn SchemaReader, options: &GenerateOptions) -> GenerationResult {
    generate(reader, &RustTemplates::new(), &TypeMap::builtin(), options).expect("Run failed before processing tables")
}

fn read_tree(root: &Path) -> Vec<(String, String)> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                pending.push(path);
            } else {
                let relative = path.strip_prefix(root).unwrap().display().to_string();
                files.push((relative, fs::read_to_string(&path).unwrap()));
            }
        }
    }
    files.sort();
    files
}

/// Delegates to an inner reader, listing tables in reverse and optionally
/// announcing a table that vanishes before it is read
struct ShuffledReader {
    inner: SnapshotSchemaReader,
    phantom: Option<&'static str>,
}

impl SchemaReader for ShuffledReader {
    fn dialect(&self) -> Dialect {
        self.inner.dialect()
    }

    fn schema_name(&self) -> &str {
        self.inner.schema_name()
    }

    fn list_tables(&mut self, filter: &TableFilter) -> Result<Vec<String>, GenerationError> {
        let mut tables = self.inner.list_tables(filter)?;
        if let Some(phantom) = self.phantom {
            tables.push(phantom.to_string());
        }
        tables.reverse();
        Ok(tables)
    }

    fn read_columns(&mut self, table: &str) -> Result<Vec<RawColumn>, GenerationError> {
        self.inner.read_columns(table)
    }

    fn read_foreign_keys(&mut self, table: &str) -> Result<Vec<RawForeignKey>, GenerationError> {
        self.inner.read_foreign_keys(table)
    }

    fn read_indexes(&mut self, table: &str) -> Result<Vec<RawIndex>, GenerationError> {
        self.inner.read_indexes(table)
    }

    fn read_enum_declarations(&mut self, table: &str) -> Result<Vec<RawEnumColumn>, GenerationError> {
        self.inner.read_enum_declarations(table)
    }
}

/// Rust templates whose repository rendering always fails
struct BrokenStubs(RustTemplates);

impl TemplateSet for BrokenStubs {
    fn name(&self) -> &str {
        "broken-stubs"
    }

    fn naming(&self) -> NamingPolicy {
        self.0.naming()
    }

    fn file_name(&self, kind: ArtifactKind, logical_name: &str) -> String {
        self.0.file_name(kind, logical_name)
    }

    fn entity(&self, table: &TableDescriptor, options: &RenderOptions) -> Result<String, String> {
        self.0.entity(table, options)
    }

    fn access_stub(&self, _table: &TableDescriptor, _options: &RenderOptions) -> Result<String, String> {
        Err("repository template unavailable".to_string())
    }

    fn enumeration(
        &self,
        table: &TableDescriptor,
        column: &ColumnDescriptor,
        enumeration: &EnumDescriptor,
        options: &RenderOptions,
    ) -> Result<String, String> {
        self.0.enumeration(table, column, enumeration, options)
    }

    fn index(&self, modules: &[ModuleEntry], options: &RenderOptions) -> Option<Result<String, String>> {
        self.0.index(modules, options)
    }
}

/// Rust templates that run a hook before rendering each entity; an `Err`
/// from the hook fails that entity
struct EntityHook<F>(RustTemplates, F);

impl<F> TemplateSet for EntityHook<F>
where
    F: Fn(&TableDescriptor) -> Result<(), String> + Send + Sync,
{
    fn name(&self) -> &str {
        "entity-hook"
    }

    fn naming(&self) -> NamingPolicy {
        self.0.naming()
    }

    fn file_name(&self, kind: ArtifactKind, logical_name: &str) -> String {
        self.0.file_name(kind, logical_name)
    }

    fn entity(&self, table: &TableDescriptor, options: &RenderOptions) -> Result<String, String> {
        (self.1)(table)?;
        self.0.entity(table, options)
    }

    fn access_stub(&self, table: &TableDescriptor, options: &RenderOptions) -> Result<String, String> {
        self.0.access_stub(table, options)
    }

    fn enumeration(
        &self,
        table: &TableDescriptor,
        column: &ColumnDescriptor,
        enumeration: &EnumDescriptor,
        options: &RenderOptions,
    ) -> Result<String, String> {
        self.0.enumeration(table, column, enumeration, options)
    }

    fn index(&self, modules: &[ModuleEntry], options: &RenderOptions) -> Option<Result<String, String>> {
        self.0.index(modules, options)
    }
}

fn written_to(dir: &TempDir) -> GenerateOptions {
    GenerateOptions {
        output_root: dir.path().to_path_buf(),
        conflict_policy: ConflictPolicy::ForceOverwrite,
        ..GenerateOptions::default()
    }
}

#[test]
fn test_category_product_scenario() {
    let result = run(&mut reader(SHOP), &dry_run());
    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(result.model.len(), 2);

    let category = result.descriptor("category").unwrap();
    assert_eq!(category.type_name, "Category");
    assert_eq!(category.associations.len(), 1);
    let parent = &category.associations[0];
    assert!(parent.is_self_reference);
    assert!(parent.optional);
    match &parent.target {
        AssociationTarget::Resolved { table, .. } => assert_eq!(*table, category.id),
        other => panic!("expected resolved target, got {:?}", other),
    }
    assert!(category.columns.iter().all(|c| c.field_name != parent.name));

    let product = result.descriptor("product").unwrap();
    let status = product.column("status").unwrap();
    assert_eq!(status.semantic_type, SemanticType::Enumerated);
    let enumeration = status.enumeration.as_ref().unwrap();
    let cases: Vec<&str> = enumeration.cases.iter().map(|c| c.case_name.as_str()).collect();
    assert_eq!(cases, vec!["DRAFT", "ACTIVE"]);
    assert_eq!(enumeration.raw_for("ACTIVE"), Some("active"));

    let price = product.column("price").unwrap();
    assert_eq!(price.semantic_type, SemanticType::Decimal);
    assert_eq!((price.precision, price.scale), (Some(10), Some(2)));

    assert_eq!(product.associations.len(), 1);
    assert_eq!(product.associations[0].name, "category");
    assert_eq!(product.associations[0].target.table_name(), "category");
    assert!(!product.associations[0].optional);

    // entity + repository per table, one enum, one index
    assert_eq!(result.artifacts.len(), 6);
    assert_eq!(result.count(ArtifactStatus::Planned), 6);
    let entity = result.artifact(ArtifactKind::Entity, "Product").unwrap();
    assert_eq!(entity.path, Path::new("out/models/product.rs"));
    assert!(entity.content.contains("pub struct Product {"));
    assert!(entity.content.contains("pub struct NewProduct {"));
    assert!(entity.content.contains("pub price: String,"));

    let status_enum = result.artifact(ArtifactKind::Enum, &enumeration.type_name).unwrap();
    assert!(status_enum.content.contains("DRAFT"));
    assert!(status_enum.content.contains("\"draft\""));

    let index = result.artifact(ArtifactKind::Index, "models").unwrap();
    assert_eq!(index.path, Path::new("out/models/mod.rs"));
    assert!(index.content.contains("pub mod product;"));
    assert!(index.content.contains("pub mod category_repository;"));
}

#[test]
fn test_force_overwrite_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let options = GenerateOptions {
        output_root: dir.path().to_path_buf(),
        conflict_policy: ConflictPolicy::ForceOverwrite,
        ..GenerateOptions::default()
    };

    let first = run(&mut reader(SHOP), &options);
    assert_eq!(first.count(ArtifactStatus::Written), 6);
    let before = read_tree(dir.path());

    let second = run(&mut reader(SHOP), &options);
    assert_eq!(second.count(ArtifactStatus::Written), 6);
    assert_eq!(read_tree(dir.path()), before);
    assert_eq!(first, second);
}

#[test]
fn test_fail_on_exists_skips_existing_files() {
    let dir = TempDir::new().unwrap();
    let options = GenerateOptions {
        output_root: dir.path().to_path_buf(),
        ..GenerateOptions::default()
    };
    run(&mut reader(SHOP), &options);

    let edited = dir.path().join("models/product.rs");
    fs::write(&edited, "// hand edited\n").unwrap();

    let second = run(&mut reader(SHOP), &options);
    assert_eq!(second.status, RunStatus::Success);
    assert_eq!(second.count(ArtifactStatus::Skipped), 6);
    assert_eq!(second.errors().count(), 0);
    assert_eq!(fs::read_to_string(edited).unwrap(), "// hand edited\n");
}

#[test]
fn test_dry_run_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let options = GenerateOptions {
        output_root: dir.path().join("gen"),
        conflict_policy: ConflictPolicy::DryRun,
        ..GenerateOptions::default()
    };
    let result = run(&mut reader(SHOP), &options);
    assert_eq!(result.count(ArtifactStatus::Planned), result.artifacts.len());
    assert!(!dir.path().join("gen").exists());
}

#[test]
fn test_reversed_table_order_gives_identical_result() {
    let forward = run(&mut reader(SHOP), &dry_run());
    let mut shuffled = ShuffledReader {
        inner: reader(SHOP),
        phantom: None,
    };
    let reversed = run(&mut shuffled, &dry_run());
    assert_eq!(forward, reversed);
}

#[test]
fn test_worker_count_does_not_change_result() {
    let single = run(&mut reader(SHOP), &dry_run());
    let options = GenerateOptions {
        workers: 4,
        ..dry_run()
    };
    assert_eq!(run(&mut reader(SHOP), &options), single);
}

#[test]
fn test_composite_key_association() {
    let result = run(&mut reader(ORDERS), &dry_run());
    assert_eq!(result.status, RunStatus::Success);

    let shipment = result.descriptor("shipment").unwrap();
    assert_eq!(shipment.associations.len(), 1);
    let association = &shipment.associations[0];
    assert!(association.is_composite);
    assert_eq!(association.column_pairs.len(), 2);
    assert_eq!(association.column_pairs[0].source, "order_id");
    assert_eq!(association.column_pairs[1].target, "line_no");
    assert_eq!(association.name, "order_line");

    let order_line = result.descriptor("order_line").unwrap();
    assert_eq!(order_line.primary_key, vec!["order_id", "line_no"]);
}

#[test]
fn test_partial_key_reference_fails_owner() {
    let yaml = r#"
dialect: postgres
schema: public
tables:
  - name: order_line
    primary_key: [order_id, line_no]
    columns:
      - { name: order_id, type: bigint, nullable: false }
      - { name: line_no, type: integer, nullable: false }
  - name: shipment
    primary_key: [id]
    columns:
      - { name: id, type: bigint, nullable: false }
      - { name: order_id, type: bigint, nullable: false }
    foreign_keys:
      - { name: fk_shipment_order, columns: [order_id], referenced_table: order_line, referenced_columns: [order_id] }
"#;
    let result = run(&mut reader(yaml), &dry_run());
    assert_eq!(result.status, RunStatus::PartialFailure);
    assert_eq!(result.status.exit_code(), 2);

    assert_eq!(result.table("shipment").unwrap().status, TableStatus::Failed);
    assert!(result.descriptor("shipment").is_none());
    assert!(result.artifact(ArtifactKind::Entity, "Shipment").is_none());

    assert_eq!(result.table("order_line").unwrap().status, TableStatus::Generated);
    assert!(result.artifact(ArtifactKind::Entity, "OrderLine").is_some());

    let error = result.errors().find(|d| d.kind == "partial_key_error").unwrap();
    assert_eq!(error.table.as_deref(), Some("shipment"));
}

#[test]
fn test_excluded_target_is_unresolved() {
    let options = GenerateOptions {
        filter: TableFilter::new(&["*"], &["category"]).unwrap(),
        ..dry_run()
    };
    let result = run(&mut reader(SHOP), &options);
    assert_eq!(result.status, RunStatus::Success);
    assert!(result.descriptor("category").is_none());

    let product = result.descriptor("product").unwrap();
    assert_eq!(
        product.associations[0].target,
        AssociationTarget::Unresolved {
            table_name: "category".to_string()
        }
    );
    let warning = result.warnings().find(|d| d.kind == "unresolved_association").unwrap();
    assert_eq!(warning.table.as_deref(), Some("product"));
    assert_eq!(warning.severity, Severity::Warning);
}

#[test]
fn test_vanished_table_fails_alone() {
    let mut shuffled = ShuffledReader {
        inner: reader(SHOP),
        phantom: Some("ghost"),
    };
    let result = run(&mut shuffled, &dry_run());
    assert_eq!(result.status, RunStatus::PartialFailure);
    assert_eq!(result.status.exit_code(), 2);

    assert_eq!(result.table("ghost").unwrap().status, TableStatus::Failed);
    assert_eq!(result.table("category").unwrap().status, TableStatus::Generated);
    assert_eq!(result.table("product").unwrap().status, TableStatus::Generated);

    let error = result.errors().next().unwrap();
    assert_eq!(error.kind, "schema_read_error");
    assert_eq!(error.table.as_deref(), Some("ghost"));
}

#[test]
fn test_template_error_is_per_artifact() {
    let result = generate(&mut reader(SHOP), &BrokenStubs(RustTemplates::new()), &TypeMap::builtin(), &dry_run()).unwrap();
    assert_eq!(result.status, RunStatus::PartialFailure);
    assert_eq!(result.errors().count(), 2);
    assert!(result.errors().all(|d| d.kind == "template_error"));

    assert_eq!(result.table("product").unwrap().status, TableStatus::Partial);
    assert!(result.artifact(ArtifactKind::Entity, "Product").is_some());
    assert!(result.artifact(ArtifactKind::AccessStub, "ProductRepository").is_none());

    // The index only lists modules that were produced
    let index = result.artifact(ArtifactKind::Index, "models").unwrap();
    assert!(!index.content.contains("product_repository"));
}

#[test]
fn test_failed_entity_drops_dependent_artifacts() {
    let templates = EntityHook(RustTemplates::new(), |table: &TableDescriptor| {
        if table.table_name == "product" {
            Err("entity template unavailable".to_string())
        } else {
            Ok(())
        }
    });
    let result = generate(&mut reader(SHOP), &templates, &TypeMap::builtin(), &dry_run()).unwrap();
    assert_eq!(result.status, RunStatus::PartialFailure);

    assert_eq!(result.table("category").unwrap().status, TableStatus::Generated);
    assert_eq!(result.table("product").unwrap().status, TableStatus::Failed);
    assert!(result.artifacts.iter().all(|a| a.table.as_deref() != Some("product")));

    // The entity failure plus the enum and repository that depend on it
    assert_eq!(result.errors().count(), 3);
    assert!(result.errors().all(|d| d.kind == "template_error" && d.table.as_deref() == Some("product")));

    let index = result.artifact(ArtifactKind::Index, "models").unwrap();
    assert!(index.content.contains("pub mod category;"));
    assert!(!index.content.contains("product"));
}

#[test]
fn test_enum_collision_excludes_table() {
    let yaml = r#"
dialect: mysql
tables:
  - name: flag
    primary_key: [id]
    columns:
      - { name: id, type: int, nullable: false }
      - { name: mode, type: "enum('read-only','read_only')" }
  - name: tag
    primary_key: [id]
    columns:
      - { name: id, type: int, nullable: false }
"#;
    let result = run(&mut reader(yaml), &dry_run());
    assert_eq!(result.status, RunStatus::PartialFailure);
    assert_eq!(result.table("flag").unwrap().status, TableStatus::Failed);
    assert!(result.descriptor("flag").is_none());
    assert!(result.descriptor("tag").is_some());
    assert!(result.errors().any(|d| d.kind == "enum_collision_error"));
}

#[test]
fn test_disabled_stubs_enums_and_index() {
    let options = GenerateOptions {
        access_stubs: false,
        emit_enums: false,
        emit_index: false,
        ..dry_run()
    };
    let result = run(&mut reader(SHOP), &options);
    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(result.artifacts.len(), 2);
    assert!(result.artifacts.iter().all(|a| a.kind == ArtifactKind::Entity));

    let status = result.descriptor("product").unwrap().column("status").unwrap();
    assert_eq!(status.semantic_type, SemanticType::Text);
    assert!(status.enumeration.is_none());
}

#[test]
fn test_cancelled_before_start() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let options = GenerateOptions {
        cancel,
        ..dry_run()
    };
    let result = run(&mut reader(SHOP), &options);
    assert_eq!(result.status, RunStatus::Cancelled);
    assert_eq!(result.status.exit_code(), 130);
    assert!(result.artifacts.is_empty());
    assert!(result.tables.iter().all(|t| t.status == TableStatus::Cancelled));
}

#[test]
fn test_cancelled_mid_run_keeps_written_tables() {
    let dir = TempDir::new().unwrap();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let templates = EntityHook(RustTemplates::new(), move |table: &TableDescriptor| {
        if table.table_name == "product" {
            trigger.cancel();
        }
        Ok(())
    });
    let options = GenerateOptions {
        cancel,
        ..written_to(&dir)
    };

    let result = generate(&mut reader(SHOP), &templates, &TypeMap::builtin(), &options).unwrap();
    assert_eq!(result.status, RunStatus::Cancelled);
    assert_eq!(result.status.exit_code(), 130);

    assert_eq!(result.table("category").unwrap().status, TableStatus::Generated);
    assert_eq!(result.table("product").unwrap().status, TableStatus::Cancelled);
    let category = result.artifact(ArtifactKind::Entity, "Category").unwrap();
    assert_eq!(category.status, ArtifactStatus::Written);
    assert!(dir.path().join("models/category.rs").exists());
    assert!(dir.path().join("models/category_repository.rs").exists());

    assert!(result.artifacts.iter().all(|a| a.table.as_deref() == Some("category")));
    assert!(!dir.path().join("models/product.rs").exists());
    assert!(!dir.path().join("models/mod.rs").exists());
}

#[test]
fn test_deadline_passed_mid_run() {
    let dir = TempDir::new().unwrap();
    let templates = EntityHook(RustTemplates::new(), |table: &TableDescriptor| {
        if table.table_name == "product" {
            thread::sleep(Duration::from_millis(1500));
        }
        Ok(())
    });
    let options = GenerateOptions {
        timeout: Some(Duration::from_millis(750)),
        ..written_to(&dir)
    };

    let result = generate(&mut reader(SHOP), &templates, &TypeMap::builtin(), &options).unwrap();
    assert_eq!(result.status, RunStatus::Cancelled);
    assert_eq!(result.table("category").unwrap().status, TableStatus::Generated);
    assert_eq!(result.table("product").unwrap().status, TableStatus::Cancelled);
    assert!(dir.path().join("models/category.rs").exists());
    assert!(!dir.path().join("models/product.rs").exists());
}

#[test]
fn test_zero_timeout_cancels_everything() {
    let options = GenerateOptions {
        timeout: Some(Duration::ZERO),
        ..dry_run()
    };
    let result = run(&mut reader(SHOP), &options);
    assert_eq!(result.status, RunStatus::Cancelled);
    assert_eq!(result.status.exit_code(), 130);
    assert!(result.artifacts.is_empty());
    assert!(result.tables.iter().all(|t| t.status == TableStatus::Cancelled));
}

#[test]
fn test_unreachable_database_is_fatal() {
    struct Offline;

    impl SchemaReader for Offline {
        fn dialect(&self) -> Dialect {
            Dialect::Postgres
        }

        fn schema_name(&self) -> &str {
            "public"
        }

        fn list_tables(&mut self, _filter: &TableFilter) -> Result<Vec<String>, GenerationError> {
            Err(GenerationError::connection("connection refused"))
        }

        fn read_columns(&mut self, table: &str) -> Result<Vec<RawColumn>, GenerationError> {
            Err(GenerationError::schema_read(table, "offline"))
        }

        fn read_foreign_keys(&mut self, table: &str) -> Result<Vec<RawForeignKey>, GenerationError> {
            Err(GenerationError::schema_read(table, "offline"))
        }

        fn read_indexes(&mut self, table: &str) -> Result<Vec<RawIndex>, GenerationError> {
            Err(GenerationError::schema_read(table, "offline"))
        }

        fn read_enum_declarations(&mut self, table: &str) -> Result<Vec<RawEnumColumn>, GenerationError> {
            Err(GenerationError::schema_read(table, "offline"))
        }
    }

    let err = generate(&mut Offline, &RustTemplates::new(), &TypeMap::builtin(), &dry_run()).unwrap_err();
    assert!(matches!(err, GenerationError::Connection { .. }));
}

#[test]
fn test_report_serializes() {
    let result = run(&mut reader(SHOP), &dry_run());
    let json: serde_json::Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();
    assert_eq!(json["status"], "success");
    assert_eq!(json["dialect"], "mysql");
    assert_eq!(json["artifacts"].as_array().unwrap().len(), 6);
}
