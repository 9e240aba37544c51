//! Built-in template set emitting serde-derived Rust.
//!
//! Per table:
//! - `<entity>.rs`: the row struct plus a `New<Entity>` insert struct that
//!   leaves out auto-increment columns
//! - `<entity>_repository.rs`: a repository trait with key lookups, insert,
//!   update, delete and one loader per resolved association
//! - `<table>_<column>.rs`: one enum per enumerated column
//!
//! plus a `mod.rs` declaring and re-exporting every module.

use super::templates::{ArtifactKind, ModuleEntry, RenderOptions, TemplateSet};
use super::utils::{escape_rust_keyword, escape_rust_string, is_emittable_ident, to_snake_case, NON_RAW_KEYWORDS};
use crate::metadata::{
    AssociationTarget, ColumnDescriptor, DefaultValue, EnumDescriptor, IdentCase, NamingPolicy, SemanticType,
    TableDescriptor,
};
use std::collections::{BTreeSet, HashSet};
use std::fmt::Write;

const GENERATED_NOTE: &str = "Generated by schemagen; edits are overwritten on regeneration.";

/// Names that would shadow prelude types used by the generated code
const PRELUDE_TYPES: &[&str] = &["Self", "Option", "Result", "String", "Vec", "Box", "Some", "None", "Ok", "Err"];

/// serde-derived Rust structs, repository traits and enums
#[derive(Debug, Clone)]
pub struct RustTemplates {
    naming: NamingPolicy,
}

impl Default for RustTemplates {
    fn default() -> Self {
        RustTemplates {
            naming: NamingPolicy {
                type_case: IdentCase::UpperCamel,
                field_case: IdentCase::Snake,
                enum_case: IdentCase::ScreamingSnake,
                instance_identifier: "self".to_string(),
                reserved_fields: NON_RAW_KEYWORDS.iter().map(|k| k.to_string()).collect(),
                reserved_types: PRELUDE_TYPES.iter().map(|k| k.to_string()).collect(),
            },
        }
    }
}

impl RustTemplates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different naming policy; identifiers that Rust cannot express
    /// then surface as template errors
    pub fn with_naming(naming: NamingPolicy) -> Self {
        RustTemplates { naming }
    }
}

/// snake_case module name for a generated type, usable as a file stem
pub fn module_stem(type_name: &str) -> String {
    let mut stem = to_snake_case(type_name);
    if !stem.starts_with(|c: char| c.is_ascii_alphabetic()) {
        stem.insert(0, '_');
    }
    if NON_RAW_KEYWORDS.contains(&stem.as_str()) {
        stem.push('_');
    }
    stem
}

/// Module name as written in Rust source
fn module_path(type_name: &str) -> String {
    escape_rust_keyword(&module_stem(type_name))
}

fn semantic_rust_type(semantic: &SemanticType, enumeration: Option<&EnumDescriptor>) -> String {
    match semantic {
        SemanticType::SmallInt => "i16".to_string(),
        SemanticType::Integer => "i32".to_string(),
        SemanticType::BigInt => "i64".to_string(),
        SemanticType::Float => "f32".to_string(),
        SemanticType::Double => "f64".to_string(),
        SemanticType::Boolean => "bool".to_string(),
        SemanticType::Date => "chrono::NaiveDate".to_string(),
        SemanticType::Time => "chrono::NaiveTime".to_string(),
        SemanticType::Timestamp => "chrono::NaiveDateTime".to_string(),
        SemanticType::TimestampTz => "chrono::DateTime<chrono::Utc>".to_string(),
        SemanticType::Uuid => "uuid::Uuid".to_string(),
        SemanticType::Binary => "Vec<u8>".to_string(),
        SemanticType::Json => "serde_json::Value".to_string(),
        SemanticType::Array(element) => format!("Vec<{}>", semantic_rust_type(element, None)),
        SemanticType::Enumerated => match enumeration {
            Some(e) => e.type_name.clone(),
            None => "String".to_string(),
        },
        // Decimals, intervals and unknown types are carried as text
        SemanticType::Decimal | SemanticType::Interval | SemanticType::Text | SemanticType::Opaque => {
            "String".to_string()
        }
    }
}

fn field_type(column: &ColumnDescriptor) -> String {
    let base = semantic_rust_type(&column.semantic_type, column.enumeration.as_ref());
    if column.nullable {
        format!("Option<{}>", base)
    } else {
        base
    }
}

/// Parameter type for key lookups: borrowed for owned heap types
fn param_type(column: &ColumnDescriptor) -> String {
    let base = semantic_rust_type(&column.semantic_type, column.enumeration.as_ref());
    match base.as_str() {
        "String" => "&str".to_string(),
        "Vec<u8>" => "&[u8]".to_string(),
        "serde_json::Value" => "&serde_json::Value".to_string(),
        other if other.starts_with("Vec<") => format!("&[{}]", &other[4..other.len() - 1]),
        _ => base,
    }
}

fn column_doc(column: &ColumnDescriptor) -> String {
    let mut doc = format!("`{}` `{}`", column.name, column.native_type);
    if column.is_primary {
        doc.push_str(", primary key");
    }
    if column.auto_increment {
        doc.push_str(", auto-increment");
    }
    if let Some(default) = &column.default {
        let shown = match (default, column.enumeration.as_ref()) {
            (DefaultValue::Text(raw), Some(e)) => e.case_for(raw).unwrap_or(raw).to_string(),
            _ => default.to_string(),
        };
        let _ = write!(doc, ", default `{}`", shown);
    }
    doc
}

fn check_ident(ident: &str, what: &str) -> Result<(), String> {
    if is_emittable_ident(ident) {
        Ok(())
    } else {
        Err(format!("{} `{}` is not a valid Rust identifier", what, ident))
    }
}

fn check_table(table: &TableDescriptor) -> Result<(), String> {
    check_ident(&table.type_name, "type name")?;
    for column in &table.columns {
        check_ident(&column.field_name, "field name")?;
    }
    Ok(())
}

fn write_header(out: &mut String, title: &str) -> std::fmt::Result {
    writeln!(out, "//! {}", title)?;
    writeln!(out, "//!")?;
    writeln!(out, "//! {}", GENERATED_NOTE)?;
    writeln!(out)
}

fn write_fields<'c>(out: &mut String, columns: impl Iterator<Item = &'c ColumnDescriptor>) -> std::fmt::Result {
    for column in columns {
        writeln!(out, "    /// {}", column_doc(column))?;
        if column.field_name != column.name {
            writeln!(out, "    #[serde(rename = \"{}\")]", escape_rust_string(&column.name))?;
        }
        writeln!(
            out,
            "    pub {}: {},",
            escape_rust_keyword(&column.field_name),
            field_type(column)
        )?;
    }
    Ok(())
}

fn write_entity(out: &mut String, table: &TableDescriptor) -> std::fmt::Result {
    write_header(out, &format!("Entity for table `{}`.", table.table_name))?;
    writeln!(out, "use serde::{{Deserialize, Serialize}};")?;

    let enum_imports: BTreeSet<&str> = table.enums().map(|(_, e)| e.type_name.as_str()).collect();
    if !enum_imports.is_empty() {
        writeln!(out)?;
        for type_name in &enum_imports {
            writeln!(out, "use super::{}::{};", module_path(type_name), type_name)?;
        }
    }
    writeln!(out)?;

    writeln!(out, "/// Row of `{}`.", table.table_name)?;
    if !table.associations.is_empty() {
        writeln!(out, "///")?;
        writeln!(out, "/// Associations:")?;
        for association in &table.associations {
            let sources: Vec<&str> = association.source_columns().collect();
            match &association.target {
                AssociationTarget::Resolved { table_name, type_name, .. } => {
                    let targets: Vec<&str> = association.column_pairs.iter().map(|p| p.target.as_str()).collect();
                    writeln!(
                        out,
                        "/// - `{}`: ({}) → `{}` ({}), on delete {}",
                        association.name,
                        sources.join(", "),
                        type_name,
                        targets
                            .iter()
                            .map(|t| format!("{}.{}", table_name, t))
                            .collect::<Vec<_>>()
                            .join(", "),
                        association.on_delete
                    )?;
                }
                AssociationTarget::Unresolved { table_name } => {
                    writeln!(
                        out,
                        "/// - `{}`: ({}) → `{}`, not generated in this run",
                        association.name,
                        sources.join(", "),
                        table_name
                    )?;
                }
            }
        }
    }
    writeln!(out, "#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]")?;
    writeln!(out, "pub struct {} {{", table.type_name)?;
    write_fields(out, table.columns.iter())?;
    writeln!(out, "}}")?;
    writeln!(out)?;

    writeln!(out, "impl {} {{", table.type_name)?;
    writeln!(
        out,
        "    pub const TABLE: &'static str = \"{}\";",
        escape_rust_string(&table.table_name)
    )?;
    writeln!(out, "}}")?;
    writeln!(out)?;

    writeln!(
        out,
        "/// Insertable row of `{}`; auto-increment columns are assigned by the database.",
        table.table_name
    )?;
    writeln!(out, "#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]")?;
    writeln!(out, "pub struct New{} {{", table.type_name)?;
    write_fields(out, table.columns.iter().filter(|c| !c.auto_increment))?;
    writeln!(out, "}}")
}

fn write_enum(
    out: &mut String,
    table: &TableDescriptor,
    column: &ColumnDescriptor,
    enumeration: &EnumDescriptor,
) -> std::fmt::Result {
    let name = &enumeration.type_name;
    write_header(
        out,
        &format!("Values of `{}.{}`.", table.table_name, column.name),
    )?;
    writeln!(out, "use serde::{{Deserialize, Serialize}};")?;
    writeln!(out, "use std::fmt;")?;
    writeln!(out, "use std::str::FromStr;")?;
    writeln!(out)?;

    writeln!(out, "#[allow(non_camel_case_types)]")?;
    writeln!(out, "#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]")?;
    writeln!(out, "pub enum {} {{", name)?;
    for case in &enumeration.cases {
        writeln!(out, "    #[serde(rename = \"{}\")]", escape_rust_string(&case.raw_value))?;
        writeln!(out, "    {},", case.case_name)?;
    }
    writeln!(out, "}}")?;
    writeln!(out)?;

    writeln!(out, "impl {} {{", name)?;
    writeln!(
        out,
        "    pub const ALL: [{}; {}] = [",
        name,
        enumeration.cases.len()
    )?;
    for case in &enumeration.cases {
        writeln!(out, "        {}::{},", name, case.case_name)?;
    }
    writeln!(out, "    ];")?;
    writeln!(out)?;
    writeln!(out, "    /// Value as stored in the database")?;
    writeln!(out, "    pub fn as_str(&self) -> &'static str {{")?;
    writeln!(out, "        match self {{")?;
    for case in &enumeration.cases {
        writeln!(
            out,
            "            {}::{} => \"{}\",",
            name,
            case.case_name,
            escape_rust_string(&case.raw_value)
        )?;
    }
    writeln!(out, "        }}")?;
    writeln!(out, "    }}")?;
    writeln!(out, "}}")?;
    writeln!(out)?;

    if let Some(DefaultValue::Text(raw)) = &column.default {
        if let Some(case_name) = enumeration.case_for(raw) {
            writeln!(out, "impl Default for {} {{", name)?;
            writeln!(out, "    fn default() -> Self {{")?;
            writeln!(out, "        {}::{}", name, case_name)?;
            writeln!(out, "    }}")?;
            writeln!(out, "}}")?;
            writeln!(out)?;
        }
    }

    writeln!(out, "impl fmt::Display for {} {{", name)?;
    writeln!(out, "    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {{")?;
    writeln!(out, "        f.write_str(self.as_str())")?;
    writeln!(out, "    }}")?;
    writeln!(out, "}}")?;
    writeln!(out)?;

    writeln!(out, "impl FromStr for {} {{", name)?;
    writeln!(out, "    type Err = String;")?;
    writeln!(out)?;
    writeln!(out, "    fn from_str(s: &str) -> Result<Self, Self::Err> {{")?;
    writeln!(out, "        match s {{")?;
    for case in &enumeration.cases {
        writeln!(
            out,
            "            \"{}\" => Ok({}::{}),",
            escape_rust_string(&case.raw_value),
            name,
            case.case_name
        )?;
    }
    writeln!(
        out,
        "            other => Err(format!(\"unknown {} value: {{}}\", other)),",
        name
    )?;
    writeln!(out, "        }}")?;
    writeln!(out, "    }}")?;
    writeln!(out, "}}")
}

fn key_params(table: &TableDescriptor, key: &[String]) -> Option<(String, String)> {
    let mut fields = Vec::with_capacity(key.len());
    let mut params = Vec::with_capacity(key.len());
    for name in key {
        let column = table.column(name)?;
        fields.push(column.field_name.clone());
        params.push(format!("{}: {}", escape_rust_keyword(&column.field_name), param_type(column)));
    }
    Some((fields.join("_and_"), params.join(", ")))
}

fn write_access_stub(out: &mut String, table: &TableDescriptor, stub: &str) -> std::fmt::Result {
    let entity = &table.type_name;
    write_header(
        out,
        &format!("Access stub for `{}` (table `{}`).", entity, table.table_name),
    )?;

    let entity_module = module_path(entity);
    let mut imports: BTreeSet<String> = BTreeSet::new();
    imports.insert(format!("use super::{}::{{New{}, {}}};", entity_module, entity, entity));
    for association in &table.associations {
        if let AssociationTarget::Resolved { type_name, .. } = &association.target {
            if type_name != entity {
                imports.insert(format!("use super::{}::{};", module_path(type_name), type_name));
            }
        }
    }
    for import in &imports {
        writeln!(out, "{}", import)?;
    }
    writeln!(out)?;

    writeln!(
        out,
        "/// Persistence operations on `{}`; implement for a concrete store.",
        table.table_name
    )?;
    writeln!(out, "pub trait {} {{", stub)?;
    writeln!(out, "    type Error;")?;

    let mut methods: HashSet<String> = HashSet::new();
    let primary = if table.primary_key.is_empty() {
        None
    } else {
        key_params(table, &table.primary_key)
    };

    if let Some((fields, params)) = &primary {
        let method = format!("find_by_{}", fields);
        methods.insert(method.clone());
        writeln!(out)?;
        writeln!(out, "    /// Fetch one row by primary key")?;
        writeln!(
            out,
            "    fn {}(&mut self, {}) -> Result<Option<{}>, Self::Error>;",
            method, params, entity
        )?;
    }

    for key in &table.unique_keys {
        let Some((fields, params)) = key_params(table, key) else {
            continue;
        };
        let method = format!("find_by_{}", fields);
        if !methods.insert(method.clone()) {
            continue;
        }
        writeln!(out)?;
        writeln!(out, "    /// Fetch one row by unique key ({})", key.join(", "))?;
        writeln!(
            out,
            "    fn {}(&mut self, {}) -> Result<Option<{}>, Self::Error>;",
            method, params, entity
        )?;
    }

    writeln!(out)?;
    writeln!(out, "    fn list(&mut self) -> Result<Vec<{}>, Self::Error>;", entity)?;
    writeln!(out)?;
    writeln!(out, "    /// Insert a row and return it with generated columns filled in")?;
    writeln!(
        out,
        "    fn insert(&mut self, row: New{}) -> Result<{}, Self::Error>;",
        entity, entity
    )?;

    if let Some((_, params)) = &primary {
        writeln!(out)?;
        writeln!(out, "    /// Returns false when no row matched the primary key")?;
        writeln!(out, "    fn update(&mut self, row: &{}) -> Result<bool, Self::Error>;", entity)?;
        writeln!(out)?;
        writeln!(out, "    fn delete(&mut self, {}) -> Result<bool, Self::Error>;", params)?;
    }

    for association in &table.associations {
        let sources: Vec<&str> = association.source_columns().collect();
        match &association.target {
            AssociationTarget::Resolved { table_name, type_name, .. } => {
                let method = format!("load_{}", association.name);
                if !methods.insert(method.clone()) {
                    continue;
                }
                let returned = if association.optional {
                    format!("Option<{}>", type_name)
                } else {
                    type_name.clone()
                };
                writeln!(out)?;
                writeln!(
                    out,
                    "    /// Load `{}` through ({}) → `{}`",
                    association.name,
                    sources.join(", "),
                    table_name
                )?;
                writeln!(
                    out,
                    "    fn {}(&mut self, row: &{}) -> Result<{}, Self::Error>;",
                    method, entity, returned
                )?;
            }
            AssociationTarget::Unresolved { table_name } => {
                writeln!(out)?;
                writeln!(
                    out,
                    "    // `{}` ({}) references `{}`, which is not generated",
                    association.name,
                    sources.join(", "),
                    table_name
                )?;
            }
        }
    }
    writeln!(out, "}}")
}

fn write_index(out: &mut String, modules: &[ModuleEntry], namespace: &str) -> std::fmt::Result {
    write_header(out, &format!("Generated modules for `{}`.", namespace))?;
    for entry in modules {
        writeln!(out, "pub mod {};", escape_rust_keyword(&entry.module))?;
    }
    writeln!(out)?;
    for entry in modules {
        writeln!(
            out,
            "pub use {}::{};",
            escape_rust_keyword(&entry.module),
            entry.logical_name
        )?;
    }
    Ok(())
}

impl TemplateSet for RustTemplates {
    fn name(&self) -> &str {
        "rust"
    }

    fn naming(&self) -> NamingPolicy {
        self.naming.clone()
    }

    fn file_name(&self, kind: ArtifactKind, logical_name: &str) -> String {
        match kind {
            ArtifactKind::Index => "mod.rs".to_string(),
            _ => format!("{}.rs", module_stem(logical_name)),
        }
    }

    fn entity(&self, table: &TableDescriptor, _options: &RenderOptions) -> Result<String, String> {
        check_table(table)?;
        let mut out = String::new();
        write_entity(&mut out, table).map_err(|e| e.to_string())?;
        Ok(out)
    }

    fn access_stub(&self, table: &TableDescriptor, _options: &RenderOptions) -> Result<String, String> {
        check_table(table)?;
        let stub = table
            .access_stub_name
            .as_deref()
            .ok_or_else(|| format!("table `{}` has no access stub name", table.table_name))?;
        check_ident(stub, "stub name")?;
        for association in &table.associations {
            check_ident(&association.name, "association name")?;
        }
        let mut out = String::new();
        write_access_stub(&mut out, table, stub).map_err(|e| e.to_string())?;
        Ok(out)
    }

    fn enumeration(
        &self,
        table: &TableDescriptor,
        column: &ColumnDescriptor,
        enumeration: &EnumDescriptor,
        _options: &RenderOptions,
    ) -> Result<String, String> {
        check_ident(&enumeration.type_name, "enum name")?;
        if enumeration.cases.is_empty() {
            return Err(format!("enum `{}` has no cases", enumeration.type_name));
        }
        let mut out = String::new();
        write_enum(&mut out, table, column, enumeration).map_err(|e| e.to_string())?;
        Ok(out)
    }

    fn index(&self, modules: &[ModuleEntry], options: &RenderOptions) -> Option<Result<String, String>> {
        let mut out = String::new();
        Some(
            write_index(&mut out, modules, &options.namespace)
                .map(|_| out)
                .map_err(|e| e.to_string()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::introspect::ReferentialAction;
    use crate::metadata::{AssociationDescriptor, ColumnPair, EnumCase, TableId};

    fn column(name: &str, field: &str, semantic: SemanticType) -> ColumnDescriptor {
        ColumnDescriptor {
            name: name.to_string(),
            field_name: field.to_string(),
            native_type: "integer".to_string(),
            semantic_type: semantic,
            nullable: false,
            is_primary: false,
            auto_increment: false,
            default: None,
            max_length: None,
            precision: None,
            scale: None,
            enumeration: None,
        }
    }

    fn product() -> TableDescriptor {
        let mut id = column("id", "id", SemanticType::BigInt);
        id.is_primary = true;
        id.auto_increment = true;
        let mut sku = column("SKU", "sku", SemanticType::Text);
        sku.native_type = "varchar(32)".to_string();
        let mut kind = column("type", "type", SemanticType::Text);
        kind.nullable = true;
        let mut status = column("status", "status", SemanticType::Enumerated);
        status.default = Some(DefaultValue::Text("draft".to_string()));
        status.enumeration = Some(EnumDescriptor {
            type_name: "ProductStatus".to_string(),
            source_name: "product_status".to_string(),
            cases: vec![
                EnumCase {
                    raw_value: "draft".to_string(),
                    case_name: "DRAFT".to_string(),
                },
                EnumCase {
                    raw_value: "active".to_string(),
                    case_name: "ACTIVE".to_string(),
                },
            ],
        });
        let mut category_id = column("category_id", "category_id", SemanticType::BigInt);
        category_id.nullable = true;

        TableDescriptor {
            id: TableId(1),
            schema: "shop".to_string(),
            table_name: "product".to_string(),
            type_name: "Product".to_string(),
            columns: vec![id, sku, kind, status, category_id],
            associations: vec![AssociationDescriptor {
                name: "category".to_string(),
                constraint: "fk_product_category".to_string(),
                column_pairs: vec![ColumnPair {
                    source: "category_id".to_string(),
                    target: "id".to_string(),
                }],
                target: AssociationTarget::Resolved {
                    table: TableId(0),
                    table_name: "category".to_string(),
                    type_name: "Category".to_string(),
                },
                on_delete: ReferentialAction::SetNull,
                on_update: ReferentialAction::NoAction,
                is_composite: false,
                is_self_reference: false,
                optional: true,
            }],
            primary_key: vec!["id".to_string()],
            unique_keys: vec![vec!["SKU".to_string()]],
            access_stub_name: Some("ProductRepository".to_string()),
        }
    }

    #[test]
    fn test_module_stems() {
        assert_eq!(module_stem("ProductStatus"), "product_status");
        assert_eq!(module_stem("_2faToken"), "_2fa_token");
        assert_eq!(module_stem("Crate"), "crate_");
        assert_eq!(module_path("Type"), "r#type");
    }

    #[test]
    fn test_entity_struct() {
        let code = RustTemplates::new().entity(&product(), &RenderOptions::default()).unwrap();
        assert!(code.contains("pub struct Product {"));
        assert!(code.contains("    pub id: i64,"));
        assert!(code.contains("    #[serde(rename = \"SKU\")]\n    pub sku: String,"));
        assert!(code.contains("    pub r#type: Option<String>,"));
        assert!(code.contains("    pub status: ProductStatus,"));
        assert!(code.contains("use super::product_status::ProductStatus;"));
        assert!(code.contains("pub const TABLE: &'static str = \"product\";"));
        assert!(code.contains("default `DRAFT`"));

        let new_struct = &code[code.find("pub struct NewProduct").unwrap()..];
        assert!(!new_struct.contains("pub id:"));
        assert!(new_struct.contains("pub category_id: Option<i64>,"));
    }

    #[test]
    fn test_access_stub_methods() {
        let code = RustTemplates::new().access_stub(&product(), &RenderOptions::default()).unwrap();
        assert!(code.contains("use super::category::Category;"));
        assert!(code.contains("use super::product::{NewProduct, Product};"));
        assert!(code.contains("pub trait ProductRepository {"));
        assert!(code.contains("fn find_by_id(&mut self, id: i64) -> Result<Option<Product>, Self::Error>;"));
        assert!(code.contains("fn find_by_sku(&mut self, sku: &str) -> Result<Option<Product>, Self::Error>;"));
        assert!(code.contains("fn delete(&mut self, id: i64) -> Result<bool, Self::Error>;"));
        assert!(code.contains("fn load_category(&mut self, row: &Product) -> Result<Option<Category>, Self::Error>;"));
    }

    #[test]
    fn test_enum_file() {
        let table = product();
        let status = &table.columns[3];
        let code = RustTemplates::new()
            .enumeration(&table, status, status.enumeration.as_ref().unwrap(), &RenderOptions::default())
            .unwrap();
        assert!(code.contains("#[allow(non_camel_case_types)]"));
        assert!(code.contains("    #[serde(rename = \"draft\")]\n    DRAFT,"));
        assert!(code.contains("pub const ALL: [ProductStatus; 2] = ["));
        assert!(code.contains("        ProductStatus::DRAFT\n"));
        assert!(code.contains("\"active\" => Ok(ProductStatus::ACTIVE),"));
    }

    #[test]
    fn test_invalid_identifier_is_template_error() {
        let mut table = product();
        table.columns[1].field_name = "self".to_string();
        let err = RustTemplates::new().entity(&table, &RenderOptions::default()).unwrap_err();
        assert!(err.contains("`self`"));
    }

    #[test]
    fn test_index_lists_modules() {
        let modules = vec![
            ModuleEntry {
                module: "category".to_string(),
                kind: ArtifactKind::Entity,
                logical_name: "Category".to_string(),
            },
            ModuleEntry {
                module: "type".to_string(),
                kind: ArtifactKind::Entity,
                logical_name: "Type".to_string(),
            },
        ];
        let code = RustTemplates::new()
            .index(&modules, &RenderOptions::default())
            .unwrap()
            .unwrap();
        assert!(code.contains("pub mod category;\npub mod r#type;\n"));
        assert!(code.contains("pub use r#type::Type;"));
    }
}
