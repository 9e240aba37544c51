//! Descriptor → rendered artifacts.

use super::templates::{ArtifactKind, ModuleEntry, RenderOptions, TemplateSet};
use crate::error::GenerationError;
use crate::metadata::TableDescriptor;
use std::path::PathBuf;

/// Source text ready for the file sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedArtifact {
    pub kind: ArtifactKind,
    pub logical_name: String,
    /// Owning table; `None` for the module index
    pub table: Option<String>,
    /// Path relative to the output root
    pub relative_path: PathBuf,
    pub content: String,
}

impl RenderedArtifact {
    /// Index entry declaring this artifact's module
    pub fn module_entry(&self, templates: &dyn TemplateSet) -> ModuleEntry {
        ModuleEntry {
            module: templates.module_name(self.kind, &self.logical_name),
            kind: self.kind,
            logical_name: self.logical_name.clone(),
        }
    }
}

/// Directory of a logical namespace: `a::b`, `a.b` and `a/b` all become `a/b`
pub fn namespace_dir(namespace: &str) -> PathBuf {
    namespace
        .split(|c| c == ':' || c == '.' || c == '/' || c == '\\')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect()
}

fn artifact(
    templates: &dyn TemplateSet,
    options: &RenderOptions,
    kind: ArtifactKind,
    logical_name: &str,
    table: Option<&str>,
    content: Result<String, String>,
) -> Result<RenderedArtifact, GenerationError> {
    let content = content.map_err(|reason| GenerationError::Template {
        descriptor: table.unwrap_or(&options.namespace).to_string(),
        artifact: kind,
        reason,
    })?;
    Ok(RenderedArtifact {
        kind,
        logical_name: logical_name.to_string(),
        table: table.map(str::to_string),
        relative_path: namespace_dir(&options.namespace).join(templates.file_name(kind, logical_name)),
        content,
    })
}

/// Render every artifact of one table: the entity, its enums in column
/// order, then its access stub.
///
/// Each artifact fails independently.
pub fn render(
    table: &TableDescriptor,
    templates: &dyn TemplateSet,
    options: &RenderOptions,
) -> Vec<Result<RenderedArtifact, GenerationError>> {
    let owner = Some(table.table_name.as_str());
    let mut rendered = Vec::new();

    rendered.push(artifact(
        templates,
        options,
        ArtifactKind::Entity,
        &table.type_name,
        owner,
        templates.entity(table, options),
    ));

    if options.emit_enums {
        for (column, enumeration) in table.enums() {
            let content = templates
                .enumeration(table, column, enumeration, options)
                .map_err(|reason| format!("column '{}': {}", column.name, reason));
            rendered.push(artifact(
                templates,
                options,
                ArtifactKind::Enum,
                &enumeration.type_name,
                owner,
                content,
            ));
        }
    }

    if options.access_stubs {
        if let Some(stub) = &table.access_stub_name {
            rendered.push(artifact(
                templates,
                options,
                ArtifactKind::AccessStub,
                stub,
                owner,
                templates.access_stub(table, options),
            ));
        }
    }

    rendered
}

/// Render the module index over `modules`, if the template set has one
pub fn render_index(
    modules: &[ModuleEntry],
    templates: &dyn TemplateSet,
    options: &RenderOptions,
) -> Option<Result<RenderedArtifact, GenerationError>> {
    let mut sorted = modules.to_vec();
    sorted.sort();
    sorted.dedup();
    let content = templates.index(&sorted, options)?;
    Some(artifact(
        templates,
        options,
        ArtifactKind::Index,
        &options.namespace,
        None,
        content,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{ColumnDescriptor, EnumDescriptor, TableId};

    struct Failing;

    impl TemplateSet for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn file_name(&self, _kind: ArtifactKind, logical_name: &str) -> String {
            format!("{}.txt", logical_name)
        }

        fn entity(&self, table: &TableDescriptor, _options: &RenderOptions) -> Result<String, String> {
            Ok(table.type_name.clone())
        }

        fn access_stub(&self, _table: &TableDescriptor, _options: &RenderOptions) -> Result<String, String> {
            Err("stubs unsupported".to_string())
        }

        fn enumeration(
            &self,
            _table: &TableDescriptor,
            _column: &ColumnDescriptor,
            enumeration: &EnumDescriptor,
            _options: &RenderOptions,
        ) -> Result<String, String> {
            Ok(enumeration.type_name.clone())
        }
    }

    fn table() -> TableDescriptor {
        TableDescriptor {
            id: TableId(0),
            schema: "public".to_string(),
            table_name: "widget".to_string(),
            type_name: "Widget".to_string(),
            columns: Vec::new(),
            associations: Vec::new(),
            primary_key: Vec::new(),
            unique_keys: Vec::new(),
            access_stub_name: Some("WidgetRepository".to_string()),
        }
    }

    #[test]
    fn test_namespace_dir() {
        assert_eq!(namespace_dir("app::models"), PathBuf::from("app/models"));
        assert_eq!(namespace_dir("app.models"), PathBuf::from("app/models"));
        assert_eq!(namespace_dir(""), PathBuf::new());
    }

    #[test]
    fn test_template_failure_is_per_artifact() {
        let options = RenderOptions {
            namespace: "gen".to_string(),
            ..RenderOptions::default()
        };
        let rendered = render(&table(), &Failing, &options);
        assert_eq!(rendered.len(), 2);

        let entity = rendered[0].as_ref().unwrap();
        assert_eq!(entity.relative_path, PathBuf::from("gen/Widget.txt"));
        assert_eq!(entity.content, "Widget");

        match &rendered[1] {
            Err(GenerationError::Template {
                descriptor,
                artifact,
                reason,
            }) => {
                assert_eq!(descriptor, "widget");
                assert_eq!(*artifact, ArtifactKind::AccessStub);
                assert_eq!(reason, "stubs unsupported");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_no_index_by_default() {
        assert!(render_index(&[], &Failing, &RenderOptions::default()).is_none());
    }
}
