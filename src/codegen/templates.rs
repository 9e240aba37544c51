//! Pluggable template sets.
//!
//! A [`TemplateSet`] turns finalized descriptors into source text for one
//! target ecosystem. Rendering is pure: templates never touch the disk and
//! report failures as plain messages, which the emitter wraps into
//! [`crate::error::GenerationError::Template`].

use crate::metadata::{ColumnDescriptor, EnumDescriptor, NamingPolicy, TableDescriptor};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of emitted source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Entity,
    AccessStub,
    Enum,
    Index,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Entity => "entity",
            ArtifactKind::AccessStub => "access_stub",
            ArtifactKind::Enum => "enum",
            ArtifactKind::Index => "index",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run-level settings visible to templates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// Logical namespace of the generated code, `::` or `.` separated
    pub namespace: String,
    pub access_stubs: bool,
    pub emit_enums: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            namespace: "models".to_string(),
            access_stubs: true,
            emit_enums: true,
        }
    }
}

/// One module listed in the index artifact
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ModuleEntry {
    pub module: String,
    pub kind: ArtifactKind,
    pub logical_name: String,
}

/// Source templates for one target ecosystem
///
/// # Example
///
/// ```ignore
/// struct Markdown;
///
/// impl TemplateSet for Markdown {
///     fn name(&self) -> &str { "markdown" }
///     fn file_name(&self, _kind: ArtifactKind, logical_name: &str) -> String {
///         format!("{}.md", logical_name)
///     }
///     fn entity(&self, table: &TableDescriptor, _options: &RenderOptions) -> Result<String, String> {
///         Ok(format!("# {}\n", table.type_name))
///     }
///     // ...
/// }
/// ```
pub trait TemplateSet: Send + Sync {
    fn name(&self) -> &str;

    /// Naming conventions the generated code must follow
    fn naming(&self) -> NamingPolicy {
        NamingPolicy::default()
    }

    /// File name (relative to the namespace directory) of one artifact
    fn file_name(&self, kind: ArtifactKind, logical_name: &str) -> String;

    /// Module name under which `file_name` is declared in the index
    fn module_name(&self, kind: ArtifactKind, logical_name: &str) -> String {
        let file = self.file_name(kind, logical_name);
        match file.rsplit_once('.') {
            Some((stem, _)) => stem.to_string(),
            None => file,
        }
    }

    fn entity(&self, table: &TableDescriptor, options: &RenderOptions) -> Result<String, String>;

    fn access_stub(&self, table: &TableDescriptor, options: &RenderOptions) -> Result<String, String>;

    fn enumeration(
        &self,
        table: &TableDescriptor,
        column: &ColumnDescriptor,
        enumeration: &EnumDescriptor,
        options: &RenderOptions,
    ) -> Result<String, String>;

    /// Module index listing every generated module; `None` when the
    /// ecosystem has no such file
    fn index(&self, modules: &[ModuleEntry], options: &RenderOptions) -> Option<Result<String, String>> {
        let _ = (modules, options);
        None
    }
}
