//! Code generation: templates, rendering and file emission.
//!
//! The emitter turns each finalized [`crate::metadata::TableDescriptor`] into
//! rendered artifacts through a [`TemplateSet`]; the file sink writes them
//! under the output root according to a [`ConflictPolicy`].

pub mod emitter;
pub mod fs_utils;
pub mod rust_templates;
pub mod templates;
pub mod utils;

// Re-export key types
pub use emitter::{namespace_dir, render, render_index, RenderedArtifact};
pub use fs_utils::{write_artifact, ConflictPolicy, WriteOutcome};
pub use rust_templates::RustTemplates;
pub use templates::{ArtifactKind, ModuleEntry, RenderOptions, TemplateSet};
