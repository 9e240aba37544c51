//! # schemagen: Relational Schema to Rust Code
//!
//! schemagen reads the structure of a live relational database (PostgreSQL,
//! MySQL/MariaDB or SQLite) and generates Rust source for it: one entity
//! struct per table, one enum per enumerated column, a repository trait per
//! entity and a `mod.rs` tying them together.
//!
//! ## Pipeline
//!
//! 1. **Introspect** ([`introspect`]): a [`SchemaReader`] lists tables and
//!    reads their columns, foreign keys, indexes and enumerated values.
//! 2. **Assemble** ([`metadata`]): native types map to semantic types,
//!    database names become collision-free identifiers, foreign keys become
//!    associations, and each table turns into a `TableDescriptor`.
//! 3. **Emit** ([`codegen`]): a [`TemplateSet`] renders each descriptor and
//!    the file sink writes it under the output root.
//!
//! Per-table failures never stop the run; they are reported in the
//! [`GenerationResult`] alongside everything that was produced.
//!
//! ## Example: build.rs
//!
//! ```rust,ignore
//! fn main() {
//!     schemagen::generate_from_yaml("schemagen.yaml").expect("schema generation failed");
//! }
//! ```

pub mod codegen;
pub mod config;
pub mod dialect;
pub mod error;
pub mod introspect;
pub mod metadata;
pub mod pipeline;

// Re-export key types
pub use codegen::{ConflictPolicy, RustTemplates, TemplateSet};
pub use config::{ConfigError, GeneratorConfig};
pub use dialect::Dialect;
pub use error::GenerationError;
pub use introspect::{SchemaReader, SchemaSnapshot, SnapshotSchemaReader, TableFilter};
pub use metadata::{NamingPolicy, TableDescriptor, TypeMap};
pub use pipeline::{generate, CancellationToken, GenerateOptions, GenerationResult, RunStatus};

/// Run a whole generation described by a config file with the Rust
/// templates, printing progress. Intended for build scripts.
///
/// Returns `Err` when the config cannot be loaded, the schema cannot be
/// reached, or the run did not succeed.
pub fn generate_from_yaml(yaml_path: impl AsRef<std::path::Path>) -> Result<GenerationResult, String> {
    println!("📋 Loading configuration from {}...", yaml_path.as_ref().display());

    let config = GeneratorConfig::from_file(&yaml_path).map_err(|e| e.to_string())?;
    println!("  ✓ Configuration loaded");

    let result = generate_from_config(&config)?;
    match result.status {
        RunStatus::Success => {
            println!("✨ Code generation complete!");
            Ok(result)
        }
        status => {
            for diagnostic in result.errors() {
                println!("  ❌ {}", diagnostic);
            }
            Err(format!("Code generation finished with status {}", status))
        }
    }
}

/// Run a generation described by `config`, resolving the connection from
/// the config file and the environment (after loading its dotenv file)
pub fn generate_from_config(config: &GeneratorConfig) -> Result<GenerationResult, String> {
    let connection = config.resolve_connection(None, None).map_err(|e| e.to_string())?;
    let options = config.to_options().map_err(|e| e.to_string())?;
    let mut reader = config.open_reader(&connection).map_err(|e| e.to_string())?;

    let result = generate(reader.as_mut(), &RustTemplates::new(), &TypeMap::builtin(), &options)
        .map_err(|e| format!("Code generation failed: {}", e))?;

    println!(
        "  ✓ Generated {} artifacts for {} tables",
        result.artifacts.len(),
        result.tables.len()
    );
    Ok(result)
}
