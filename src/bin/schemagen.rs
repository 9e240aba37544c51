//! schemagen CLI - generate Rust entity code from a relational schema
//!
//! Reads table structure from a live database (or a YAML snapshot of one)
//! and writes entity structs, enums, repository traits and a module index.

use clap::{Args, Parser, Subcommand};
use schemagen::codegen::{ConflictPolicy, RustTemplates, TemplateSet};
use schemagen::config::{DialectSource, GeneratorConfig, ResolvedConnection, DEFAULT_CONFIG_FILE};
use schemagen::introspect::{SchemaReader, SchemaSnapshot};
use schemagen::metadata::TypeMap;
use schemagen::pipeline::{self, GenerationResult, RunControl, RunStatus};
use schemagen::Dialect;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schemagen")]
#[command(version, about = "Generate Rust entity code from a relational database schema", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate entity, enum, repository and index files
    Generate {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Print the assembled metadata model as YAML without writing files
    Inspect {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// List the tables that pass the include/exclude filters
    Tables {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Capture the schema into a YAML snapshot for offline generation
    Snapshot {
        #[command(flatten)]
        source: SourceArgs,

        /// Write the snapshot here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate the configuration without connecting
    Validate {
        #[command(flatten)]
        source: SourceArgs,
    },
}

/// Where the schema comes from
#[derive(Args)]
struct SourceArgs {
    /// Path to schemagen.yaml (default: ./schemagen.yaml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database URL (overrides DATABASE_URL and the config file)
    #[arg(long)]
    database_url: Option<String>,

    /// Database dialect: postgres, mysql or sqlite
    #[arg(long)]
    dialect: Option<Dialect>,

    /// Schema (PostgreSQL namespace / MySQL database) to read
    #[arg(long)]
    schema: Option<String>,

    /// Read a YAML snapshot instead of connecting
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Only tables matching these names or `*`/`?` patterns
    #[arg(long, value_name = "PATTERN")]
    include: Vec<String>,

    /// Skip tables matching these names or patterns
    #[arg(long, value_name = "PATTERN")]
    exclude: Vec<String>,
}

/// What to write and how
#[derive(Args)]
struct OutputArgs {
    /// Output root directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Logical namespace, e.g. `models` or `db::entities`
    #[arg(short, long)]
    namespace: Option<String>,

    /// fail-on-exists, force-overwrite or dry-run
    #[arg(long)]
    conflict: Option<ConflictPolicy>,

    /// Do not generate repository traits
    #[arg(long)]
    no_access_stubs: bool,

    /// Map enumerated columns to plain text instead of generating enums
    #[arg(long)]
    no_enums: bool,

    /// Do not generate the module index
    #[arg(long)]
    no_index: bool,

    /// Render/write worker threads
    #[arg(short, long)]
    workers: Option<usize>,

    /// Stop the run after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Write the JSON run report to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

/// Loaded config plus the connection the run will use.
///
/// Progress goes to stderr so `inspect` and `snapshot` can pipe stdout.
struct Session {
    config: GeneratorConfig,
    connection: ResolvedConnection,
}

impl SourceArgs {
    fn load(&self) -> Result<GeneratorConfig, String> {
        let mut config = match &self.config {
            Some(path) => {
                eprintln!("📋 Loading configuration from {}...", path.display());
                GeneratorConfig::from_file(path).map_err(|e| e.to_string())?
            }
            None if PathBuf::from(DEFAULT_CONFIG_FILE).exists() => {
                eprintln!("📋 Loading configuration from {}...", DEFAULT_CONFIG_FILE);
                GeneratorConfig::from_file(DEFAULT_CONFIG_FILE).map_err(|e| e.to_string())?
            }
            None => {
                eprintln!("  ℹ No {} found, using defaults", DEFAULT_CONFIG_FILE);
                GeneratorConfig::default()
            }
        };

        if let Some(snapshot) = &self.snapshot {
            config.snapshot = Some(snapshot.clone());
        }
        if let Some(schema) = &self.schema {
            config.database.schema = Some(schema.clone());
        }
        if !self.include.is_empty() {
            config.tables.include = self.include.clone();
        }
        if !self.exclude.is_empty() {
            config.tables.exclude = self.exclude.clone();
        }
        Ok(config)
    }

    fn session(&self, output: Option<&OutputArgs>) -> Result<Session, String> {
        let mut config = self.load()?;
        if let Some(output) = output {
            output.apply(&mut config);
        }
        config.validate().map_err(|e| e.to_string())?;

        let connection = config
            .resolve_connection(self.database_url.as_deref(), self.dialect)
            .map_err(|e| e.to_string())?;
        Ok(Session { config, connection })
    }
}

impl OutputArgs {
    fn apply(&self, config: &mut GeneratorConfig) {
        if let Some(root) = &self.output {
            config.output.root = root.clone();
        }
        if let Some(namespace) = &self.namespace {
            config.output.namespace = namespace.clone();
        }
        if let Some(conflict) = self.conflict {
            config.output.conflict = conflict;
        }
        if self.no_access_stubs {
            config.generate.access_stubs = false;
        }
        if self.no_enums {
            config.generate.enums = false;
        }
        if self.no_index {
            config.generate.index = false;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(timeout) = self.timeout_secs {
            config.timeout_secs = Some(timeout);
        }
    }
}

impl Session {
    fn open_reader(&self) -> Result<Box<dyn SchemaReader>, String> {
        match &self.config.snapshot {
            Some(path) => eprintln!("  ℹ Reading schema from snapshot {}", path.display()),
            None => {
                let source = self.connection.dialect_source;
                if source == DialectSource::Default {
                    eprintln!("  ℹ Using default dialect: {}", self.connection.dialect);
                } else {
                    eprintln!("  ℹ Using dialect from {}: {}", source, self.connection.dialect);
                }
            }
        }

        let reader = self.config.open_reader(&self.connection).map_err(|e| e.to_string())?;
        eprintln!("  ✓ Connected to {} schema '{}'", reader.dialect(), reader.schema_name());
        Ok(reader)
    }
}

fn main() {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "schemagen=info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Generate { source, output } => generate_code(source, output),
        Commands::Inspect { source } => inspect_schema(source),
        Commands::Tables { source } => list_tables(source),
        Commands::Snapshot { source, output } => capture_snapshot(source, output),
        Commands::Validate { source } => validate_config(source),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            process::exit(1);
        }
    }
}

/// Generate code; returns the process exit code for the run status
fn generate_code(source: SourceArgs, output: OutputArgs) -> Result<i32, String> {
    let session = source.session(Some(&output))?;
    let options = session.config.to_options().map_err(|e| e.to_string())?;
    let mut reader = session.open_reader()?;

    println!(
        "🔧 Generating into {} (namespace '{}', {})...",
        options.output_root.display(),
        options.namespace,
        options.conflict_policy
    );
    let result = pipeline::generate(reader.as_mut(), &RustTemplates::new(), &TypeMap::builtin(), &options)
        .map_err(|e| e.to_string())?;

    print_summary(&result);

    if let Some(report) = &output.report {
        let json = result.to_json().map_err(|e| format!("Failed to serialize report: {}", e))?;
        std::fs::write(report, json).map_err(|e| format!("Failed to write {}: {}", report.display(), e))?;
        println!("  ✓ Report written to {}", report.display());
    }

    Ok(result.status.exit_code())
}

fn print_summary(result: &GenerationResult) {
    for table in &result.tables {
        let marker = if table.status.produced_output() { "✓" } else { "❌" };
        println!("  {} {} ({:?})", marker, table.table, table.status);
    }
    for diagnostic in result.warnings() {
        println!("  ⚠ {}", diagnostic);
    }
    for diagnostic in result.errors() {
        println!("  ❌ {}", diagnostic);
    }

    println!(
        "  ℹ {} written, {} skipped, {} planned, {} failed",
        result.count(pipeline::ArtifactStatus::Written),
        result.count(pipeline::ArtifactStatus::Skipped),
        result.count(pipeline::ArtifactStatus::Planned),
        result.count(pipeline::ArtifactStatus::Failed)
    );

    match result.status {
        RunStatus::Success => println!("✨ Code generation complete!"),
        RunStatus::PartialFailure => println!("⚠ Code generation finished with errors"),
        RunStatus::Failure => println!("❌ Code generation failed"),
        RunStatus::Cancelled => println!("⚠ Code generation cancelled"),
    }
}

fn inspect_schema(source: SourceArgs) -> Result<i32, String> {
    let session = source.session(None)?;
    let options = session.config.to_options().map_err(|e| e.to_string())?;
    let mut reader = session.open_reader()?;
    let templates = RustTemplates::new();

    let assembly = pipeline::assemble(
        reader.as_mut(),
        &TypeMap::builtin(),
        &options,
        templates.naming(),
        &RunControl::unbounded(),
    )
    .map_err(|e| e.to_string())?;

    for (table, error) in &assembly.failures {
        eprintln!("  ❌ {}: {}", table, error);
    }
    for diagnostic in &assembly.diagnostics {
        eprintln!("  ⚠ {}", diagnostic);
    }

    let yaml = serde_yaml::to_string(&assembly.tables).map_err(|e| format!("Failed to serialize model: {}", e))?;
    print!("{}", yaml);

    Ok(if assembly.failures.is_empty() { 0 } else { 2 })
}

fn list_tables(source: SourceArgs) -> Result<i32, String> {
    let session = source.session(None)?;
    let filter = session.config.table_filter().map_err(|e| e.to_string())?;
    let mut reader = session.open_reader()?;

    let tables = reader.list_tables(&filter).map_err(|e| e.to_string())?;
    eprintln!("  ✓ {} tables", tables.len());
    for table in tables {
        println!("{}", table);
    }
    Ok(0)
}

fn capture_snapshot(source: SourceArgs, output: Option<PathBuf>) -> Result<i32, String> {
    let session = source.session(None)?;
    let filter = session.config.table_filter().map_err(|e| e.to_string())?;
    let mut reader = session.open_reader()?;

    let snapshot = SchemaSnapshot::capture(reader.as_mut(), &filter).map_err(|e| e.to_string())?;
    let yaml = snapshot.to_yaml().map_err(|e| format!("Failed to serialize snapshot: {}", e))?;

    match output {
        Some(path) => {
            std::fs::write(&path, yaml).map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
            println!("  ✓ Captured {} tables into {}", snapshot.tables.len(), path.display());
        }
        None => print!("{}", yaml),
    }
    Ok(0)
}

fn validate_config(source: SourceArgs) -> Result<i32, String> {
    let session = source.session(None)?;
    println!("  ✓ Configuration is valid");
    println!("  ℹ Dialect: {} (from {})", session.connection.dialect, session.connection.dialect_source);
    match &session.connection.url {
        Some(_) => println!("  ℹ Database URL configured"),
        None if session.config.snapshot.is_some() => println!("  ℹ Using snapshot, no database URL needed"),
        None => println!("  ⚠ No database URL configured"),
    }
    println!(
        "  ℹ Output: {}/{} ({})",
        session.config.output.root.display(),
        session.config.output.namespace,
        session.config.output.conflict
    );
    Ok(0)
}
