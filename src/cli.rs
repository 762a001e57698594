use std::io::Write;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, bail};
use tracing::{info, warn};

use crate::app::generator::generate_script;
use crate::app::ports::{FunctionInstaller, SchemaSource, ScriptWriter};
use crate::domain::{DatabaseKind, OwnershipRecord, SchemaGraph};
use crate::infra::adapters::{JsonSnapshotSource, PostgresAdapter};
use crate::infra::config::GeneratorConfig;
use crate::infra::dialect::dialect_for;
use crate::infra::export::FsScriptWriter;

/// Generates recursive delete functions for a 3DCityDB schema and its ADEs.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file; defaults to adedel.toml in the project root
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level unless ADEDEL_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write the delete script for the configured root table
    Generate(GenerateArgs),
    /// Print DROP statements for previously installed delete functions
    DropStatements(SourceArgs),
}

#[derive(Args, Debug, Default, Clone)]
pub struct SourceArgs {
    /// PostgreSQL connection string used for introspection and installation
    #[arg(long, env = "DATABASE_URL")]
    pub dsn: Option<String>,

    /// JSON schema snapshot read instead of a live database
    #[arg(long)]
    pub snapshot: Option<PathBuf>,

    #[arg(long)]
    pub schema: Option<String>,

    /// Prefix of generated function names
    #[arg(long)]
    pub prefix: Option<String>,
}

#[derive(Args, Debug, Default, Clone)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// postgresql or oracle
    #[arg(long)]
    pub dialect: Option<DatabaseKind>,

    /// Table whose delete function is the entry point
    #[arg(long)]
    pub root: Option<String>,

    /// Script path; stdout when omitted
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Skip the single-id wrapper functions
    #[arg(long)]
    pub no_wrappers: bool,

    /// Replace the installed functions with the generated ones
    #[arg(long)]
    pub install: bool,
}

impl SourceArgs {
    pub fn apply(&self, config: &mut GeneratorConfig) {
        if let Some(dsn) = &self.dsn {
            config.dsn = Some(dsn.clone());
        }
        if let Some(snapshot) = &self.snapshot {
            config.snapshot = Some(snapshot.clone());
        }
        if let Some(schema) = &self.schema {
            config.schema.clone_from(schema);
        }
        if let Some(prefix) = &self.prefix {
            config.function_prefix.clone_from(prefix);
        }
    }
}

impl GenerateArgs {
    pub fn apply(&self, config: &mut GeneratorConfig) {
        self.source.apply(config);
        if let Some(dialect) = self.dialect {
            config.dialect = dialect;
        }
        if let Some(root) = &self.root {
            config.root_table.clone_from(root);
        }
        if let Some(output) = &self.output {
            config.output = Some(output.clone());
        }
        if self.no_wrappers {
            config.single_id_wrappers = false;
        }
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let (mut config, path) = GeneratorConfig::resolve(cli.config.as_deref(), &cwd)?;
    if let Some(path) = &path {
        info!(path = %path.display(), "config loaded");
    }

    match cli.command {
        Command::Generate(args) => {
            args.apply(&mut config);
            config.validate()?;
            generate(&config, args.install).await
        }
        Command::DropStatements(args) => {
            args.apply(&mut config);
            config.validate()?;
            drop_statements(&config).await
        }
    }
}

async fn generate(config: &GeneratorConfig, install: bool) -> Result<()> {
    let dialect = dialect_for(config.dialect)?;
    let (schema, ownership) = load_schema(config).await?;
    let classifier = config.classifier(ownership);
    let ctx = config.emit_context();

    let generated = generate_script(
        &schema,
        &classifier,
        dialect.as_ref(),
        &ctx,
        &config.root_table,
        config.synthesis_options(),
    )?;
    for note in &generated.notes {
        warn!(%note, "needs review");
    }

    match &config.output {
        Some(path) => {
            FsScriptWriter::new().write_script(path, &generated.script)?;
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(generated.script.as_bytes())?;
            stdout.flush()?;
        }
    }

    if install {
        let installer = live_adapter(config)?;
        let installed = installer
            .list_installed(&config.schema, &config.function_prefix)
            .await?;
        let mut drops: Vec<String> = installed
            .iter()
            .map(|f| dialect.drop_statement(&ctx, f))
            .collect();
        drops.dedup();
        installer.install(&drops, &generated.script).await?;
        info!(
            dropped = drops.len(),
            created = generated.function_names.len(),
            "delete functions installed"
        );
    }
    Ok(())
}

async fn drop_statements(config: &GeneratorConfig) -> Result<()> {
    let dialect = dialect_for(config.dialect)?;
    let adapter = live_adapter(config)?;
    let ctx = config.emit_context();

    let installed = adapter
        .list_installed(&config.schema, &config.function_prefix)
        .await?;
    let mut drops: Vec<String> = installed
        .iter()
        .map(|f| dialect.drop_statement(&ctx, f))
        .collect();
    drops.dedup();
    let mut stdout = std::io::stdout().lock();
    for statement in &drops {
        writeln!(stdout, "{statement}")?;
    }
    stdout.flush()?;
    Ok(())
}

async fn load_schema(config: &GeneratorConfig) -> Result<(SchemaGraph, Vec<OwnershipRecord>)> {
    let source: Box<dyn SchemaSource> = match &config.snapshot {
        Some(path) => Box::new(JsonSnapshotSource::new(path)),
        None => Box::new(live_adapter(config)?),
    };
    let schema = source.load_schema(&config.schema).await?;
    let ownership = source.load_ownership(&config.schema).await?;
    Ok((schema, ownership))
}

fn live_adapter(config: &GeneratorConfig) -> Result<PostgresAdapter> {
    if config.dialect != DatabaseKind::PostgreSql {
        bail!(
            "live databases are only supported for PostgreSQL; use a snapshot for {}",
            config.dialect
        );
    }
    let Some(dsn) = &config.dsn else {
        bail!("no schema source: pass --snapshot or --dsn (or set DATABASE_URL)");
    };
    Ok(PostgresAdapter::new(dsn.clone()).with_timeout(config.psql_timeout_secs))
}
