use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use legis_core::adapters;
use legis_core::config::Config;
use legis_core::db;
use legis_core::reconcile::Reconciler;
use legis_core::schema::{ExternalKey, KeyKind, NormalizedCandidate, SourceKind};
use legis_core::sync::{JsonFileFeed, Pacer, SyncRunner, SyncScheduler};
use schemars::schema_for;
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "legis")]
#[command(about = "Polish legislative-process record reconciliation", long_about = None)]
struct Cli {
    /// Config file (default: ./legis.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export canonical JSON Schemas to the ./schemas directory
    Schema {
        #[command(subcommand)]
        command: SchemaCommands,
    },
    /// Run one sync pass over a saved source payload file
    Ingest {
        /// Source the payloads come from: gov, rcl or sejm
        #[arg(long)]
        source: SourceKind,
        /// JSON array of raw payloads
        #[arg(long)]
        file: PathBuf,
    },
    /// Show which stored document a title (and optional registry number) resolves to
    Resolve {
        #[arg(long)]
        title: String,
        #[arg(long)]
        registry: Option<String>,
    },
    /// Show the latest sync run per source
    Status,
}

#[derive(Subcommand)]
enum SchemaCommands {
    /// Export JSON Schema files for canonical types
    Export {
        /// Output directory (default: ./schemas)
        #[arg(long, default_value = "schemas")]
        out_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "legis=info,legis_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Schema { command } => match command {
            SchemaCommands::Export { out_dir } => schema_export(out_dir),
        },
        Commands::Ingest { source, file } => {
            let config = load_config(cli.config)?;
            ingest(&config, source, file)
        }
        Commands::Resolve { title, registry } => {
            let config = load_config(cli.config)?;
            resolve(&config, title, registry)
        }
        Commands::Status => {
            let config = load_config(cli.config)?;
            status(&config)
        }
    }
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    Config::load_or_default(path.as_deref()).context("Failed to load configuration")
}

fn schema_export(out_dir: PathBuf) -> Result<()> {
    fs::create_dir_all(&out_dir)?;

    // Export NormalizedCandidate schema
    let candidate_schema = schema_for!(NormalizedCandidate);
    let candidate_json = serde_json::to_string_pretty(&candidate_schema)?;
    fs::write(out_dir.join("NormalizedCandidate.schema.json"), candidate_json)?;

    // Export ExternalKey schema
    let key_schema = schema_for!(ExternalKey);
    let key_json = serde_json::to_string_pretty(&key_schema)?;
    fs::write(out_dir.join("ExternalKey.schema.json"), key_json)?;

    // Export ResolutionResult schema
    let resolution_schema = schema_for!(legis_core::schema::ResolutionResult);
    let resolution_json = serde_json::to_string_pretty(&resolution_schema)?;
    fs::write(out_dir.join("ResolutionResult.schema.json"), resolution_json)?;

    println!("Exported schemas to {}", out_dir.display());
    Ok(())
}

fn ingest(config: &Config, source: SourceKind, file: PathBuf) -> Result<()> {
    let mut conn = db::open(&config.database.path)
        .with_context(|| format!("Failed to open {}", config.database.path.display()))?;
    let classifier = config.classifier().context("Failed to load classifier rules")?;
    let adapter = adapters::for_source(source, classifier);
    let mut feed = JsonFileFeed::open(&file)
        .with_context(|| format!("Failed to read payloads from {}", file.display()))?;
    info!(%source, records = feed.len(), file = %file.display(), "Ingesting");

    let scheduler = SyncScheduler::new();
    let ticket = scheduler.try_begin(source)?;

    let report = {
        let reconciler = Reconciler::new(&mut conn, config.merge.clone());
        let mut runner = SyncRunner::new(reconciler, Pacer::new(config.sync.delay_for(source)));
        runner.run(adapter.as_ref(), &mut feed)
    };

    db::record_sync_run(&conn, source, ticket.started_at(), &report)?;
    ticket.finish(&report);

    println!(
        "{source}: fetched {}, created {}, updated {}, skipped {}, failed {}, ambiguous {}",
        report.fetched,
        report.created,
        report.updated,
        report.skipped,
        report.failed,
        report.ambiguous
    );
    for failure in &report.failures {
        println!(
            "  - {}: {}",
            failure.source_id.as_deref().unwrap_or("<unknown>"),
            failure.reason
        );
    }
    Ok(())
}

fn resolve(config: &Config, title: String, registry: Option<String>) -> Result<()> {
    let mut conn = db::open(&config.database.path)?;
    let mut candidate = NormalizedCandidate::new(SourceKind::Gov, "cli", title);
    candidate.strong_key = registry
        .as_deref()
        .and_then(|raw| ExternalKey::parse(KeyKind::Registry, raw));

    let reconciler = Reconciler::new(&mut conn, config.merge.clone());
    let resolution = reconciler.resolve(&candidate)?;
    println!("{}", serde_json::to_string_pretty(&resolution)?);

    if let Some(id) = resolution.matched_document_id {
        if let Some(doc) = db::get_document(reconciler.connection(), id)? {
            println!("{} [{}] {}", doc.id, doc.status, doc.title);
        }
    }
    Ok(())
}

fn status(config: &Config) -> Result<()> {
    let conn = db::open(&config.database.path)?;
    let runs = db::latest_sync_runs(&conn)?;
    if runs.is_empty() {
        println!("No sync runs recorded.");
        return Ok(());
    }
    for run in runs {
        println!(
            "{}: {} -> {} (fetched {}, created {}, updated {}, skipped {}, failed {}{})",
            run.source,
            run.started_at,
            run.finished_at,
            run.report.fetched,
            run.report.created,
            run.report.updated,
            run.report.skipped,
            run.report.failed,
            if run.report.cancelled { ", cancelled" } else { "" }
        );
    }
    println!("{} documents stored", db::count_documents(&conn)?);
    Ok(())
}
