//! careadmin - batch admin jobs for the care-matching backend
//!
//! CLI entry point: loads config, wires the Firebase adapters and runs one job.

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::{debug, info};

use careadmin::backend::dry_run::DryRunStore;
use careadmin::backend::firebase::{FirebaseContext, ServiceAccount};
use careadmin::backend::memory::{MemoryDocumentStore, MemoryIdentity};
use careadmin::batch::{self, BatchReport};
use careadmin::cli::{Cli, Command, LoadArgs, SchemaCommand};
use careadmin::config::Config;
use careadmin::schema::{self, TargetSchema};
use careadmin::source;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    // stdout carries the job output (URLs, tallies); logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .try_init()
        .map_err(|e| eyre::eyre!("Failed to install log subscriber: {}", e))?;

    debug!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!("main: dispatching command");
    match cli.command {
        Command::Seed { load, password } => cmd_seed(&config, load, password).await,
        Command::Migrate { load } => cmd_migrate(&config, load).await,
        Command::PhotoUrls { prefix } => cmd_photo_urls(&config, prefix).await,
        Command::RewriteCarePreferences { collection, dry_run } => {
            cmd_rewrite_care_preferences(&config, collection, dry_run).await
        }
        Command::RewriteSessionNotes { collection, dry_run } => {
            cmd_rewrite_session_notes(&config, collection, dry_run).await
        }
        Command::Schema { command } => cmd_schema(command),
    }
}

fn firebase(config: &Config) -> Result<FirebaseContext> {
    let account = ServiceAccount::load(&config.credentials_path)
        .context(format!("Failed to load credentials from {}", config.credentials_path.display()))?;
    FirebaseContext::new(account, config.firebase.clone())
}

/// Bulk records and target schema for a loading job
fn prepare_load(config: &Config, load: &LoadArgs, default_schema: &str) -> Result<(Vec<schema::Record>, TargetSchema)> {
    let path = load.bulk_source.as_ref().unwrap_or(&config.bulk_source_path);
    let records = source::load_records(path)?;
    let schema_name = load.schema.as_deref().unwrap_or(default_schema);
    let target = schema::resolve(schema_name, load.schema_file.as_deref())?;
    info!(records = records.len(), schema = %target.name, source = %path.display(), "Prepared bulk load");
    Ok((records, target))
}

async fn cmd_seed(config: &Config, load: LoadArgs, password: Option<String>) -> Result<()> {
    let (records, target) = prepare_load(config, &load, &config.seed.schema)?;
    let collection = load.collection.as_deref().unwrap_or(&config.seed.collection);
    let password = password.unwrap_or_else(|| config.seed.password.clone());

    if load.dry_run {
        // Nothing leaves the process: accounts and writes are both simulated
        let identity = MemoryIdentity::new();
        let scratch = MemoryDocumentStore::new();
        let store = DryRunStore::new(&scratch);
        let report = batch::seed_users(&identity, &store, &records, &target, collection, &password).await;
        return finish_dry_run(report, &store).await;
    }

    let firebase = firebase(config)?;
    let identity = firebase.auth()?;
    let store = firebase.firestore()?;
    finish(batch::seed_users(&identity, &store, &records, &target, collection, &password).await)
}

async fn cmd_migrate(config: &Config, load: LoadArgs) -> Result<()> {
    let (records, target) = prepare_load(config, &load, &config.migrate.schema)?;
    let collection = load.collection.as_deref().unwrap_or(&config.destination_collection);

    let firebase = firebase(config)?;
    let identity = firebase.auth()?;
    let firestore = firebase.firestore()?;

    if load.dry_run {
        let store = DryRunStore::new(&firestore);
        let report = batch::migrate_users(&identity, &store, &records, &target, collection).await;
        return finish_dry_run(report, &store).await;
    }
    finish(batch::migrate_users(&identity, &firestore, &records, &target, collection).await)
}

async fn cmd_photo_urls(config: &Config, prefix: Option<String>) -> Result<()> {
    let prefix = prefix.unwrap_or_else(|| config.photos.prefix.clone());
    let firebase = firebase(config)?;
    let storage = firebase.storage()?;

    let listing = batch::collect_photo_urls(&storage, &prefix, &config.firebase.download_host)
        .await
        .context(format!("Failed to list objects under '{}'", prefix))?;

    for url in &listing.urls {
        println!("{}", url);
    }
    finish(listing.report)
}

async fn cmd_rewrite_care_preferences(config: &Config, collection: Option<String>, dry_run: bool) -> Result<()> {
    let collection = collection.unwrap_or_else(|| config.source_collection.clone());
    let care_types = config.labels.care_types();
    let tasks = config.labels.tasks();

    let firebase = firebase(config)?;
    let firestore = firebase.firestore()?;

    if dry_run {
        let store = DryRunStore::new(&firestore);
        let report = batch::rewrite_care_preferences(&store, &collection, &care_types, &tasks).await;
        return finish_dry_run(report, &store).await;
    }
    finish(batch::rewrite_care_preferences(&firestore, &collection, &care_types, &tasks).await)
}

async fn cmd_rewrite_session_notes(config: &Config, collection: Option<String>, dry_run: bool) -> Result<()> {
    let collection = collection.unwrap_or_else(|| config.sessions.collection.clone());
    let tasks = config.labels.tasks();

    let firebase = firebase(config)?;
    let firestore = firebase.firestore()?;

    if dry_run {
        let store = DryRunStore::new(&firestore);
        let report = batch::rewrite_session_notes(&store, &collection, &tasks).await;
        return finish_dry_run(report, &store).await;
    }
    finish(batch::rewrite_session_notes(&firestore, &collection, &tasks).await)
}

fn cmd_schema(command: SchemaCommand) -> Result<()> {
    match command {
        SchemaCommand::List => {
            for name in schema::builtin_names() {
                let description = schema::builtin(name).map(|s| s.description).unwrap_or_default();
                println!("{}  {}", name.cyan(), description.as_str().dimmed());
            }
            Ok(())
        }
        SchemaCommand::Show { name } => {
            let target = schema::builtin(&name).ok_or_else(|| {
                eyre::eyre!(
                    "Unknown schema '{}'. Built-in schemas: {}",
                    name,
                    schema::builtin_names().join(", ")
                )
            })?;
            print!("{}", target.to_yaml()?);
            Ok(())
        }
    }
}

/// Print the tally; a pass cut short by a listing failure is an error of the run
fn finish(report: BatchReport) -> Result<()> {
    println!("{}", report);
    match report.interrupted {
        Some(reason) => Err(eyre::eyre!("Job stopped early: {}", reason)),
        None => Ok(()),
    }
}

async fn finish_dry_run(report: BatchReport, store: &DryRunStore<'_>) -> Result<()> {
    let planned = store.planned().await.len();
    println!("{} Dry run: {} write(s) planned, none performed", "•".yellow(), planned);
    finish(report)
}
