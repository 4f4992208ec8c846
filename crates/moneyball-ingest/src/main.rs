// Stat ingestion entry point.
//
// Startup sequence:
// 1. Parse the command line
// 2. Load config (copying defaults on first run)
// 3. Initialize tracing (log file when configured, stderr otherwise)
// 4. Open the document store
// 5. Run the requested command and map its outcome to the exit status

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use moneyball_core::config::{self, Config};
use moneyball_core::store::{DocumentStore, SqliteStore};
use moneyball_ingest::cli::{Cli, Command};
use moneyball_ingest::orchestrator::{IngestSettings, Ingestor};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // 1. Parse the command line
    let cli = Cli::parse();

    // 2. Load config
    let config = config::load_config(&cli.config_dir).with_context(|| {
        format!("failed to load configuration from {}", cli.config_dir.display())
    })?;

    // 3. Initialize tracing
    init_tracing(&config)?;
    info!("Moneyball ingest starting up");

    // 4. Open the document store
    let db_path = config
        .store
        .resolved_db_path()
        .context("failed to resolve database path")?;
    let store: Arc<dyn DocumentStore> = Arc::new(
        SqliteStore::open(&db_path).with_context(|| format!("failed to open store at {db_path}"))?,
    );
    info!("Document store opened at {}", db_path);

    // 5. Run the command
    let ingestor = Ingestor::new(store.clone(), IngestSettings::from_config(&config));
    match cli.command {
        Command::File { path, name } => {
            let name = match name {
                Some(name) => name,
                None => path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .with_context(|| format!("{} has no file name", path.display()))?,
            };
            let result = ingestor.ingest_file(&path, &name).await;
            let summary = result.summary();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("{summary}");
            }
            Ok(exit_code(result.is_success()))
        }
        Command::Sweep { dir } => {
            let dir = dir.unwrap_or_else(|| Path::new(&config.ingest.pending_dir).to_path_buf());
            let batch = ingestor
                .ingest_directory(&dir)
                .await
                .with_context(|| format!("sweep of {} failed", dir.display()))?;
            let summary = batch.summary();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("{summary}");
            }
            Ok(exit_code(batch.files_failed() == 0))
        }
        Command::Stats => {
            print_stats(store.as_ref(), &config, cli.json).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn print_stats(store: &dyn DocumentStore, config: &Config, json: bool) -> anyhow::Result<()> {
    let collections = [
        &config.store.game_stats_collection,
        &config.store.players_collection,
    ];
    let mut counts = serde_json::Map::new();
    for collection in collections {
        let count = store
            .count(collection)
            .await
            .with_context(|| format!("failed to count {collection}"))?;
        counts.insert(collection.clone(), count.into());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&counts)?);
    } else {
        for (collection, count) in &counts {
            println!("{collection}: {count}");
        }
    }
    Ok(())
}

fn exit_code(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Initialize tracing to a log file under `logging.log_dir`, or to stderr
/// when no directory is configured. Stdout stays free for summaries.
fn init_tracing(config: &Config) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("moneyball_ingest=info,moneyball_core=info,warn"));

    match &config.logging.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create log directory {dir}"))?;
            let log_file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(Path::new(dir).join("moneyball-ingest.log"))
                .context("failed to open log file")?;
            let subscriber = fmt::Subscriber::builder()
                .with_env_filter(filter)
                .with_writer(log_file)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .context("failed to set tracing subscriber")?;
        }
        None => {
            let subscriber = fmt::Subscriber::builder()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(true)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .context("failed to set tracing subscriber")?;
        }
    }

    Ok(())
}
