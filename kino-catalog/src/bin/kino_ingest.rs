//! kino-ingest - Ingest raw movie records from JSON files
//!
//! Each file holds one record object or an array of them. Reports are
//! printed to stdout as JSON, one per line.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use kino_common::events::EventBus;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kino_catalog::config::ServiceConfig;
use kino_catalog::db::settings::CatalogSettings;
use kino_catalog::models::RawMovieRecord;
use kino_catalog::AppState;

#[derive(Parser, Debug)]
#[command(name = "kino-ingest")]
#[command(about = "Ingest raw movie records into the catalog database")]
#[command(version)]
struct Args {
    /// Root folder holding the catalog database
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Keep going after a record fails
    #[arg(long)]
    keep_going: bool,

    /// JSON files to ingest
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum RecordFile {
    Many(Vec<RawMovieRecord>),
    One(RawMovieRecord),
}

fn read_records(path: &Path) -> Result<Vec<RawMovieRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let parsed: RecordFile = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    Ok(match parsed {
        RecordFile::Many(records) => records,
        RecordFile::One(record) => vec![record],
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = kino_common::config::load_default_toml_config()
        .context("Failed to load config file")?;
    let config = ServiceConfig::resolve(args.root_folder.as_deref(), None, None, &toml_config)
        .context("Failed to initialize root folder")?;

    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.default_log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let db = kino_common::db::init_database(&config.database_path)
        .await
        .context("Failed to open database")?;
    let settings = CatalogSettings::load(&db)
        .await
        .context("Failed to load settings")?;
    let state = AppState::with_local_images(db.clone(), EventBus::new(settings.event_bus_capacity), settings);

    let mut ingested = 0usize;
    let mut failed = 0usize;

    for path in &args.files {
        for record in read_records(path)? {
            match state.orchestrator.ingest(&record).await {
                Ok(report) => {
                    ingested += 1;
                    println!("{}", serde_json::to_string(&report)?);
                }
                Err(e) => {
                    failed += 1;
                    error!(file = %path.display(), external_id = %record.external_id, error = %e, "Ingestion failed");
                    if !args.keep_going {
                        db.close().await;
                        return Err(e).context(format!("Ingestion of {} failed", record.external_id));
                    }
                }
            }
        }
    }

    info!(ingested, failed, "Ingestion finished");
    db.close().await;

    if failed > 0 {
        anyhow::bail!("{} record(s) failed", failed);
    }
    Ok(())
}
