//! tabula: run a scripted grid editing session against a SQLite table

mod logging;
mod render;
mod script;
mod session;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tabula_core::{TableId, ViewStateStore};
use tabula_driver_sqlite::SqliteGateway;
use tabula_services::{SnapshotCache, TableEditor};
use tabula_settings::{EngineSettings, JsonViewStateStore, MemoryViewStateStore};

use crate::logging::LoggingConfig;

#[derive(Parser, Debug)]
#[command(name = "tabula", version, about = "Scripted grid editing sessions against a SQLite table")]
struct Cli {
    /// SQLite database file, or :memory:
    #[arg(env = "TABULA_DATABASE")]
    database: String,

    /// Table to open, optionally schema-qualified (main.users)
    table: String,

    /// Script file; reads stdin when omitted
    #[arg(short, long)]
    script: Option<PathBuf>,

    /// Settings file instead of the one in the user config directory
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Directory for per-table layout files
    #[arg(long)]
    view_state_dir: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = LogProfile::Development)]
    log: LogProfile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogProfile {
    Development,
    Production,
    Testing,
    Off,
}

impl LogProfile {
    fn config(self) -> Option<LoggingConfig> {
        match self {
            LogProfile::Development => Some(LoggingConfig::development()),
            LogProfile::Production => Some(LoggingConfig::production()),
            LogProfile::Testing => Some(LoggingConfig::testing()),
            LogProfile::Off => None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(config) = cli.log.config() {
        if let Err(e) = logging::init(config) {
            // Logging isn't available yet
            eprintln!("FATAL: Failed to initialize logging: {}", e);
            std::process::exit(1);
        }
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        database = %cli.database,
        table = %cli.table,
        "Starting tabula"
    );

    let settings = match &cli.settings {
        Some(path) => EngineSettings::load_from(path)?,
        None => EngineSettings::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to load settings, using defaults");
            EngineSettings::default()
        }),
    };

    let store: Arc<dyn ViewStateStore> = match &cli.view_state_dir {
        Some(dir) => Arc::new(JsonViewStateStore::new(dir)),
        None => match JsonViewStateStore::open_default() {
            Ok(store) => Arc::new(store),
            Err(e) => {
                tracing::warn!(error = %e, "view state will not be persisted");
                Arc::new(MemoryViewStateStore::new())
            }
        },
    };

    let gateway = Arc::new(
        SqliteGateway::open(&cli.database)
            .with_context(|| format!("Failed to open database {}", cli.database))?,
    );
    let cache = Arc::new(SnapshotCache::new(settings.snapshot_cache_ttl()));
    let mut editor = TableEditor::open(
        gateway,
        cache,
        TableId::parse(&cli.table),
        settings.editor_config(),
    )
    .await
    .with_context(|| format!("Failed to open table {}", cli.table))?
    .with_view_state_store(store);

    let script = match &cli.script {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read script {:?}", path))?,
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read script from stdin")?;
            text
        }
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for (index, line) in script.lines().enumerate() {
        let command = script::parse_line(line)
            .with_context(|| format!("line {}: {}", index + 1, line.trim()))?;
        if let Some(command) = command {
            session::run_command(&mut editor, command, &mut out).await?;
        }
    }

    editor
        .close()
        .await
        .context("Failed to flush pending writes")?;
    tracing::info!("Session finished");
    Ok(())
}
