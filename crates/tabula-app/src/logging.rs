//! Subscriber setup for the tabula binary.
//!
//! Human-readable events go to stderr, leaving stdout to the script. When a
//! log directory is set, every event is also appended as JSON to a file
//! that rolls over daily.

use std::path::PathBuf;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

const ENGINE_CRATES: &[&str] = &[
    "tabula_app",
    "tabula_core",
    "tabula_grid",
    "tabula_services",
    "tabula_settings",
    "tabula_driver_sqlite",
];

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Pretty events on stderr
    pub console: bool,
    /// Daily JSON files under this directory
    pub json_dir: Option<PathBuf>,
    /// Source locations and span open/close events
    pub verbose: bool,
    /// Used when `RUST_LOG` is unset
    pub filter: String,
}

impl LoggingConfig {
    /// Console and JSON files, engine crates at debug
    pub fn development() -> Self {
        Self {
            console: true,
            json_dir: Some(log_directory()),
            verbose: cfg!(debug_assertions),
            filter: engine_filter("info", "debug"),
        }
    }

    /// JSON files only; warnings plus synchronized writes
    pub fn production() -> Self {
        Self {
            console: false,
            json_dir: Some(log_directory()),
            verbose: false,
            filter: engine_filter("warn", "info"),
        }
    }

    /// Everything to stderr, nothing on disk
    pub fn testing() -> Self {
        Self {
            console: true,
            json_dir: None,
            verbose: true,
            filter: "debug".to_string(),
        }
    }
}

fn engine_filter(default: &str, engine: &str) -> String {
    std::iter::once(default.to_string())
        .chain(ENGINE_CRATES.iter().map(|c| format!("{c}={engine}")))
        .collect::<Vec<_>>()
        .join(",")
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(config: LoggingConfig) -> anyhow::Result<()> {
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter))
    };
    // ENTER would fire on every poll of an instrumented future
    let spans = if config.verbose {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let mut layers = Vec::new();
    if config.console {
        layers.push(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_file(config.verbose)
                .with_line_number(config.verbose)
                .with_span_events(spans.clone())
                .pretty()
                .with_filter(filter())
                .boxed(),
        );
    }
    if let Some(dir) = &config.json_dir {
        std::fs::create_dir_all(dir)?;
        let (writer, guard) =
            tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "tabula.log"));
        // lives for the rest of the process
        std::mem::forget(guard);
        layers.push(
            fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_span_events(spans)
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(filter())
                .boxed(),
        );
    }

    tracing_subscriber::registry().with(layers).try_init()?;
    tracing::info!(
        console = config.console,
        json_dir = ?config.json_dir,
        "Logging system initialized"
    );
    Ok(())
}

pub fn log_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tabula")
        .join("logs")
}
