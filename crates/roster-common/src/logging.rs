//! Logging setup built on `tracing`.
//!
//! Everything is configured from the environment:
//!
//! | Variable          | Values                     | Default        |
//! |-------------------|----------------------------|----------------|
//! | `LOG_LEVEL`       | trace, debug, info, warn, error | info      |
//! | `LOG_OUTPUT`      | console, file, both        | console        |
//! | `LOG_FORMAT`      | text, json                 | text           |
//! | `LOG_DIR`         | directory for rolling files| `logs`         |
//! | `LOG_FILE_PREFIX` | rolling file name prefix   | `roster`       |
//! | `LOG_FILTER`      | `EnvFilter` directives     | unset          |
//!
//! `RUST_LOG` still wins when set, the same way `EnvFilter` always treats it.

use std::path::PathBuf;
use std::str::FromStr;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::error::{Result, RosterError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Console,
    File,
    Both,
}

impl LogOutput {
    fn console(self) -> bool {
        matches!(self, LogOutput::Console | LogOutput::Both)
    }

    fn file(self) -> bool {
        matches!(self, LogOutput::File | LogOutput::Both)
    }
}

impl FromStr for LogOutput {
    type Err = RosterError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "console" | "stdout" => Ok(LogOutput::Console),
            "file" => Ok(LogOutput::File),
            "both" => Ok(LogOutput::Both),
            other => Err(RosterError::Config(format!("invalid LOG_OUTPUT: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = RosterError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(RosterError::Config(format!("invalid LOG_FORMAT: {other}"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    pub output: LogOutput,
    pub format: LogFormat,
    pub log_dir: PathBuf,
    pub file_prefix: String,
    /// Extra `EnvFilter` directives, e.g. `roster_server=debug,sqlx=warn`.
    pub directives: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            output: LogOutput::Console,
            format: LogFormat::Text,
            log_dir: PathBuf::from("logs"),
            file_prefix: "roster".to_string(),
            directives: None,
        }
    }
}

impl LogConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.level = level
                .parse()
                .map_err(|_| RosterError::Config(format!("invalid LOG_LEVEL: {level}")))?;
        }
        if let Ok(output) = std::env::var("LOG_OUTPUT") {
            config.output = output.parse()?;
        }
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            config.format = format.parse()?;
        }
        if let Ok(dir) = std::env::var("LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }
        if let Ok(prefix) = std::env::var("LOG_FILE_PREFIX") {
            config.file_prefix = prefix;
        }
        config.directives = std::env::var("LOG_FILTER").ok().filter(|d| !d.is_empty());

        Ok(config)
    }

    pub fn with_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = prefix.into();
        self
    }

    /// Directives used only when `LOG_FILTER` did not provide any.
    pub fn with_default_directives(mut self, directives: impl Into<String>) -> Self {
        if self.directives.is_none() {
            self.directives = Some(directives.into());
        }
        self
    }

    fn env_filter(&self) -> Result<EnvFilter> {
        let mut filter = EnvFilter::from_default_env().add_directive(self.level.into());
        for raw in self.directives.iter().flat_map(|d| d.split(',')) {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            let directive: Directive = raw
                .parse()
                .map_err(|e| RosterError::Config(format!("invalid log directive {raw:?}: {e}")))?;
            filter = filter.add_directive(directive);
        }
        Ok(filter)
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

fn fmt_layer<W>(format: LogFormat, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer().with_writer(writer).with_ansi(ansi).with_target(true);
    match format {
        LogFormat::Text => layer.boxed(),
        LogFormat::Json => layer.json().boxed(),
    }
}

/// Installs the global subscriber.
///
/// When file output is enabled the returned guard must be held for the life
/// of the process, dropping it stops the background writer.
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let filter = config.env_filter()?;
    let mut layers: Vec<BoxedLayer> = Vec::new();
    let mut guard = None;

    if config.output.console() {
        layers.push(fmt_layer(config.format, std::io::stdout, true));
    }

    if config.output.file() {
        std::fs::create_dir_all(&config.log_dir)?;
        let appender = tracing_appender::rolling::daily(&config.log_dir, &config.file_prefix);
        let (writer, worker_guard) = tracing_appender::non_blocking(appender);
        layers.push(fmt_layer(config.format, writer, false));
        guard = Some(worker_guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| RosterError::Config(format!("failed to install subscriber: {e}")))?;

    tracing::debug!(
        level = %config.level,
        output = ?config.output,
        format = ?config.format,
        "logging initialized"
    );

    Ok(guard)
}
