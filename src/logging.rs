//! Logging infrastructure - structured tracing for the bridge
//!
//! Design: `tracing` events everywhere, one subscriber installed on demand
//! from the `[log]` configuration:
//! - env filter (`RUST_LOG` plus the configured level and directives)
//! - pretty, compact or JSON output
//! - stderr or daily rotated files, written through a non-blocking worker
//!
//! A host process that already installed a global subscriber keeps it;
//! initialization then becomes a no-op.

use std::path::Path;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

use crate::config::{ConfigError, LogSettings};

static LOGGER_INITIALIZED: OnceCell<bool> = OnceCell::new();
static GUARD: Mutex<Option<WorkerGuard>> = parking_lot::const_mutex(None);

/// Log output format, `format = "pretty" | "compact" | "json"` in `[log]`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, multi-line
    Pretty,
    /// One line per event
    #[default]
    Compact,
    /// JSON objects for structured collection
    Json,
}

/// Log output destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    Stderr,
    /// Daily rotated files
    File { directory: String, prefix: String },
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Emit span open/close events
    pub span_events: bool,
    /// Extra filter directives (e.g., "callbridge::registry=debug")
    pub filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Compact,
            output: LogOutput::Stderr,
            span_events: false,
            filter: None,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Translate the `[log]` configuration section
    pub fn from_settings(settings: &LogSettings) -> Result<Self, ConfigError> {
        let output = match &settings.file {
            Some(directory) => LogOutput::File {
                directory: directory.to_string_lossy().into_owned(),
                prefix: "callbridge.log".to_string(),
            },
            None => LogOutput::Stderr,
        };
        Ok(Self {
            level: settings.level()?,
            format: settings.format,
            output,
            span_events: settings.span_events,
            filter: settings.filter.clone(),
        })
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Daily rotated files under `directory`
    pub fn with_log_dir(self, directory: impl AsRef<Path>) -> Self {
        self.with_output(LogOutput::File {
            directory: directory.as_ref().to_string_lossy().into_owned(),
            prefix: "callbridge.log".to_string(),
        })
    }
}

/// Initialize logging from the process configuration
pub fn init() -> Result<bool, ConfigError> {
    let config = LogConfig::from_settings(&crate::config::get().log)?;
    Ok(init_with_config(config))
}

/// Install the global subscriber once.
///
/// Returns whether this call's subscriber is the active one; false when
/// another subscriber was installed first.
pub fn init_with_config(config: LogConfig) -> bool {
    *LOGGER_INITIALIZED.get_or_init(|| {
        let (writer, guard) = match &config.output {
            LogOutput::Stderr => tracing_appender::non_blocking(std::io::stderr()),
            LogOutput::File { directory, prefix } => {
                tracing_appender::non_blocking(rolling::daily(directory, prefix))
            }
        };

        let installed = tracing_subscriber::registry()
            .with(fmt_layer(&config, writer))
            .try_init()
            .is_ok();
        if installed {
            *GUARD.lock() = Some(guard);
        }
        installed
    })
}

pub fn is_initialized() -> bool {
    LOGGER_INITIALIZED.get().is_some()
}

/// Flush buffered events and stop the writer thread
pub fn shutdown() {
    drop(GUARD.lock().take());
}

fn fmt_layer(config: &LogConfig, writer: NonBlocking) -> Box<dyn Layer<Registry> + Send + Sync> {
    let filter = build_filter(config);
    let layer = fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_span_events(span_events_config(config.span_events));

    match config.format {
        LogFormat::Pretty => layer.pretty().with_filter(filter).boxed(),
        LogFormat::Compact => layer.compact().with_filter(filter).boxed(),
        LogFormat::Json => layer.json().with_filter(filter).boxed(),
    }
}

fn build_filter(config: &LogConfig) -> EnvFilter {
    let base_filter = EnvFilter::from_default_env().add_directive(config.level.into());

    match &config.filter {
        Some(filter_str) => filter_str
            .split(',')
            .map(str::trim)
            .filter(|directive| !directive.is_empty())
            .fold(base_filter, |filter, directive| match directive.parse() {
                Ok(directive) => filter.add_directive(directive),
                Err(_) => {
                    eprintln!("callbridge: ignoring invalid filter directive {:?}", directive);
                    filter
                }
            }),
        None => base_filter,
    }
}

fn span_events_config(enabled: bool) -> FmtSpan {
    if enabled {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    }
}

// ============================================================================
// Bridge events
// ============================================================================

/// Log bridge initialization
pub fn log_bridge_init(functions: usize) {
    tracing::info!(
        event = "bridge_init",
        functions = functions,
        "callbridge initialized"
    );
}

/// Log an incoming foreign call
pub fn log_ffi_call(function: &str, args: usize, bytes: usize) {
    tracing::debug!(
        event = "ffi_call",
        function = function,
        args = args,
        bytes = bytes,
        "FFI call received"
    );
}

/// Log a request rejected before dispatch
pub fn log_ffi_error(error: &str) {
    tracing::error!(event = "ffi_error", error = error, "FFI request rejected");
}

/// Log bootstrap hook execution
pub fn log_main(overridden: bool) {
    tracing::info!(event = "main", overridden = overridden, "running main hook");
}
