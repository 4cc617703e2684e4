//! Bridge configuration
//!
//! Read once per process from the TOML file named by `CALLBRIDGE_CONFIG`
//! (all sections optional), then adjusted by environment overrides:
//!
//! ```toml
//! [log]
//! level = "debug"
//! format = "compact"   # or "pretty", "json"
//! file = "/var/log/callbridge"
//! span_events = false
//! filter = "callbridge::dispatch=trace"
//!
//! [faults]
//! capture_backtrace = true
//!
//! [numeric]
//! compression_level = 3
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::Level;

use crate::logging::LogFormat;
use crate::numeric::DEFAULT_COMPRESSION_LEVEL;

/// Path of the configuration file
pub const CONFIG_ENV: &str = "CALLBRIDGE_CONFIG";
pub const LOG_LEVEL_ENV: &str = "CALLBRIDGE_LOG_LEVEL";
pub const LOG_JSON_ENV: &str = "CALLBRIDGE_LOG_JSON";
pub const LOG_FILE_ENV: &str = "CALLBRIDGE_LOG_FILE";

static CONFIG: OnceCell<BridgeConfig> = OnceCell::new();

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub log: LogSettings,

    #[serde(default)]
    pub faults: FaultSettings,

    #[serde(default)]
    pub numeric: NumericSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    /// Directory for daily rotated log files; stderr when unset
    #[serde(default)]
    pub file: Option<PathBuf>,

    #[serde(default)]
    pub span_events: bool,

    /// Extra filter directives, e.g. "callbridge::dispatch=trace"
    #[serde(default)]
    pub filter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultSettings {
    #[serde(default = "default_true")]
    pub capture_backtrace: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumericSettings {
    #[serde(default = "default_compression_level")]
    pub compression_level: i32,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            file: None,
            span_events: false,
            filter: None,
        }
    }
}

impl Default for FaultSettings {
    fn default() -> Self {
        Self {
            capture_backtrace: true,
        }
    }
}

impl Default for NumericSettings {
    fn default() -> Self {
        Self {
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

fn default_level() -> String { "info".to_string() }
fn default_true() -> bool { true }
fn default_compression_level() -> i32 { DEFAULT_COMPRESSION_LEVEL }

impl LogSettings {
    /// Parsed `level`
    pub fn level(&self) -> Result<Level, ConfigError> {
        self.level
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("unknown log level {:?}", self.level)))
    }
}

impl BridgeConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// File named by `CALLBRIDGE_CONFIG` (or defaults) plus environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply `CALLBRIDGE_LOG_*` overrides from `var`
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(level) = var(LOG_LEVEL_ENV) {
            self.log.level = level.to_lowercase();
        }
        if let Some(json) = var(LOG_JSON_ENV) {
            if json == "1" || json.eq_ignore_ascii_case("true") {
                self.log.format = LogFormat::Json;
            } else if self.log.format == LogFormat::Json {
                self.log.format = LogFormat::Compact;
            }
        }
        if let Some(file) = var(LOG_FILE_ENV) {
            self.log.file = Some(PathBuf::from(file));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.log.level()?;
        let range = zstd::compression_level_range();
        if !range.contains(&self.numeric.compression_level) {
            return Err(ConfigError::Invalid(format!(
                "compression_level {} outside {:?}",
                self.numeric.compression_level, range
            )));
        }
        Ok(())
    }
}

/// Install `config` as the process configuration; false if one is already set
pub fn init(config: BridgeConfig) -> bool {
    CONFIG.set(config).is_ok()
}

/// Process configuration, loaded on first use.
///
/// A file that fails to load is reported once on stderr and replaced by
/// the defaults, since no subscriber exists yet at that point.
pub fn get() -> &'static BridgeConfig {
    CONFIG.get_or_init(|| {
        BridgeConfig::load().unwrap_or_else(|err| {
            eprintln!("callbridge: {}; using defaults", err);
            BridgeConfig::default()
        })
    })
}
