//! Configuration management for kuba-burst
//!
//! TOML file support, environment variable overrides and defaults. Every
//! section and field is optional; a missing file section falls back to its
//! `Default`.
//!
//! ```toml
//! [detector]
//! kind = "midas_r"
//! alpha = 0.01
//! mode = "pvalue"
//!
//! [ingestion]
//! delimiter = "\t"
//! header = "present"
//! speed = 10.0
//!
//! [report]
//! format = "jsonl"
//! anomalies_only = true
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::detector::MidasConfig;
use crate::error::ConfigError;
use crate::ingestion::{HeaderMode, ReplayConfig, TableConfig};
use crate::monitor::MonitorKind;
use crate::report::ReportFormat;

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "BURST_CONFIG";

/// Config file picked up from the working directory when nothing else is set
pub const DEFAULT_CONFIG_FILE: &str = "burst.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Detector selection and parameters
    #[serde(default)]
    pub detector: DetectorConfig,

    /// Flow table parsing and replay
    #[serde(default)]
    pub ingestion: IngestionConfig,

    /// Report output
    #[serde(default)]
    pub report: ReportConfig,

    /// Logging
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

/// Detector configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct DetectorConfig {
    /// Registered detector variant
    #[serde(default)]
    pub kind: MonitorKind,

    /// MIDAS-R parameters, inlined into the `[detector]` table
    #[serde(flatten)]
    pub midas: MidasConfig,
}

/// Ingestion configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct IngestionConfig {
    /// Column separator, a single ASCII character
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// Header row handling
    #[serde(default)]
    pub header: HeaderMode,

    /// Replay speed (absent = as fast as possible)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,

    /// Leading records to drop
    #[serde(default)]
    pub skip: usize,

    /// Maximum records to replay (absent = all)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,

    /// Skip malformed lines with a warning instead of aborting
    #[serde(default)]
    pub lenient: bool,
}

/// Report configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ReportConfig {
    /// Output encoding
    #[serde(default)]
    pub format: ReportFormat,

    /// Only write anomalous records
    #[serde(default)]
    pub anomalies_only: bool,
}

/// Monitoring configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MonitoringConfig {
    /// Log level or `EnvFilter` directive (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Include the event target in log lines
    #[serde(default = "default_true")]
    pub log_target: bool,
}

// Default value functions
fn default_delimiter() -> char {
    ','
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            header: HeaderMode::Auto,
            speed: None,
            skip: 0,
            limit: None,
            lenient: false,
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_target: true,
        }
    }
}

impl IngestionConfig {
    /// Parser settings for [`FlowTableReader`](crate::ingestion::FlowTableReader)
    ///
    /// [`Config::validate`] rejects non-ASCII delimiters; one that slips
    /// through falls back to `,`.
    pub fn table_config(&self) -> TableConfig {
        let delimiter = u8::try_from(self.delimiter).unwrap_or(b',');
        TableConfig::default()
            .with_delimiter(delimiter)
            .with_header(self.header)
    }

    /// Replay settings for [`FlowReplayer`](crate::ingestion::FlowReplayer)
    pub fn replay_config(&self) -> ReplayConfig {
        ReplayConfig {
            speed: self.speed,
            skip: self.skip,
            limit: self.limit,
            lenient: self.lenient,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let load_error = |message: String| ConfigError::Load {
            path: path.display().to_string(),
            message,
        };

        let contents = std::fs::read_to_string(path).map_err(|e| load_error(e.to_string()))?;
        toml::from_str(&contents).map_err(|e| load_error(e.to_string()))
    }

    /// Load a file, apply environment overrides, then validate
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    ///
    /// Unparseable numbers are ignored; an unknown `BURST_MODE` is an error.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        let detector = &mut self.detector.midas;
        if let Some(alpha) = env_parse("BURST_ALPHA") {
            detector.alpha = alpha;
        }
        if let Some(decay) = env_parse("BURST_DECAY") {
            detector.decay = decay;
        }
        if let Some(ticksize) = env_parse("BURST_TICKSIZE") {
            detector.ticksize = ticksize;
        }
        if let Ok(mode) = std::env::var("BURST_MODE") {
            detector.mode = mode.parse()?;
        }

        // Monitoring
        if let Ok(level) = std::env::var("BURST_LOG_LEVEL") {
            self.monitoring.log_level = level;
        }
        if let Ok(level) = std::env::var("RUST_LOG") {
            self.monitoring.log_level = level;
        }
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.detector.midas.validate()?;

        if let Some(speed) = self.ingestion.speed {
            if speed.is_nan() || speed < 0.0 {
                return Err(ConfigError::out_of_range("speed", speed, "[0, inf]"));
            }
        }
        let delimiter = self.ingestion.delimiter;
        if !delimiter.is_ascii() || matches!(delimiter, '\n' | '\r' | '#' | '"') {
            return Err(ConfigError::out_of_range(
                "delimiter",
                delimiter.escape_default(),
                "an ASCII character other than newline, '#' and '\"'",
            ));
        }
        if self.monitoring.log_level.trim().is_empty() {
            return Err(ConfigError::out_of_range("log_level", "\"\"", "non-empty"));
        }
        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(self).map_err(|e| ConfigError::Load {
            path: path.display().to_string(),
            message: format!("Failed to serialize config: {}", e),
        })?;

        std::fs::write(path, contents).map_err(|e| ConfigError::Load {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
