//! Error types for the burst detector

use thiserror::Error;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error (fatal at construction time)
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// A monitor was used before `initialize()` was called
    #[error("Monitor not initialized: call initialize() before {operation}")]
    NotInitialized {
        /// Operation that was attempted
        operation: &'static str,
    },

    /// Ingestion error (malformed flow records)
    #[error("Ingestion error: {0}")]
    Ingestion(#[from] IngestionError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Self {
        let line = e.position().map_or(0, |p| p.line() as usize);
        let message = e.to_string();
        match e.into_kind() {
            csv::ErrorKind::Io(io) => Error::Io(io),
            _ => IngestionError::Malformed { line, message }.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Configuration errors
///
/// Raised synchronously while building a detector or loading a config file.
/// None of these are retryable: the caller has to fix the configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Value is out of allowed range
    #[error("{field} value {value} is out of range {range}")]
    OutOfRange {
        /// Field name being validated
        field: &'static str,
        /// The invalid value
        value: String,
        /// Allowed range, in interval notation
        range: &'static str,
    },

    /// Unknown output-transform mode
    #[error("Invalid mode '{mode}'. Must be one of {valid:?}")]
    InvalidMode {
        /// The requested mode
        mode: String,
        /// Every accepted mode name, sorted
        valid: Vec<&'static str>,
    },

    /// Unknown aggregation function
    #[error("Invalid aggregation '{name}'. Must be one of {valid:?}")]
    InvalidAggregation {
        /// The requested aggregation
        name: String,
        /// Every accepted aggregation name
        valid: Vec<&'static str>,
    },

    /// Unknown monitor variant
    #[error("Invalid monitor kind '{name}'. Must be one of {valid:?}")]
    InvalidKind {
        /// The requested kind
        name: String,
        /// Every registered kind
        valid: Vec<&'static str>,
    },

    /// Unknown report format
    #[error("Invalid report format '{name}'. Must be one of {valid:?}")]
    InvalidFormat {
        /// The requested format
        name: String,
        /// Every supported format
        valid: Vec<&'static str>,
    },

    /// Config file could not be read or parsed
    #[error("Failed to load config {path}: {message}")]
    Load {
        /// Path of the config file
        path: String,
        /// Underlying failure
        message: String,
    },
}

impl ConfigError {
    /// Shorthand for an out-of-range field
    pub fn out_of_range(field: &'static str, value: impl ToString, range: &'static str) -> Self {
        ConfigError::OutOfRange {
            field,
            value: value.to_string(),
            range,
        }
    }
}

/// Ingestion errors
///
/// Line numbers are 1-based and point at the line where the offending row
/// starts.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IngestionError {
    /// A required column is missing
    #[error("line {line}: missing {field} column")]
    MissingField {
        /// Line number
        line: usize,
        /// Column name
        field: &'static str,
    },

    /// Timestamp column is not a finite number
    #[error("line {line}: invalid timestamp '{value}'")]
    InvalidTimestamp {
        /// Line number
        line: usize,
        /// Raw column text
        value: String,
    },

    /// The row could not be decoded (bad quoting, invalid UTF-8)
    #[error("line {line}: {message}")]
    Malformed {
        /// Line number
        line: usize,
        /// Decoder message
        message: String,
    },

    /// A node identifier column is empty
    #[error("line {line}: empty {field} identifier")]
    EmptyNode {
        /// Line number
        line: usize,
        /// Column name
        field: &'static str,
    },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_display() {
        let err = ConfigError::out_of_range("decay", 1.5, "[0, 1]");
        assert_eq!(err.to_string(), "decay value 1.5 is out of range [0, 1]");
    }

    #[test]
    fn test_invalid_mode_lists_valid_set() {
        let err = ConfigError::InvalidMode {
            mode: "zscore".to_string(),
            valid: vec!["log", "pvalue", "raw"],
        };
        let msg = err.to_string();
        assert!(msg.contains("zscore"));
        assert!(msg.contains("\"log\", \"pvalue\", \"raw\""));
    }

    #[test]
    fn test_config_error_converts() {
        let err: Error = ConfigError::out_of_range("alpha", 0.0, "(0, 1)").into();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().starts_with("Configuration error: alpha"));
    }

    #[test]
    fn test_not_initialized_display() {
        let err = Error::NotInitialized { operation: "update" };
        assert_eq!(
            err.to_string(),
            "Monitor not initialized: call initialize() before update"
        );
    }

    #[test]
    fn test_ingestion_error_display() {
        let err = IngestionError::InvalidTimestamp {
            line: 7,
            value: "abc".to_string(),
        };
        assert_eq!(err.to_string(), "line 7: invalid timestamp 'abc'");
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
