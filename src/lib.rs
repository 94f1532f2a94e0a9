//! kuba-burst - Streaming edge-burst anomaly detection
//!
//! This library scores a stream of directed edge events `(src, dst, t)` for
//! sudden bursts of activity, using MIDAS-R:
//! - Fixed-memory count-min sketches for edges, sources and destinations
//! - Decayed current-tick counters against all-time counters
//! - Chi-squared(1) decision threshold with raw / log / p-value outputs
//! - Flow-table ingestion, paced replay and CSV / JSON-lines reports

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod sketch;
pub mod types;

/// MIDAS-R detector, score transforms and chi-squared helpers
pub mod detector;

/// Monitor trait, variant registry and thread-safe wrappers
pub mod monitor;

/// Configuration management with TOML support
pub mod config;

/// Flow-table reading and paced replay
pub mod ingestion;

/// Score records, writers and per-tick summaries
pub mod report;

// Re-export main types
pub use config::{Config, DetectorConfig};
pub use detector::{MidasConfig, MidasR, ScoreMode};
pub use error::{Error, Result};
pub use monitor::{Monitor, MonitorKind};
pub use types::{FlowRecord, NodeId};
