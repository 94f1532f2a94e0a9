//! Monitor capability interface
//!
//! Every streaming detector is driven through [`Monitor`], one
//! [`FlowRecord`] at a time. Concrete variants are enumerated in
//! [`MonitorKind`]; wrappers in this module add deferred initialization
//! ([`LazyMonitor`]) and thread-safe sharing ([`SharedMonitor`],
//! [`ShardedMonitor`]).

mod lazy;
mod shared;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::DetectorConfig;
use crate::detector::{MidasR, ScoreMode};
use crate::error::{ConfigError, Result};
use crate::types::FlowRecord;

pub use lazy::LazyMonitor;
pub use shared::{ShardedMonitor, SharedMonitor};

// =============================================================================
// Monitor Trait
// =============================================================================

/// A streaming detector over directed edge events
///
/// Operations return [`Result`] so that variants needing an explicit
/// `initialize()` can report [`Error::NotInitialized`](crate::Error::NotInitialized).
pub trait Monitor: Send + fmt::Debug {
    /// Registry name of this detector
    fn name(&self) -> &'static str;

    /// Output transform; decides the direction of the threshold comparison
    fn mode(&self) -> ScoreMode;

    /// Prepare the detector for use (no-op for detectors built ready)
    fn initialize(&mut self) -> Result<()>;

    /// Whether `initialize()` has completed
    fn is_initialized(&self) -> bool;

    /// Feed one event
    fn update(&mut self, record: &FlowRecord) -> Result<()>;

    /// Score the record's edge without modifying state
    fn detect_score(&self, record: &FlowRecord) -> Result<f64>;

    /// Decide whether the record's edge is anomalous, without modifying state
    fn detect(&self, record: &FlowRecord) -> Result<bool> {
        let score = self.detect_score(record)?;
        Ok(self.mode().is_anomalous(score, self.threshold()?))
    }

    /// Feed one event and score it against the same state
    fn update_detect_score(&mut self, record: &FlowRecord) -> Result<f64> {
        self.update(record)?;
        self.detect_score(record)
    }

    /// Feed one event and decide
    fn update_detect(&mut self, record: &FlowRecord) -> Result<bool> {
        Ok(self.evaluate(record)?.1)
    }

    /// Feed one event and return both its score and the decision
    fn evaluate(&mut self, record: &FlowRecord) -> Result<(f64, bool)> {
        let score = self.update_detect_score(record)?;
        let anomalous = self.mode().is_anomalous(score, self.threshold()?);
        Ok((score, anomalous))
    }

    /// Decision threshold, in the same units as the scores
    fn threshold(&self) -> Result<f64>;
}

impl Monitor for MidasR {
    fn name(&self) -> &'static str {
        MonitorKind::MidasR.name()
    }

    fn mode(&self) -> ScoreMode {
        MidasR::mode(self)
    }

    fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        true
    }

    fn update(&mut self, record: &FlowRecord) -> Result<()> {
        MidasR::update(self, &record.src, &record.dst, record.count, record.timestamp);
        Ok(())
    }

    fn detect_score(&self, record: &FlowRecord) -> Result<f64> {
        Ok(MidasR::detect_score(self, &record.src, &record.dst))
    }

    fn detect(&self, record: &FlowRecord) -> Result<bool> {
        Ok(MidasR::detect(self, &record.src, &record.dst))
    }

    fn update_detect_score(&mut self, record: &FlowRecord) -> Result<f64> {
        Ok(MidasR::update_detect_score(
            self,
            &record.src,
            &record.dst,
            record.count,
            record.timestamp,
        ))
    }

    fn threshold(&self) -> Result<f64> {
        Ok(MidasR::threshold(self))
    }
}

// =============================================================================
// Variant Registry
// =============================================================================

/// Registered detector variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MonitorKind {
    /// Relational MIDAS with decayed current-tick counters
    #[default]
    MidasR,
}

impl MonitorKind {
    /// Every registered variant
    pub const ALL: [MonitorKind; 1] = [MonitorKind::MidasR];

    /// Registry name
    pub fn name(&self) -> &'static str {
        match self {
            MonitorKind::MidasR => "midas_r",
        }
    }

    /// Build a ready-to-use detector of this kind
    pub fn build(&self, config: &DetectorConfig) -> Result<Box<dyn Monitor>> {
        match self {
            MonitorKind::MidasR => Ok(Box::new(MidasR::new(config.midas.clone())?)),
        }
    }
}

impl fmt::Display for MonitorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MonitorKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| ConfigError::InvalidKind {
                name: s.to_string(),
                valid: Self::ALL.iter().map(MonitorKind::name).collect(),
            })
    }
}

impl TryFrom<String> for MonitorKind {
    type Error = ConfigError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MonitorKind> for String {
    fn from(kind: MonitorKind) -> Self {
        kind.name().to_string()
    }
}
