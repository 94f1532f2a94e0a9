//! Deferred-initialization monitor

use tracing::debug;

use super::{Monitor, MonitorKind};
use crate::config::DetectorConfig;
use crate::detector::ScoreMode;
use crate::error::{Error, Result};
use crate::types::FlowRecord;

/// Holds a detector configuration and builds the detector on `initialize()`
///
/// Every operation other than `initialize`, `is_initialized`, `name` and
/// `mode` fails with [`Error::NotInitialized`] until then. Configuration
/// errors surface from `initialize()`.
#[derive(Debug)]
pub struct LazyMonitor {
    config: DetectorConfig,
    inner: Option<Box<dyn Monitor>>,
}

impl LazyMonitor {
    /// Wrap a configuration without building anything
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            inner: None,
        }
    }

    /// Configuration the detector will be built from
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    fn ready(&self, operation: &'static str) -> Result<&dyn Monitor> {
        self.inner
            .as_deref()
            .ok_or(Error::NotInitialized { operation })
    }

    fn ready_mut(&mut self, operation: &'static str) -> Result<&mut Box<dyn Monitor>> {
        self.inner
            .as_mut()
            .ok_or(Error::NotInitialized { operation })
    }
}

impl Monitor for LazyMonitor {
    fn name(&self) -> &'static str {
        self.config.kind.name()
    }

    fn mode(&self) -> ScoreMode {
        self.config.midas.mode
    }

    fn initialize(&mut self) -> Result<()> {
        if self.inner.is_none() {
            let kind: MonitorKind = self.config.kind;
            self.inner = Some(kind.build(&self.config)?);
            debug!(kind = %kind, "Lazy monitor initialized");
        }
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.inner.is_some()
    }

    fn update(&mut self, record: &FlowRecord) -> Result<()> {
        self.ready_mut("update")?.update(record)
    }

    fn detect_score(&self, record: &FlowRecord) -> Result<f64> {
        self.ready("detect_score")?.detect_score(record)
    }

    fn detect(&self, record: &FlowRecord) -> Result<bool> {
        self.ready("detect")?.detect(record)
    }

    fn update_detect_score(&mut self, record: &FlowRecord) -> Result<f64> {
        self.ready_mut("update_detect_score")?
            .update_detect_score(record)
    }

    fn update_detect(&mut self, record: &FlowRecord) -> Result<bool> {
        self.ready_mut("update_detect")?.update_detect(record)
    }

    fn evaluate(&mut self, record: &FlowRecord) -> Result<(f64, bool)> {
        self.ready_mut("evaluate")?.evaluate(record)
    }

    fn threshold(&self) -> Result<f64> {
        self.ready("threshold")?.threshold()
    }
}
