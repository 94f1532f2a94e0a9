//! Thread-safe monitor handles
//!
//! Detectors take `&mut self` for updates. [`SharedMonitor`] serializes all
//! producers behind one lock; [`ShardedMonitor`] partitions the key space by
//! source node so producers touching different sources rarely contend.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{Monitor, MonitorKind};
use crate::config::DetectorConfig;
use crate::error::{ConfigError, Result};
use crate::types::{FlowRecord, NodeId};

// =============================================================================
// SharedMonitor
// =============================================================================

/// Cloneable handle to one monitor behind a mutex
///
/// Each call holds the lock for the whole operation, so the tick check, the
/// decay and the three sketch updates of one event are never interleaved
/// with another producer's.
#[derive(Debug)]
pub struct SharedMonitor<M: Monitor> {
    inner: Arc<Mutex<M>>,
}

impl<M: Monitor> Clone for SharedMonitor<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M: Monitor> SharedMonitor<M> {
    /// Wrap a monitor
    pub fn new(monitor: M) -> Self {
        Self {
            inner: Arc::new(Mutex::new(monitor)),
        }
    }

    /// Run `f` with exclusive access to the monitor
    pub fn with<R>(&self, f: impl FnOnce(&mut M) -> R) -> R {
        f(&mut *self.inner.lock())
    }

    /// See [`Monitor::initialize`]
    pub fn initialize(&self) -> Result<()> {
        self.inner.lock().initialize()
    }

    /// See [`Monitor::update`]
    pub fn update(&self, record: &FlowRecord) -> Result<()> {
        self.inner.lock().update(record)
    }

    /// See [`Monitor::detect_score`]
    pub fn detect_score(&self, record: &FlowRecord) -> Result<f64> {
        self.inner.lock().detect_score(record)
    }

    /// See [`Monitor::detect`]
    pub fn detect(&self, record: &FlowRecord) -> Result<bool> {
        self.inner.lock().detect(record)
    }

    /// See [`Monitor::update_detect_score`]
    pub fn update_detect_score(&self, record: &FlowRecord) -> Result<f64> {
        self.inner.lock().update_detect_score(record)
    }

    /// See [`Monitor::update_detect`]
    pub fn update_detect(&self, record: &FlowRecord) -> Result<bool> {
        self.inner.lock().update_detect(record)
    }

    /// See [`Monitor::evaluate`]
    pub fn evaluate(&self, record: &FlowRecord) -> Result<(f64, bool)> {
        self.inner.lock().evaluate(record)
    }

    /// See [`Monitor::threshold`]
    pub fn threshold(&self) -> Result<f64> {
        self.inner.lock().threshold()
    }

    /// Unwrap the monitor if this is the last handle
    pub fn try_unwrap(self) -> std::result::Result<M, Self> {
        Arc::try_unwrap(self.inner)
            .map(Mutex::into_inner)
            .map_err(|inner| Self { inner })
    }
}

// =============================================================================
// ShardedMonitor
// =============================================================================

/// Independent monitors partitioned by hash of the source node
///
/// Every event of a given source lands on the same shard. Shards keep their
/// own clocks and counters, so a destination's score only reflects traffic
/// from sources in its shard.
#[derive(Debug)]
pub struct ShardedMonitor {
    shards: Vec<Mutex<Box<dyn Monitor>>>,
}

impl ShardedMonitor {
    /// Build `shards` monitors from one configuration
    pub fn new(config: &DetectorConfig, shards: usize) -> Result<Self> {
        if shards == 0 {
            return Err(ConfigError::out_of_range("shards", shards, "[1, inf)").into());
        }
        let kind: MonitorKind = config.kind;
        let shards = (0..shards)
            .map(|_| kind.build(config).map(Mutex::new))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { shards })
    }

    /// Number of shards
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Shard index responsible for `src`
    pub fn shard_for(&self, src: &NodeId) -> usize {
        let mut hasher = DefaultHasher::new();
        src.hash(&mut hasher);
        (hasher.finish() % self.shards.len() as u64) as usize
    }

    fn shard(&self, record: &FlowRecord) -> &Mutex<Box<dyn Monitor>> {
        &self.shards[self.shard_for(&record.src)]
    }

    /// See [`Monitor::update`]
    pub fn update(&self, record: &FlowRecord) -> Result<()> {
        self.shard(record).lock().update(record)
    }

    /// See [`Monitor::detect_score`]
    pub fn detect_score(&self, record: &FlowRecord) -> Result<f64> {
        self.shard(record).lock().detect_score(record)
    }

    /// See [`Monitor::detect`]
    pub fn detect(&self, record: &FlowRecord) -> Result<bool> {
        self.shard(record).lock().detect(record)
    }

    /// See [`Monitor::update_detect_score`]
    pub fn update_detect_score(&self, record: &FlowRecord) -> Result<f64> {
        self.shard(record).lock().update_detect_score(record)
    }

    /// See [`Monitor::update_detect`]
    pub fn update_detect(&self, record: &FlowRecord) -> Result<bool> {
        self.shard(record).lock().update_detect(record)
    }

    /// See [`Monitor::evaluate`]
    pub fn evaluate(&self, record: &FlowRecord) -> Result<(f64, bool)> {
        self.shard(record).lock().evaluate(record)
    }

    /// Threshold shared by every shard
    pub fn threshold(&self) -> Result<f64> {
        self.shards[0].lock().threshold()
    }
}
