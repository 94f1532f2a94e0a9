//! Per-dimension counters (current tick + all time)

use crate::sketch::CountMinSketch;
use std::hash::Hash;

/// Pair of sketches tracking one dimension (edge, source or destination)
///
/// `total` accumulates every observation since the stream started. `current`
/// holds the active tick and is decayed, or cleared when `decay == 0`, once
/// per tick transition.
#[derive(Debug, Clone)]
pub struct DimensionTracker {
    current: CountMinSketch,
    total: CountMinSketch,
    decay: f64,
}

impl DimensionTracker {
    /// Create a tracker with two identically sized sketches
    pub fn new(error_rate: f64, confidence: f64, decay: f64) -> Self {
        Self {
            current: CountMinSketch::new(error_rate, confidence),
            total: CountMinSketch::new(error_rate, confidence),
            decay,
        }
    }

    /// Record `count` events for `key`
    ///
    /// The caller owns the tick decision: every tracker of a detector must be
    /// handed the same `tick_advanced` flag for the same event.
    pub fn observe<K: Hash + ?Sized>(&mut self, key: &K, count: f64, tick_advanced: bool) {
        if tick_advanced {
            self.apply_decay();
        }
        self.current.add(key, count);
        self.total.add(key, count);
    }

    /// `(current_estimate, total_estimate)` for `key`
    pub fn score_inputs<K: Hash + ?Sized>(&self, key: &K) -> (f64, f64) {
        (self.current.check(key), self.total.check(key))
    }

    /// Current-tick sketch
    pub fn current(&self) -> &CountMinSketch {
        &self.current
    }

    /// All-time sketch
    pub fn total(&self) -> &CountMinSketch {
        &self.total
    }

    /// Memory used by both sketches in bytes
    pub fn memory_usage(&self) -> usize {
        self.current.memory_usage() + self.total.memory_usage()
    }

    fn apply_decay(&mut self) {
        if self.decay == 0.0 {
            self.current.clear();
        } else {
            self.current.decay(self.decay);
        }
    }
}
