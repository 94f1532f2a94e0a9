//! Count-Min sketch with real-valued bins
//!
//! A fixed-size frequency estimator. Each of the `depth` rows maps a key to one
//! of `width` bins; `check` returns the minimum over the rows, so the estimate
//! can only overshoot the true count (hash collisions add, never subtract).
//!
//! # Sizing
//!
//! - `width = ceil(e / error_rate)`: the overestimate is at most
//!   `error_rate * total_added`...
//! - `depth = ceil(ln(1 / (1 - confidence)))`: ...with probability `confidence`.
//!
//! Bins are `f64` so they can be scaled in place by a decay factor.
//!
//! # Example
//!
//! ```rust
//! use kuba_burst::sketch::CountMinSketch;
//!
//! let mut cms = CountMinSketch::new(0.01, 0.99);
//! cms.add(&"10.0.0.1", 3.0);
//! assert!(cms.check(&"10.0.0.1") >= 3.0);
//!
//! cms.decay(0.5);
//! assert!(cms.check(&"10.0.0.1") >= 1.5);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Count-Min sketch over `f64` bins
#[derive(Debug, Clone)]
pub struct CountMinSketch {
    /// Row-major bin matrix: `bins[row * width + col]`
    bins: Vec<f64>,
    /// Number of bins per row
    width: usize,
    /// Number of hash rows
    depth: usize,
    /// Sum of all counts added, scaled along with the bins
    total: f64,
}

impl CountMinSketch {
    /// Create a sketch from an additive error rate and a confidence level
    ///
    /// # Arguments
    ///
    /// * `error_rate` - Overestimation bound relative to total mass, in (0, 1)
    /// * `confidence` - Probability that the bound holds, in (0, 1)
    ///
    /// Out-of-range inputs are clamped so the sketch always has at least one
    /// bin and one row; callers validate configuration before getting here.
    pub fn new(error_rate: f64, confidence: f64) -> Self {
        let (width, depth) = Self::dimensions(error_rate, confidence);
        Self::with_dimensions(width, depth)
    }

    /// Create a sketch with explicit dimensions
    pub fn with_dimensions(width: usize, depth: usize) -> Self {
        let width = width.max(1);
        let depth = depth.max(1);
        Self {
            bins: vec![0.0; width * depth],
            width,
            depth,
            total: 0.0,
        }
    }

    /// Compute `(width, depth)` for the given error rate and confidence
    pub fn dimensions(error_rate: f64, confidence: f64) -> (usize, usize) {
        let error_rate = error_rate.clamp(f64::EPSILON, 1.0);
        let confidence = confidence.clamp(0.0, 1.0 - f64::EPSILON);

        let width = (std::f64::consts::E / error_rate).ceil() as usize;
        let depth = (1.0 / (1.0 - confidence)).ln().ceil() as usize;
        (width.max(1), depth.max(1))
    }

    /// Add `count` occurrences of `key`
    pub fn add<K: Hash + ?Sized>(&mut self, key: &K, count: f64) {
        let (h1, h2) = Self::hash_pair(key);
        for row in 0..self.depth {
            let idx = self.bin_index(h1, h2, row);
            self.bins[idx] += count;
        }
        self.total += count;
    }

    /// Estimate the count of `key` (never below the true count)
    pub fn check<K: Hash + ?Sized>(&self, key: &K) -> f64 {
        let (h1, h2) = Self::hash_pair(key);
        (0..self.depth)
            .map(|row| self.bins[self.bin_index(h1, h2, row)])
            .fold(f64::INFINITY, f64::min)
    }

    /// Multiply every bin by `factor`
    pub fn decay(&mut self, factor: f64) {
        for bin in &mut self.bins {
            *bin *= factor;
        }
        self.total *= factor;
    }

    /// Zero every bin
    pub fn clear(&mut self) {
        self.bins.fill(0.0);
        self.total = 0.0;
    }

    /// Bins per row
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Total mass added (after decay)
    pub fn total(&self) -> f64 {
        self.total
    }

    /// Memory used by the bin matrix in bytes
    pub fn memory_usage(&self) -> usize {
        self.bins.len() * std::mem::size_of::<f64>() + std::mem::size_of::<Self>()
    }

    /// Two independent-ish hashes for double hashing
    ///
    /// `DefaultHasher::new()` uses fixed keys, so bin placement is identical
    /// across runs and processes.
    fn hash_pair<K: Hash + ?Sized>(key: &K) -> (u64, u64) {
        let mut hasher1 = DefaultHasher::new();
        key.hash(&mut hasher1);
        let h1 = hasher1.finish();

        let mut hasher2 = DefaultHasher::new();
        h1.hash(&mut hasher2);
        key.hash(&mut hasher2);
        let h2 = hasher2.finish();

        (h1, h2)
    }

    /// Bin index for `row`: `h(row) = h1 + row * h2 (mod width)`
    fn bin_index(&self, h1: u64, h2: u64, row: usize) -> usize {
        let hash = h1.wrapping_add((row as u64).wrapping_mul(h2));
        row * self.width + (hash % self.width as u64) as usize
    }
}
