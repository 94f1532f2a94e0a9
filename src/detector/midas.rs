//! MIDAS-R streaming edge-burst detector
//!
//! Tracks every edge, source and destination in three pairs of count-min
//! sketches (current tick / all time) and scores each event by how far the
//! current tick deviates from the long-run rate. See
//! <https://arxiv.org/abs/1911.04464>.
//!
//! # Pipeline
//!
//! ```text
//! update(src, dst, count, t)
//!   -> clock.advance(t)               one tick decision per event
//!   -> edge/src/dst trackers observe   shared decay flag
//! detect_score(src, dst)
//!   -> burst_score per dimension -> aggregate -> round -> transform
//! ```
//!
//! # Example
//!
//! ```rust
//! use kuba_burst::detector::{MidasConfig, MidasR};
//! use kuba_burst::types::NodeId;
//!
//! let mut midas = MidasR::new(MidasConfig::default()).unwrap();
//! let (a, b) = (NodeId::from("a"), NodeId::from("b"));
//!
//! midas.update(&a, &b, 1, 1.0);
//! for _ in 0..500 {
//!     midas.update(&a, &b, 1, 2.0);
//! }
//! assert!(midas.detect(&a, &b));
//! ```

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::chi2::chi2_ppf;
use super::clock::EpochClock;
use super::score::{burst_score, round_score, Aggregation, ScoreCache, ScoreCacheStats, ScoreMode};
use super::tracker::DimensionTracker;
use crate::error::{ConfigError, Result};
use crate::sketch::SketchKey;
use crate::types::NodeId;

/// Largest accepted rounding precision (`10^308` is the largest finite power of ten)
pub const MAX_PRECISION: u32 = f64::MAX_10_EXP as u32;

fn default_error_rate() -> f64 {
    0.1
}
fn default_false_pos_prob() -> f64 {
    0.02
}
fn default_decay() -> f64 {
    0.5
}
fn default_ticksize() -> f64 {
    1.0
}
fn default_alpha() -> f64 {
    0.05
}
fn default_precision() -> Option<u32> {
    Some(5)
}

/// Detector configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MidasConfig {
    /// Sketch additive error rate, in (0, 1)
    #[serde(default = "default_error_rate")]
    pub error_rate: f64,

    /// Probability the sketch error bound fails (confidence = 1 - p/2), in (0, 1)
    #[serde(default = "default_false_pos_prob")]
    pub false_pos_prob: f64,

    /// Factor applied to current-tick counters on each tick transition, in [0, 1]
    #[serde(default = "default_decay")]
    pub decay: f64,

    /// Tick length in timestamp units (seconds)
    #[serde(default = "default_ticksize")]
    pub ticksize: f64,

    /// Significance level of the decision threshold, in (0, 1)
    #[serde(default = "default_alpha")]
    pub alpha: f64,

    /// Output transform
    #[serde(default)]
    pub mode: ScoreMode,

    /// Reduction over edge / source / destination scores
    #[serde(default)]
    pub aggregation: Aggregation,

    /// Decimal places kept before the transform (`None` = no rounding)
    #[serde(default = "default_precision")]
    pub precision: Option<u32>,

    /// Score memo capacity (0 = disabled)
    #[serde(default)]
    pub score_cache_size: usize,
}

impl Default for MidasConfig {
    fn default() -> Self {
        Self {
            error_rate: default_error_rate(),
            false_pos_prob: default_false_pos_prob(),
            decay: default_decay(),
            ticksize: default_ticksize(),
            alpha: default_alpha(),
            mode: ScoreMode::default(),
            aggregation: Aggregation::default(),
            precision: default_precision(),
            score_cache_size: 0,
        }
    }
}

impl MidasConfig {
    /// Create a config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the decay factor
    pub fn with_decay(mut self, decay: f64) -> Self {
        self.decay = decay;
        self
    }

    /// Set the significance level
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set the tick length
    pub fn with_ticksize(mut self, ticksize: f64) -> Self {
        self.ticksize = ticksize;
        self
    }

    /// Set the output transform
    pub fn with_mode(mut self, mode: ScoreMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the aggregation
    pub fn with_aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = aggregation;
        self
    }

    /// Set the rounding precision
    pub fn with_precision(mut self, precision: Option<u32>) -> Self {
        self.precision = precision;
        self
    }

    /// Set the sketch error rate and false positive probability
    pub fn with_sketch(mut self, error_rate: f64, false_pos_prob: f64) -> Self {
        self.error_rate = error_rate;
        self.false_pos_prob = false_pos_prob;
        self
    }

    /// Enable the score memo with the given capacity
    pub fn with_score_cache(mut self, capacity: usize) -> Self {
        self.score_cache_size = capacity;
        self
    }

    /// Sketch confidence derived from `false_pos_prob`
    pub fn confidence(&self) -> f64 {
        1.0 - self.false_pos_prob / 2.0
    }

    /// Check every field against its allowed range
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.decay) {
            return Err(ConfigError::out_of_range("decay", self.decay, "[0, 1]"));
        }
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(ConfigError::out_of_range("alpha", self.alpha, "(0, 1)"));
        }
        if let Some(precision) = self.precision {
            if precision > MAX_PRECISION {
                return Err(ConfigError::out_of_range("precision", precision, "[0, 308]"));
            }
        }
        if !(self.error_rate > 0.0 && self.error_rate < 1.0) {
            return Err(ConfigError::out_of_range("error_rate", self.error_rate, "(0, 1)"));
        }
        if !(self.false_pos_prob > 0.0 && self.false_pos_prob < 1.0) {
            return Err(ConfigError::out_of_range(
                "false_pos_prob",
                self.false_pos_prob,
                "(0, 1)",
            ));
        }
        if !(self.ticksize > 0.0 && self.ticksize.is_finite()) {
            return Err(ConfigError::out_of_range("ticksize", self.ticksize, "(0, inf)"));
        }
        Ok(())
    }

    /// Decision threshold implied by `alpha` and `mode`
    pub fn threshold(&self) -> f64 {
        self.mode.transform(chi2_ppf(1.0 - self.alpha))
    }
}

/// MIDAS-R detector state for one stream
#[derive(Debug)]
pub struct MidasR {
    config: MidasConfig,
    edge: DimensionTracker,
    src: DimensionTracker,
    dst: DimensionTracker,
    clock: EpochClock,
    threshold: f64,
    cache: Option<ScoreCache>,
    events: u64,
    tick_transitions: u64,
}

impl MidasR {
    /// Validate `config` and build a detector
    pub fn new(config: MidasConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: MidasConfig) -> Self {
        let confidence = config.confidence();
        let tracker = || DimensionTracker::new(config.error_rate, confidence, config.decay);
        let (edge, src, dst) = (tracker(), tracker(), tracker());
        let threshold = config.threshold();

        debug!(
            width = edge.current().width(),
            depth = edge.current().depth(),
            threshold,
            mode = %config.mode,
            decay = config.decay,
            ticksize = config.ticksize,
            "MIDAS-R detector created"
        );

        Self {
            clock: EpochClock::new(config.ticksize),
            cache: ScoreCache::new(config.score_cache_size),
            config,
            edge,
            src,
            dst,
            threshold,
            events: 0,
            tick_transitions: 0,
        }
    }

    /// Record `count` events on the edge `src -> dst` at `timestamp`
    pub fn update(&mut self, src: &NodeId, dst: &NodeId, count: u64, timestamp: f64) {
        let tick = self.clock.advance(timestamp);
        if tick.advanced {
            self.tick_transitions += 1;
        }

        let count = count as f64;
        self.edge
            .observe(&SketchKey::edge(src, dst), count, tick.advanced);
        self.src.observe(&SketchKey::node(src), count, tick.advanced);
        self.dst.observe(&SketchKey::node(dst), count, tick.advanced);
        self.events += 1;
    }

    /// [`update`](Self::update) stamped with the wall clock (seconds since epoch)
    pub fn update_now(&mut self, src: &NodeId, dst: &NodeId, count: u64) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64();
        self.update(src, dst, count, now);
    }

    /// Unrounded, untransformed `[edge, src, dst]` scores at the current tick
    pub fn dimension_scores(&self, src: &NodeId, dst: &NodeId) -> [f64; 3] {
        let Some(elapsed) = self.clock.current_tick() else {
            return [0.0; 3];
        };

        let score = |(cur, tot): (f64, f64)| match &self.cache {
            Some(cache) => cache.score(cur, tot, elapsed),
            None => burst_score(cur, tot, elapsed),
        };

        [
            score(self.edge.score_inputs(&SketchKey::edge(src, dst))),
            score(self.src.score_inputs(&SketchKey::node(src))),
            score(self.dst.score_inputs(&SketchKey::node(dst))),
        ]
    }

    /// Anomaly score of the edge `src -> dst` at the current tick
    ///
    /// Aggregates the three dimension scores, rounds to `precision`, then
    /// applies the output transform. Does not modify any counter.
    pub fn detect_score(&self, src: &NodeId, dst: &NodeId) -> f64 {
        let aggregated = self.config.aggregation.apply(self.dimension_scores(src, dst));
        let rounded = round_score(aggregated, self.config.precision);
        self.config.mode.transform(rounded)
    }

    /// Whether the edge is anomalous under the configured mode
    ///
    /// For `pvalue` mode this means `score < threshold`.
    pub fn detect(&self, src: &NodeId, dst: &NodeId) -> bool {
        self.config
            .mode
            .is_anomalous(self.detect_score(src, dst), self.threshold)
    }

    /// Update, then score against the same tick state
    pub fn update_detect_score(
        &mut self,
        src: &NodeId,
        dst: &NodeId,
        count: u64,
        timestamp: f64,
    ) -> f64 {
        self.update(src, dst, count, timestamp);
        self.detect_score(src, dst)
    }

    /// Update, then decide
    pub fn update_detect(&mut self, src: &NodeId, dst: &NodeId, count: u64, timestamp: f64) -> bool {
        let score = self.update_detect_score(src, dst, count, timestamp);
        self.config.mode.is_anomalous(score, self.threshold)
    }

    /// Frozen decision threshold (already transformed)
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Output transform
    pub fn mode(&self) -> ScoreMode {
        self.config.mode
    }

    /// Configuration the detector was built with
    pub fn config(&self) -> &MidasConfig {
        &self.config
    }

    /// Current tick, `None` before the first update
    pub fn current_tick(&self) -> Option<f64> {
        self.clock.current_tick()
    }

    /// Runtime statistics snapshot
    pub fn stats(&self) -> DetectorStats {
        DetectorStats {
            events: self.events,
            tick_transitions: self.tick_transitions,
            current_tick: self.clock.current_tick(),
            threshold: self.threshold,
            mode: self.config.mode,
            sketch_width: self.edge.current().width(),
            sketch_depth: self.edge.current().depth(),
            memory_bytes: self.edge.memory_usage()
                + self.src.memory_usage()
                + self.dst.memory_usage(),
            cache: self.cache.as_ref().map(ScoreCache::stats),
        }
    }
}

impl Default for MidasR {
    fn default() -> Self {
        Self::build(MidasConfig::default())
    }
}

/// Detector statistics snapshot
#[derive(Debug, Clone, Serialize)]
pub struct DetectorStats {
    /// Updates processed
    pub events: u64,
    /// Tick transitions observed (each one decayed the current counters once)
    pub tick_transitions: u64,
    /// Current tick
    pub current_tick: Option<f64>,
    /// Decision threshold
    pub threshold: f64,
    /// Output transform
    pub mode: ScoreMode,
    /// Bins per sketch row
    pub sketch_width: usize,
    /// Rows per sketch
    pub sketch_depth: usize,
    /// Memory held by the six sketches
    pub memory_bytes: usize,
    /// Score memo statistics, when enabled
    pub cache: Option<ScoreCacheStats>,
}

impl fmt::Display for DetectorStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Detector Statistics:")?;
        writeln!(f, "  Events: {}", self.events)?;
        writeln!(f, "  Tick transitions: {}", self.tick_transitions)?;
        match self.current_tick {
            Some(tick) => writeln!(f, "  Current tick: {}", tick)?,
            None => writeln!(f, "  Current tick: -")?,
        }
        writeln!(f, "  Threshold ({}): {:.6}", self.mode, self.threshold)?;
        writeln!(f, "  Sketch: {} x {}", self.sketch_depth, self.sketch_width)?;
        writeln!(f, "  Memory: {} bytes", self.memory_bytes)?;
        if let Some(cache) = &self.cache {
            writeln!(
                f,
                "  Score cache: {}/{} entries, {} hits, {} misses",
                cache.entries, cache.capacity, cache.hits, cache.misses
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn node(s: &str) -> NodeId {
        NodeId::from(s)
    }

    #[test]
    fn test_rejects_invalid_decay() {
        for decay in [-0.1, 1.1, f64::NAN] {
            let err = MidasR::new(MidasConfig::default().with_decay(decay)).unwrap_err();
            assert!(matches!(
                err,
                Error::Configuration(ConfigError::OutOfRange { field: "decay", .. })
            ));
        }
    }

    #[test]
    fn test_rejects_invalid_alpha() {
        for alpha in [0.0, 1.0, -0.5, f64::NAN] {
            assert!(MidasR::new(MidasConfig::default().with_alpha(alpha)).is_err());
        }
    }

    #[test]
    fn test_rejects_invalid_precision() {
        let config = MidasConfig::default().with_precision(Some(MAX_PRECISION + 1));
        assert!(MidasR::new(config).is_err());
        let config = MidasConfig::default().with_precision(Some(MAX_PRECISION));
        assert!(MidasR::new(config).is_ok());
    }

    #[test]
    fn test_rejects_invalid_sketch_and_ticksize() {
        assert!(MidasR::new(MidasConfig::default().with_sketch(0.0, 0.02)).is_err());
        assert!(MidasR::new(MidasConfig::default().with_sketch(0.1, 1.0)).is_err());
        assert!(MidasR::new(MidasConfig::default().with_ticksize(0.0)).is_err());
        assert!(MidasR::new(MidasConfig::default().with_ticksize(f64::INFINITY)).is_err());
    }

    #[test]
    fn test_decay_bounds_are_inclusive() {
        assert!(MidasR::new(MidasConfig::default().with_decay(0.0)).is_ok());
        assert!(MidasR::new(MidasConfig::default().with_decay(1.0)).is_ok());
    }

    #[test]
    fn test_threshold_per_mode() {
        let raw = MidasR::new(MidasConfig::default()).unwrap();
        assert!((raw.threshold() - 3.841_458_820_694_124).abs() < 1e-5);

        let log = MidasR::new(MidasConfig::default().with_mode(ScoreMode::Log)).unwrap();
        assert!((log.threshold() - 3.841_458_820_694_124f64.ln_1p()).abs() < 1e-5);

        let pvalue = MidasR::new(MidasConfig::default().with_mode(ScoreMode::PValue)).unwrap();
        assert!((pvalue.threshold() - 0.05).abs() < 1e-6);
    }

    #[test]
    fn test_score_before_any_update() {
        let midas = MidasR::default();
        assert_eq!(midas.detect_score(&node("a"), &node("b")), 0.0);
        assert!(!midas.detect(&node("a"), &node("b")));
        assert_eq!(midas.current_tick(), None);
    }

    #[test]
    fn test_first_tick_scores_zero() {
        let mut midas = MidasR::default();
        let (a, b) = (node("a"), node("b"));
        assert_eq!(midas.update_detect_score(&a, &b, 1, 1.0), 0.0);
        assert_eq!(midas.update_detect_score(&a, &b, 1, 1.0), 0.0);
    }

    #[test]
    fn test_burst_matches_hand_computation() {
        let mut midas = MidasR::new(MidasConfig::default().with_precision(None)).unwrap();
        let (a, b) = (node("a"), node("b"));
        midas.update(&a, &b, 2, 1.0);
        midas.update(&a, &b, 3, 2.0);

        // cur = 2 * 0.5 + 3 = 4, tot = 5, elapsed = 2
        let expected = burst_score(4.0, 5.0, 2.0);
        assert_eq!(midas.dimension_scores(&a, &b)[0], expected);
        assert_eq!(midas.detect_score(&a, &b), expected);
    }

    #[test]
    fn test_precision_rounds_before_transform() {
        let config = MidasConfig::default()
            .with_precision(Some(0))
            .with_mode(ScoreMode::Log);
        let mut midas = MidasR::new(config).unwrap();
        let (a, b) = (node("a"), node("b"));
        midas.update(&a, &b, 2, 1.0);
        midas.update(&a, &b, 3, 2.0);

        let raw = burst_score(4.0, 5.0, 2.0);
        assert_eq!(midas.detect_score(&a, &b), raw.round_ties_even().ln_1p());
    }

    #[test]
    fn test_tick_transitions_counted() {
        let mut midas = MidasR::default();
        let (a, b) = (node("a"), node("b"));
        for t in [1.0, 1.0, 1.0, 2.0, 2.0, 5.0] {
            midas.update(&a, &b, 1, t);
        }
        let stats = midas.stats();
        assert_eq!(stats.events, 6);
        assert_eq!(stats.tick_transitions, 2);
        assert_eq!(stats.current_tick, Some(5.0));
    }

    #[test]
    fn test_score_cache_is_transparent() {
        let mut plain = MidasR::default();
        let mut cached = MidasR::new(MidasConfig::default().with_score_cache(16)).unwrap();
        let (a, b) = (node("a"), node("b"));
        for t in [1.0, 2.0, 2.0, 3.0] {
            assert_eq!(
                plain.update_detect_score(&a, &b, 1, t),
                cached.update_detect_score(&a, &b, 1, t)
            );
        }
        let cache = cached.stats().cache.unwrap();
        assert!(cache.misses > 0);
        assert!(plain.stats().cache.is_none());
    }

    #[test]
    fn test_update_now_anchors_on_wall_clock() {
        let mut midas = MidasR::default();
        let (a, b) = (node("a"), node("b"));
        assert_eq!(midas.current_tick(), None);

        midas.update_now(&a, &b, 3);
        assert_eq!(midas.current_tick(), Some(1.0));
        assert_eq!(midas.stats().events, 1);
        assert_eq!(midas.dimension_scores(&a, &b), [0.0; 3]);
    }

    #[test]
    fn test_stats_display() {
        let midas = MidasR::default();
        let text = midas.stats().to_string();
        assert!(text.contains("Detector Statistics"));
        assert!(text.contains("Threshold (raw)"));
    }
}
