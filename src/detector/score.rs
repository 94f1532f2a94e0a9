//! Burst score, output transforms and aggregation
//!
//! The score compares the count observed in the current tick against the
//! per-tick rate implied by the all-time count. Under a constant-rate null
//! hypothesis it is chi-squared distributed with one degree of freedom.

use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::chi2::chi2_sf;
use crate::error::ConfigError;

/// Chi-squared burst statistic
///
/// Returns `0` when there is no history (`tot == 0`) or not enough of it to
/// estimate a rate (`elapsed <= 1`).
pub fn burst_score(cur: f64, tot: f64, elapsed: f64) -> f64 {
    if tot == 0.0 || elapsed <= 1.0 {
        return 0.0;
    }
    let deviation = (cur - tot / elapsed) * elapsed;
    deviation * deviation / (tot * (elapsed - 1.0))
}

/// Round to `precision` decimal places, ties to even
///
/// Values too large to scale are returned unchanged.
pub fn round_score(score: f64, precision: Option<u32>) -> f64 {
    let Some(precision) = precision else {
        return score;
    };
    let scale = 10f64.powi(i32::try_from(precision).unwrap_or(i32::MAX));
    let scaled = score * scale;
    if !scale.is_finite() || !scaled.is_finite() {
        return score;
    }
    scaled.round_ties_even() / scale
}

// ============================================================================
// Output transform
// ============================================================================

/// Output transform applied to the aggregated, rounded score
///
/// `Raw` and `Log` grow with the anomaly; `PValue` shrinks with it. Compare
/// scores through [`ScoreMode::is_anomalous`] instead of `>` so the direction
/// is always the right one for the mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ScoreMode {
    /// Identity
    #[default]
    Raw,
    /// `ln(1 + score)`
    Log,
    /// Chi-squared(1) upper-tail probability, in [0, 1]
    PValue,
}

impl ScoreMode {
    /// Every mode
    pub const ALL: [ScoreMode; 3] = [ScoreMode::Raw, ScoreMode::Log, ScoreMode::PValue];

    /// Config name of the mode
    pub fn name(&self) -> &'static str {
        match self {
            ScoreMode::Raw => "raw",
            ScoreMode::Log => "log",
            ScoreMode::PValue => "pvalue",
        }
    }

    /// Sorted list of accepted names
    pub fn valid_names() -> Vec<&'static str> {
        let mut names: Vec<_> = Self::ALL.iter().map(|m| m.name()).collect();
        names.sort_unstable();
        names
    }

    /// Apply the transform
    pub fn transform(&self, score: f64) -> f64 {
        match self {
            ScoreMode::Raw => score,
            ScoreMode::Log => score.ln_1p(),
            ScoreMode::PValue => chi2_sf(score),
        }
    }

    /// Whether larger transformed values mean "more anomalous"
    ///
    /// False only for `PValue`.
    pub fn higher_is_anomalous(&self) -> bool {
        !matches!(self, ScoreMode::PValue)
    }

    /// Decision rule: `score > threshold`, or `score < threshold` for p-values
    pub fn is_anomalous(&self, score: f64, threshold: f64) -> bool {
        if self.higher_is_anomalous() {
            score > threshold
        } else {
            score < threshold
        }
    }
}

impl fmt::Display for ScoreMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScoreMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| ConfigError::InvalidMode {
                mode: s.to_string(),
                valid: Self::valid_names(),
            })
    }
}

impl TryFrom<String> for ScoreMode {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ScoreMode> for String {
    fn from(mode: ScoreMode) -> Self {
        mode.name().to_string()
    }
}

// ============================================================================
// Aggregation
// ============================================================================

/// Reduction combining the edge, source and destination scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Aggregation {
    /// Largest of the three (default)
    #[default]
    Max,
    /// Smallest of the three
    Min,
    /// Arithmetic mean
    Mean,
    /// Sum
    Sum,
}

impl Aggregation {
    /// Every aggregation
    pub const ALL: [Aggregation; 4] = [
        Aggregation::Max,
        Aggregation::Min,
        Aggregation::Mean,
        Aggregation::Sum,
    ];

    /// Config name
    pub fn name(&self) -> &'static str {
        match self {
            Aggregation::Max => "max",
            Aggregation::Min => "min",
            Aggregation::Mean => "mean",
            Aggregation::Sum => "sum",
        }
    }

    /// Reduce `[edge, src, dst]`
    pub fn apply(&self, scores: [f64; 3]) -> f64 {
        match self {
            Aggregation::Max => scores.into_iter().fold(f64::NEG_INFINITY, f64::max),
            Aggregation::Min => scores.into_iter().fold(f64::INFINITY, f64::min),
            Aggregation::Mean => scores.iter().sum::<f64>() / 3.0,
            Aggregation::Sum => scores.iter().sum(),
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Aggregation {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.name() == s)
            .ok_or_else(|| ConfigError::InvalidAggregation {
                name: s.to_string(),
                valid: Self::ALL.iter().map(|a| a.name()).collect(),
            })
    }
}

impl TryFrom<String> for Aggregation {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Aggregation> for String {
    fn from(agg: Aggregation) -> Self {
        agg.name().to_string()
    }
}

// ============================================================================
// Score cache
// ============================================================================

/// Exact bit patterns of `(cur, tot, elapsed)`
type CacheKey = (u64, u64, u64);

/// Bounded memo of [`burst_score`] owned by one detector
///
/// Uses the `lru` crate for O(1) eviction. The lock makes lookups possible
/// from `&self` scoring paths.
pub struct ScoreCache {
    entries: Mutex<LruCache<CacheKey, f64>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Score cache statistics snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ScoreCacheStats {
    /// Entries currently cached
    pub entries: usize,
    /// Maximum entries
    pub capacity: usize,
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that computed the score
    pub misses: u64,
}

impl ScoreCache {
    /// Create a cache, or `None` when `capacity` is zero
    pub fn new(capacity: usize) -> Option<Self> {
        let capacity = NonZeroUsize::new(capacity)?;
        Some(Self {
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// Cached [`burst_score`]
    pub fn score(&self, cur: f64, tot: f64, elapsed: f64) -> f64 {
        let key = (cur.to_bits(), tot.to_bits(), elapsed.to_bits());
        let mut entries = self.entries.lock();
        if let Some(&score) = entries.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return score;
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let score = burst_score(cur, tot, elapsed);
        entries.put(key, score);
        score
    }

    /// Statistics snapshot
    pub fn stats(&self) -> ScoreCacheStats {
        let entries = self.entries.lock();
        ScoreCacheStats {
            entries: entries.len(),
            capacity: entries.cap().get(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Debug for ScoreCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScoreCache")
            .field("stats", &self.stats())
            .finish()
    }
}
