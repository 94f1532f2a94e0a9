//! Streaming edge-burst detection
//!
//! [`MidasR`] is the orchestrator; the submodules are its building blocks:
//!
//! - `clock`: timestamp to tick mapping
//! - `tracker`: current / total sketch pairs per dimension
//! - `score`: burst statistic, output transforms, aggregation, memo
//! - `chi2`: chi-squared(1) quantile and survival function

pub mod chi2;
mod clock;
mod midas;
mod score;
mod tracker;

pub use clock::{EpochClock, Tick};
pub use midas::{DetectorStats, MidasConfig, MidasR, MAX_PRECISION};
pub use score::{
    burst_score, round_score, Aggregation, ScoreCache, ScoreCacheStats, ScoreMode,
};
pub use tracker::DimensionTracker;
