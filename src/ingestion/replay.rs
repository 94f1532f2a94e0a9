//! Paced replay of recorded flows

use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::error::Result;
use crate::types::FlowRecord;

/// Replay controls
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplayConfig {
    /// Playback speed relative to the recording (`None`, zero, negative or
    /// infinite = as fast as possible)
    pub speed: Option<f64>,
    /// Leading records to drop
    pub skip: usize,
    /// Maximum records to emit
    pub limit: Option<usize>,
    /// Log and drop malformed records instead of yielding the error
    pub lenient: bool,
}

impl ReplayConfig {
    /// Set the playback speed
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    /// Set the number of leading records to drop
    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    /// Set the maximum number of records to emit
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Drop malformed records with a warning
    pub fn lenient(mut self) -> Self {
        self.lenient = true;
        self
    }

    fn pace(&self) -> Option<f64> {
        self.speed.filter(|s| s.is_finite() && *s > 0.0)
    }
}

/// Replays a record stream with skip / limit / pacing
///
/// With a pacing speed, the replayer sleeps `(t_i - t_{i-1}) / speed` before
/// emitting each record; out-of-order timestamps emit immediately.
#[derive(Debug)]
pub struct FlowReplayer<I> {
    inner: I,
    config: ReplayConfig,
    seen: usize,
    emitted: usize,
    malformed: usize,
    last_timestamp: Option<f64>,
}

impl<I> FlowReplayer<I>
where
    I: Iterator<Item = Result<FlowRecord>>,
{
    /// Wrap a record source
    pub fn new(inner: I, config: ReplayConfig) -> Self {
        Self {
            inner,
            config,
            seen: 0,
            emitted: 0,
            malformed: 0,
            last_timestamp: None,
        }
    }

    /// Well-formed records pulled from the source, skipped ones included
    pub fn seen(&self) -> usize {
        self.seen
    }

    /// Records handed to the caller
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Malformed records dropped in lenient mode
    pub fn malformed(&self) -> usize {
        self.malformed
    }

    fn wait_for(&mut self, timestamp: f64) {
        if let (Some(speed), Some(last)) = (self.config.pace(), self.last_timestamp) {
            let delay = (timestamp - last) / speed;
            if delay > 0.0 && delay.is_finite() {
                thread::sleep(Duration::from_secs_f64(delay));
            }
        }
        self.last_timestamp = Some(timestamp);
    }
}

impl<I> Iterator for FlowReplayer<I>
where
    I: Iterator<Item = Result<FlowRecord>>,
{
    type Item = Result<FlowRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.config.limit.is_some_and(|limit| self.emitted >= limit) {
                return None;
            }

            let record = match self.inner.next()? {
                Ok(record) => record,
                Err(e) if self.config.lenient => {
                    self.malformed += 1;
                    warn!(error = %e, "Skipping malformed flow record");
                    continue;
                }
                Err(e) => return Some(Err(e)),
            };

            self.seen += 1;
            if self.seen <= self.config.skip {
                continue;
            }

            self.wait_for(record.timestamp);
            self.emitted += 1;
            return Some(Ok(record));
        }
    }
}
