//! Epoch clock: maps event timestamps onto detector ticks
//!
//! The clock anchors itself on the first finite timestamp `t0` at
//! `t0 / ticksize - 1`, so the first event lands on tick `1` and a later
//! timestamp `t` sits at the real-valued tick `t / ticksize - anchor`. Any
//! increase of that value is a transition. The clock never moves backward:
//! a late event is attributed to the current tick.

use tracing::{trace, warn};

/// Result of feeding one timestamp into the clock
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    /// Ticks elapsed since the stream started (first event = 1)
    pub elapsed: f64,
    /// Whether this timestamp crossed into a new tick
    pub advanced: bool,
}

/// Tick clock anchored at the start of the stream
#[derive(Debug, Clone)]
pub struct EpochClock {
    ticksize: f64,
    /// First finite timestamp, set lazily
    origin: Option<f64>,
    last_tick: Option<f64>,
}

impl EpochClock {
    /// Create an unanchored clock
    ///
    /// `ticksize` must be positive and finite; the detector validates it.
    pub fn new(ticksize: f64) -> Self {
        Self {
            ticksize,
            origin: None,
            last_tick: None,
        }
    }

    /// Feed a timestamp and report the tick it falls into
    pub fn advance(&mut self, timestamp: f64) -> Tick {
        if !timestamp.is_finite() {
            let elapsed = self.last_tick.unwrap_or(1.0);
            warn!(timestamp, elapsed, "Non-finite timestamp attributed to current tick");
            return Tick {
                elapsed,
                advanced: false,
            };
        }

        // t / ticksize - (t0 / ticksize - 1), exact at t == t0
        let origin = *self.origin.get_or_insert(timestamp);
        let elapsed = (timestamp - origin) / self.ticksize + 1.0;

        match self.last_tick {
            None => {
                self.last_tick = Some(elapsed);
                Tick {
                    elapsed,
                    advanced: false,
                }
            }
            Some(last) if elapsed > last => {
                trace!(from = last, to = elapsed, "Tick transition");
                self.last_tick = Some(elapsed);
                Tick {
                    elapsed,
                    advanced: true,
                }
            }
            Some(last) => Tick {
                elapsed: last,
                advanced: false,
            },
        }
    }

    /// Current tick, or `None` before the first timestamp
    pub fn current_tick(&self) -> Option<f64> {
        self.last_tick
    }

    /// Tick length in seconds
    pub fn ticksize(&self) -> f64 {
        self.ticksize
    }

    /// Stream-start anchor `t0 / ticksize - 1`, or `None` before the first timestamp
    pub fn anchor(&self) -> Option<f64> {
        self.origin.map(|t0| t0 / self.ticksize - 1.0)
    }

    /// Whether a timestamp has anchored the clock yet
    pub fn is_anchored(&self) -> bool {
        self.origin.is_some()
    }
}
