//! Commit batching.
//!
//! Each invocation with a dirty working tree either defers (bumping the
//! pending counter) or, once the counter has reached the current threshold,
//! asks for a real commit. The threshold is re-drawn from a configured range
//! after every successful commit, so agents sharing a schedule do not commit
//! in lockstep.
//!
//! A commit that fails leaves the counter and threshold untouched: the next
//! invocation sees the same (or a larger) backlog and tries again.

use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::ConfigError;

/// Inclusive `[min, max]` range thresholds are drawn from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThresholdRange {
    min: u32,
    max: u32,
}

impl ThresholdRange {
    pub fn new(min: u32, max: u32) -> Result<Self, ConfigError> {
        if min > max {
            return Err(ConfigError::InvalidThresholds { min, max });
        }
        Ok(ThresholdRange { min, max })
    }

    /// Degenerate range: commit on a fixed period.
    pub fn fixed(value: u32) -> Self {
        ThresholdRange {
            min: value,
            max: value,
        }
    }

    pub fn min(&self) -> u32 {
        self.min
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn contains(&self, value: u32) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

impl fmt::Display for ThresholdRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

/// Source of new thresholds.
///
/// # Laws
/// - `draw` must return a value inside `range`.
pub trait ThresholdSource: Send {
    fn draw(&mut self, range: ThresholdRange) -> u32;
}

/// Uniform draws from any `rand` generator.
#[derive(Debug)]
pub struct RngThresholds<R> {
    rng: R,
}

impl<R: Rng> RngThresholds<R> {
    pub fn new(rng: R) -> Self {
        RngThresholds { rng }
    }
}

impl RngThresholds<StdRng> {
    pub fn from_entropy() -> Self {
        RngThresholds::new(StdRng::from_os_rng())
    }

    pub fn seeded(seed: u64) -> Self {
        RngThresholds::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng + Send> ThresholdSource for RngThresholds<R> {
    fn draw(&mut self, range: ThresholdRange) -> u32 {
        self.rng.random_range(range.min..=range.max)
    }
}

/// What the batcher wants done with this invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchDecision {
    /// Nothing changed on disk.
    Clean,
    /// Changes exist but the threshold has not been reached yet.
    Deferred { pending: u32, threshold: u32 },
    /// Stage, commit and push now.
    CommitDue { pending: u32, threshold: u32 },
}

/// Counter and threshold for the current cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchState {
    pub pending: u32,
    pub threshold: u32,
    pub range: ThresholdRange,
}

pub struct CommitBatcher {
    state: BatchState,
    source: Box<dyn ThresholdSource>,
}

impl fmt::Debug for CommitBatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommitBatcher")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl CommitBatcher {
    /// Start a batcher with an initial threshold drawn from `source`.
    pub fn new(range: ThresholdRange, mut source: Box<dyn ThresholdSource>) -> Self {
        let threshold = source.draw(range);
        debug_assert!(range.contains(threshold));
        CommitBatcher {
            state: BatchState {
                pending: 0,
                threshold,
                range,
            },
            source,
        }
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    pub fn decide(&mut self, is_clean: bool) -> BatchDecision {
        let BatchState {
            pending, threshold, ..
        } = self.state;
        if is_clean {
            return BatchDecision::Clean;
        }
        if pending < threshold {
            self.state.pending = pending + 1;
            return BatchDecision::Deferred {
                pending: self.state.pending,
                threshold,
            };
        }
        BatchDecision::CommitDue { pending, threshold }
    }

    /// Close the cycle after a commit and push both succeeded.
    pub fn record_success(&mut self) {
        self.state.pending = 0;
        self.state.threshold = self.source.draw(self.state.range);
        debug_assert!(self.state.range.contains(self.state.threshold));
    }
}
