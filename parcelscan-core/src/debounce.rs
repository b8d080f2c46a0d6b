//! Consecutive-reading debounce for raw detector output

use crate::constants::DEFAULT_CONSECUTIVE_HITS;

#[cfg(feature = "logging")]
use tracing::debug;

/// Snapshot of the debouncer's run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebounceState {
    /// Value of the current run
    pub last_value: Option<String>,

    /// Length of the current run
    pub consecutive_hits: u32,
}

/// Accepts a reading once it has been seen `threshold` times in a row
///
/// Readings are trimmed before comparison. Blank readings are skipped and do
/// not break a run. A differing reading restarts the run at length 1.
#[derive(Debug, Clone)]
pub struct CandidateDebouncer {
    threshold: u32,
    state: DebounceState,
}

impl CandidateDebouncer {
    /// Create a debouncer; a threshold of 0 is treated as 1
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            state: DebounceState::default(),
        }
    }

    /// Feed one reading, returning the accepted value when the run completes
    pub fn push(&mut self, reading: &str) -> Option<String> {
        let value = reading.trim();
        if value.is_empty() {
            return None;
        }

        if self.state.last_value.as_deref() == Some(value) {
            self.state.consecutive_hits += 1;
        } else {
            self.state.last_value = Some(value.to_string());
            self.state.consecutive_hits = 1;
        }

        #[cfg(feature = "logging")]
        debug!(
            "Debounce run {:?} at {}/{}",
            value, self.state.consecutive_hits, self.threshold
        );

        if self.state.consecutive_hits >= self.threshold {
            let accepted = self.state.last_value.take();
            self.reset();
            accepted
        } else {
            None
        }
    }

    /// Discard the current run
    pub fn reset(&mut self) {
        self.state = DebounceState::default();
    }

    /// Current run
    pub fn state(&self) -> &DebounceState {
        &self.state
    }

    /// Readings required for acceptance
    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}

impl Default for CandidateDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_CONSECUTIVE_HITS)
    }
}
