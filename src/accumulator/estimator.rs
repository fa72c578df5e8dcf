//! Pass-through log for per-cycle derived values
//!
//! The narrowest accumulator variant: one trusted producer (a closed-loop
//! estimator) appends whatever record it derived this cycle. No queue, no
//! union schema, and no validation after the first append.

use std::ops::{Deref, DerefMut};

use super::Accumulator;
use crate::record::Record;

/// Minimal log for a single producer's arbitrary per-cycle output.
pub struct EstimatorLog {
    accumulator: Accumulator,
}

impl EstimatorLog {
    /// Create an empty log.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            accumulator: Accumulator::new(name),
        }
    }

    /// Append one derived record at elapsed time `time` (seconds on the
    /// experiment clock). The first call fixes the wall-clock origin.
    ///
    /// Trusted-producer contract: the record is stored as-is and its
    /// schema is never checked against earlier appends. If a producer
    /// does drift mid-epoch, storage keeps every row, and table assembly
    /// reads column layout from the most recent row's schema (shorter
    /// rows pad with NaN).
    pub fn append(&mut self, time: f64, record: Record) {
        self.accumulator.ensure_origin_started();
        self.accumulator.append_record(time, record);
    }
}

impl Deref for EstimatorLog {
    type Target = Accumulator;

    fn deref(&self) -> &Accumulator {
        &self.accumulator
    }
}

impl DerefMut for EstimatorLog {
    fn deref_mut(&mut self) -> &mut Accumulator {
        &mut self.accumulator
    }
}
