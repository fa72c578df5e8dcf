//! Queue-draining accumulator
//!
//! Bridges a worker process (camera driver, frame-processing pipeline,
//! stimulus generator) to an [`Accumulator`] over a bounded channel.
//! Each poll tick drains the channel to exhaustion, so bursty producers
//! cannot grow the queue without bound, while the short per-item receive
//! timeout keeps the consuming tick non-blocking.
//!
//! Producers may change record shape at any time, with no handshake:
//! the drain loop detects a schema transition structurally and restarts
//! the epoch (full clear, new origin) on the first record of the new
//! shape.

use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::ops::{Deref, DerefMut};
use std::time::Duration;
use tracing::{debug, trace};

use super::{delta_seconds, Accumulator, Notification};
use crate::record::Record;

/// One queue item: the producer's absolute timestamp plus the record.
pub type TimedRecord = (DateTime<Utc>, Record);

/// Per-item receive timeout inside [`QueueAccumulator::drain`]. Bounds
/// worst-case drain latency to `timeout * (queue depth + 1)`.
pub const QUEUE_PULL_TIMEOUT: Duration = Duration::from_millis(1);

/// Accumulator fed from a cross-process producer queue.
///
/// Dereferences to [`Accumulator`] for the whole query surface; the
/// only added operation is [`drain`](Self::drain).
pub struct QueueAccumulator {
    accumulator: Accumulator,
    receiver: Receiver<TimedRecord>,
    pull_timeout: Duration,
}

impl QueueAccumulator {
    /// Wrap the receiving end of a producer channel.
    #[must_use]
    pub fn new(name: impl Into<String>, receiver: Receiver<TimedRecord>) -> Self {
        Self {
            accumulator: Accumulator::new(name),
            receiver,
            pull_timeout: QUEUE_PULL_TIMEOUT,
        }
    }

    /// Override the per-item receive timeout.
    #[must_use]
    pub fn with_pull_timeout(mut self, timeout: Duration) -> Self {
        self.pull_timeout = timeout;
        self
    }

    /// Drain the inbound queue to exhaustion. Called once per poll tick
    /// by the external scheduler.
    ///
    /// For each pulled `(timestamp, record)`:
    /// - a record whose schema differs from the last stored one (or an
    ///   empty store) starts a new epoch: `reset` first, discarding all
    ///   rows of the old schema;
    /// - the first record of an epoch fixes the origin from its absolute
    ///   timestamp, so it stores at offset `0.0`;
    /// - after the first record of a new schema is stored,
    ///   [`Notification::Initialized`] fires so observers can rebuild
    ///   schema-dependent state.
    ///
    /// An empty or disconnected queue ends the drain normally. Returns
    /// the number of records stored this tick.
    pub fn drain(&mut self) -> usize {
        let mut drained = 0;
        loop {
            match self.receiver.recv_timeout(self.pull_timeout) {
                Ok((timestamp, record)) => {
                    let transition = self
                        .accumulator
                        .last_record()
                        .map_or(true, |last| last.schema() != record.schema());
                    if transition {
                        debug!(
                            accumulator = %self.accumulator.name(),
                            fields = ?record.schema().field_names().collect::<Vec<_>>(),
                            "schema transition"
                        );
                        self.accumulator.reset(None);
                    }
                    if self.accumulator.is_empty() {
                        // First sample of the epoch defines offset zero.
                        self.accumulator.set_origin(timestamp);
                    }
                    let origin = self
                        .accumulator
                        .origin()
                        .unwrap_or(timestamp);
                    let offset = delta_seconds(timestamp - origin);
                    trace!(accumulator = %self.accumulator.name(), offset, "append");
                    self.accumulator.append_record(offset, record);
                    drained += 1;
                    if transition {
                        self.accumulator.notify(Notification::Initialized);
                    }
                }
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => break,
            }
        }
        drained
    }
}

impl Deref for QueueAccumulator {
    type Target = Accumulator;

    fn deref(&self) -> &Accumulator {
        &self.accumulator
    }
}

impl DerefMut for QueueAccumulator {
    fn deref_mut(&mut self) -> &mut Accumulator {
        &mut self.accumulator
    }
}
