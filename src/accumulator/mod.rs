//! Stream accumulators
//!
//! An [`Accumulator`] turns a stream of timestamped records into a
//! queryable, exportable time series while the experiment runs. It is
//! append-only between resets: `reset` starts a new epoch (new schema,
//! new time origin), and nothing else ever removes data.
//!
//! Mutation happens only on the consuming tick's thread of control
//! (see [`queue::QueueAccumulator::drain`]); the accumulator carries no
//! internal locking, and concurrent readers are the caller's concern.

pub mod dynamic;
pub mod estimator;
pub mod queue;

use chrono::{DateTime, TimeDelta, Utc};
use std::cell::OnceCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

use crate::export::{self, LogFormat};
use crate::record::Record;
use crate::table::{Table, TIME_COLUMN};
use crate::{Error, Result};

/// Number of trailing samples used to estimate the rolling sample rate.
pub const DEFAULT_RATE_WINDOW: usize = 10;

/// Synchronous notification delivered inline to registered observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// A reset is starting. Fired *before* state is cleared, so observers
    /// can drop references to data of the outgoing epoch.
    Reset,
    /// The first record of a new schema has been stored. Fired *after*
    /// the append, so observers can rebuild schema-dependent state.
    Initialized,
}

type Observer = Box<dyn FnMut(Notification) + Send>;

/// Seconds in a chrono delta, microsecond precision, f64.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn delta_seconds(delta: TimeDelta) -> f64 {
    delta.num_microseconds().map_or_else(
        // Microsecond count overflows i64 after ~292k years; fall back
        // to millisecond precision for such deltas.
        || millis_to_seconds(delta.num_milliseconds()),
        |us| us as f64 / 1e6,
    )
}

#[allow(clippy::cast_precision_loss)]
fn millis_to_seconds(ms: i64) -> f64 {
    ms as f64 / 1e3
}

/// Append-only, schema-tagged time-series store with live statistics,
/// windowed queries, time-indexed lookup and multi-format export.
pub struct Accumulator {
    name: String,
    times: Vec<f64>,
    records: Vec<Record>,
    origin: Option<DateTime<Utc>>,
    monitored_fields: Option<Vec<String>>,
    rate_window: usize,
    field_index: OnceCell<HashMap<String, usize>>,
    observers: Vec<Observer>,
}

impl Accumulator {
    /// Create an empty accumulator with an unknown schema.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            times: Vec::new(),
            records: Vec::new(),
            origin: None,
            monitored_fields: None,
            rate_window: DEFAULT_RATE_WINDOW,
            field_index: OnceCell::new(),
            observers: Vec::new(),
        }
    }

    /// Set the fields downstream consumers surface by default. Storage
    /// is unaffected.
    #[must_use]
    pub fn with_monitored_fields<S: Into<String>>(mut self, fields: Vec<S>) -> Self {
        self.monitored_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Set the rolling-rate window size (default 10).
    #[must_use]
    pub fn with_rate_window(mut self, window: usize) -> Self {
        self.rate_window = window.max(1);
        self
    }

    /// Accumulator name (used in error messages and log lines).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields of interest for live display, if configured.
    #[must_use]
    pub fn monitored_fields(&self) -> Option<&[String]> {
        self.monitored_fields.as_deref()
    }

    /// Register an observer for [`Notification`]s. Observers run inline
    /// with the mutation that triggers them and must return quickly.
    pub fn subscribe(&mut self, observer: impl FnMut(Notification) + Send + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub(crate) fn notify(&mut self, notification: Notification) {
        for observer in &mut self.observers {
            observer(notification);
        }
    }

    /// Clear all stored data and start a new epoch.
    ///
    /// The [`Notification::Reset`] fires before any state is touched.
    /// Passing `Some(fields)` also replaces the monitored-field list.
    /// Idempotent; never fails.
    pub fn reset(&mut self, monitored_fields: Option<Vec<String>>) {
        self.notify(Notification::Reset);
        if let Some(fields) = monitored_fields {
            self.monitored_fields = Some(fields);
        }
        debug!(accumulator = %self.name, rows = self.times.len(), "reset");
        self.times.clear();
        self.records.clear();
        self.origin = None;
        self.field_index = OnceCell::new();
    }

    /// Fix the time origin at the current wall-clock instant unless one
    /// is already set. Used by variants that timestamp records
    /// themselves rather than receiving producer timestamps.
    pub fn ensure_origin_started(&mut self) {
        if self.origin.is_none() {
            self.origin = Some(Utc::now());
        }
    }

    /// The epoch's absolute offset-zero instant, once known.
    #[must_use]
    pub fn origin(&self) -> Option<DateTime<Utc>> {
        self.origin
    }

    pub(crate) fn set_origin(&mut self, origin: DateTime<Utc>) {
        self.origin = Some(origin);
    }

    /// Append a (relative-time, record) pair. Callers are responsible
    /// for schema homogeneity within the epoch and for non-decreasing
    /// times; neither is repaired here.
    pub(crate) fn append_record(&mut self, time: f64, record: Record) {
        self.times.push(time);
        self.records.push(record);
        debug_assert_eq!(self.times.len(), self.records.len());
    }

    pub(crate) fn last_record(&self) -> Option<&Record> {
        self.records.last()
    }

    /// Number of stored rows this epoch.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.records.len()
    }

    /// True when no record has been stored this epoch.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Relative times of all stored rows, seconds from the origin.
    #[must_use]
    pub fn time_series(&self) -> &[f64] {
        &self.times
    }

    /// Ordered column names of the current epoch, with a synthetic
    /// leading `"t"`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyAccumulator`] before the first append of
    /// the epoch: schema is only known once data exists.
    pub fn schema(&self) -> Result<Vec<String>> {
        let last = self
            .records
            .last()
            .ok_or_else(|| Error::EmptyAccumulator(self.name.clone()))?;
        Ok(std::iter::once(TIME_COLUMN.to_string())
            .chain(last.schema().field_names().map(str::to_string))
            .collect())
    }

    /// Name-to-column-position map over [`schema()`](Self::schema).
    /// Computed lazily and cached until the next reset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyAccumulator`] when no record exists yet.
    pub fn field_index(&self) -> Result<&HashMap<String, usize>> {
        let last = self
            .records
            .last()
            .ok_or_else(|| Error::EmptyAccumulator(self.name.clone()))?;
        Ok(self.field_index.get_or_init(|| {
            std::iter::once(TIME_COLUMN)
                .chain(last.schema().field_names())
                .enumerate()
                .map(|(i, name)| (name.to_string(), i))
                .collect()
        }))
    }

    /// The stored row nearest at or before an absolute instant, with its
    /// relative time.
    ///
    /// Returns `None` when the accumulator is empty, the origin is not
    /// yet set, or the instant precedes every stored sample. The last
    /// case is deliberate: a too-early query must surface as "not
    /// found", never wrap around to the most recent row.
    #[must_use]
    pub fn nearest_at_or_before(&self, time: DateTime<Utc>) -> Option<(f64, &Record)> {
        let origin = self.origin?;
        let offset = delta_seconds(time - origin);
        let i = self.times.partition_point(|&t| t <= offset);
        if i == 0 {
            return None;
        }
        Some((self.times[i - 1], &self.records[i - 1]))
    }

    /// Sampling rate estimated from the most recent window of samples.
    ///
    /// Tolerant-zero contract: returns `0.0` whenever the estimate is
    /// undefined (too few samples, zero or non-finite span). Display
    /// code polls this every frame and must never fault on startup
    /// transients.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn rolling_rate(&self) -> f64 {
        let n = self.times.len();
        let k = self.rate_window;
        if n < k + 1 {
            return 0.0;
        }
        let span = self.times[n - 1] - self.times[n - 1 - k];
        if !span.is_finite() || span <= 0.0 {
            return 0.0;
        }
        let rate = k as f64 / span;
        if rate.is_finite() {
            rate
        } else {
            0.0
        }
    }

    /// The last `n` rows as a column-oriented table, `n` clamped to the
    /// row count. `None` when there is nothing to return.
    #[must_use]
    pub fn window_by_count(&self, n: usize) -> Option<Table> {
        let take = n.min(self.records.len());
        if take == 0 {
            return None;
        }
        let start = self.records.len() - take;
        let schema = self.records.last()?.schema().clone();
        Some(Table::from_rows(
            schema,
            &self.times[start..],
            &self.records[start..],
        ))
    }

    /// Approximately the last `seconds` worth of rows, using the rolling
    /// rate to estimate the row count. A non-finite or negative estimate
    /// falls back to the single most recent row.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn window_by_duration(&self, seconds: f64) -> Option<Table> {
        let estimate = self.rolling_rate() * seconds;
        if !estimate.is_finite() || estimate < 0.0 {
            return self.window_by_count(1);
        }
        self.window_by_count(estimate as usize)
    }

    /// Everything stored this epoch as one table.
    #[must_use]
    pub fn full_table(&self) -> Option<Table> {
        self.window_by_count(self.records.len())
    }

    /// Serialize the full table to `<path>.<format>`.
    ///
    /// Supported formats: `csv` (semicolon-separated, booleans as 0/1),
    /// `feather` (Arrow IPC), `parquet` (ZSTD-compressed), `json`
    /// (column name to value sequence). Returns the output path.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedFormat`] for an unrecognized format name and
    /// [`Error::EmptyAccumulator`] for an empty store; neither creates a
    /// file. IO and serialization failures propagate.
    pub fn export(&self, path: impl AsRef<Path>, format: &str) -> Result<PathBuf> {
        let format = LogFormat::from_str(format)?;
        let table = self
            .full_table()
            .ok_or_else(|| Error::EmptyAccumulator(self.name.clone()))?;
        let out = export::write_table(&table, path.as_ref(), format)?;
        info!(
            accumulator = %self.name,
            rows = table.num_rows(),
            path = %out.display(),
            "exported"
        );
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Schema, Value};
    use chrono::TimeDelta;
    use std::sync::{Arc, Mutex};

    fn float_record(schema: &Arc<Schema>, values: &[f64]) -> Record {
        Record::new(
            schema.clone(),
            values.iter().map(|&v| Value::Float(v)).collect(),
        )
        .unwrap()
    }

    #[allow(clippy::cast_precision_loss)]
    fn filled(n: usize, dt: f64) -> Accumulator {
        let schema = Arc::new(Schema::of_floats(&["x", "y"]));
        let mut acc = Accumulator::new("test");
        acc.set_origin(Utc::now());
        for i in 0..n {
            acc.append_record(i as f64 * dt, float_record(&schema, &[i as f64, -(i as f64)]));
        }
        acc
    }

    #[test]
    fn test_empty_accumulator_has_no_schema() {
        let acc = Accumulator::new("empty");
        assert!(matches!(acc.schema(), Err(Error::EmptyAccumulator(_))));
        assert!(matches!(acc.field_index(), Err(Error::EmptyAccumulator(_))));
    }

    #[test]
    fn test_schema_prepends_time_column() {
        let acc = filled(1, 0.1);
        assert_eq!(acc.schema().unwrap(), vec!["t", "x", "y"]);
        let index = acc.field_index().unwrap();
        assert_eq!(index["t"], 0);
        assert_eq!(index["x"], 1);
        assert_eq!(index["y"], 2);
    }

    #[test]
    fn test_len_parity_across_appends_and_reset() {
        let mut acc = filled(7, 0.1);
        assert_eq!(acc.time_series().len(), acc.row_count());
        acc.reset(None);
        assert_eq!(acc.time_series().len(), 0);
        assert_eq!(acc.row_count(), 0);
        assert!(acc.origin().is_none());
    }

    #[test]
    fn test_rolling_rate_under_sampled_is_zero() {
        // Window K=10: nine records cannot span ten intervals.
        let acc = filled(9, 0.1);
        assert_eq!(acc.rolling_rate(), 0.0);
    }

    #[test]
    fn test_rolling_rate_estimates_frequency() {
        let acc = filled(50, 0.01); // 100 Hz
        let rate = acc.rolling_rate();
        assert!((rate - 100.0).abs() < 1e-6, "rate was {rate}");
    }

    #[test]
    fn test_rolling_rate_zero_span_is_zero() {
        let schema = Arc::new(Schema::of_floats(&["x"]));
        let mut acc = Accumulator::new("stuck");
        for _ in 0..20 {
            acc.append_record(1.0, float_record(&schema, &[0.0]));
        }
        assert_eq!(acc.rolling_rate(), 0.0);
    }

    #[test]
    fn test_window_clamps_to_row_count() {
        let acc = filled(5, 0.1);
        let table = acc.window_by_count(100).unwrap();
        assert_eq!(table.num_rows(), 5);
    }

    #[test]
    fn test_window_on_empty_store_is_none() {
        let acc = Accumulator::new("empty");
        assert!(acc.window_by_count(10).is_none());
        assert!(acc.full_table().is_none());
        assert!(acc.window_by_duration(1.0).is_none());
    }

    #[test]
    fn test_window_by_duration_uses_rate() {
        let acc = filled(100, 0.01);
        let table = acc.window_by_duration(0.25).unwrap();
        // 100 Hz for 0.25 s: about 25 rows.
        assert!((20..=30).contains(&table.num_rows()));
    }

    #[test]
    fn test_window_by_duration_zero_rate_falls_through() {
        // Too few rows for a rate estimate: n = 0.0 * s = 0 -> None.
        let acc = filled(3, 0.1);
        assert!(acc.window_by_duration(10.0).is_none());
    }

    #[test]
    fn test_nearest_lookup_finds_preceding_row() {
        let schema = Arc::new(Schema::of_floats(&["x"]));
        let origin = Utc::now();
        let mut acc = Accumulator::new("lookup");
        acc.set_origin(origin);
        for i in 0..10 {
            acc.append_record(f64::from(i), float_record(&schema, &[f64::from(i)]));
        }
        let (t, record) = acc
            .nearest_at_or_before(origin + TimeDelta::milliseconds(4500))
            .unwrap();
        assert_eq!(t, 4.0);
        assert_eq!(record.values()[0], Value::Float(4.0));
    }

    #[test]
    fn test_nearest_lookup_before_first_sample_is_none() {
        let schema = Arc::new(Schema::of_floats(&["x"]));
        let origin = Utc::now();
        let mut acc = Accumulator::new("lookup");
        acc.set_origin(origin);
        for i in 1..5 {
            acc.append_record(f64::from(i), float_record(&schema, &[f64::from(i)]));
        }
        // Offset 0.5 precedes times[0] == 1.0: must not wrap to the end.
        assert!(acc
            .nearest_at_or_before(origin + TimeDelta::milliseconds(500))
            .is_none());
    }

    #[test]
    fn test_reset_notifies_observers_first() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut acc = filled(3, 0.1);
        acc.subscribe(move |n| sink.lock().unwrap().push(n));
        acc.reset(Some(vec!["x".to_string()]));
        assert_eq!(*seen.lock().unwrap(), vec![Notification::Reset]);
        assert_eq!(acc.monitored_fields(), Some(&["x".to_string()][..]));
    }

    #[test]
    fn test_ensure_origin_is_idempotent() {
        let mut acc = Accumulator::new("origin");
        acc.ensure_origin_started();
        let first = acc.origin().unwrap();
        acc.ensure_origin_started();
        assert_eq!(acc.origin().unwrap(), first);
    }

    #[test]
    fn test_export_rejects_unknown_format() {
        let acc = filled(3, 0.1);
        let err = acc.export("/tmp/riglog-nonexistent", "hdf5").unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
    }
}
