//! Closed-loop estimators
//!
//! An estimator turns the tracking stream into the per-cycle feedback
//! quantity a closed-loop stimulus consumes: swim vigor for
//! head-restrained preparations, position for freely-swimming ones. The
//! variant is chosen once at experiment configuration; every cycle it
//! reads the tracking accumulator through its query surface and appends
//! its output to an attached [`EstimatorLog`].

use std::sync::Arc;

use crate::accumulator::estimator::EstimatorLog;
use crate::accumulator::Accumulator;
use crate::record::{Record, Schema, Value};

/// Per-cycle feedback estimator with an attached pass-through log.
pub trait Estimator {
    /// Start a new epoch: clear the attached log.
    fn reset(&mut self);

    /// Read the tracking accumulator and log this cycle's output at
    /// elapsed time `time` (seconds on the experiment clock).
    fn update(&mut self, tracking: &Accumulator, time: f64);

    /// The attached output log.
    fn log(&self) -> &EstimatorLog;
}

/// Velocity-based feedback: swim vigor as the rolling standard deviation
/// of a monitored tracking field over a short trailing window.
pub struct VigorEstimator {
    log: EstimatorLog,
    field: String,
    window_seconds: f64,
    gain: f64,
    schema: Arc<Schema>,
}

impl VigorEstimator {
    /// Default trailing window, matching a few tail-beat half-cycles.
    pub const DEFAULT_WINDOW: f64 = 0.05;

    /// Estimate vigor from `field` of the tracking stream.
    #[must_use]
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            log: EstimatorLog::new("vigor_estimator"),
            field: field.into(),
            window_seconds: Self::DEFAULT_WINDOW,
            gain: 1.0,
            schema: Arc::new(Schema::of_floats(&["vigor"])),
        }
    }

    /// Override the trailing window length in seconds.
    #[must_use]
    pub fn with_window(mut self, seconds: f64) -> Self {
        self.window_seconds = seconds;
        self
    }

    /// Scale the vigor output.
    #[must_use]
    pub fn with_gain(mut self, gain: f64) -> Self {
        self.gain = gain;
        self
    }

    /// The most recently logged vigor, if any.
    #[must_use]
    pub fn last_vigor(&self) -> Option<f64> {
        self.log
            .window_by_count(1)
            .and_then(|t| t.column("vigor")?.first()?.as_f64())
    }
}

impl Estimator for VigorEstimator {
    fn reset(&mut self) {
        self.log.reset(None);
    }

    fn update(&mut self, tracking: &Accumulator, time: f64) {
        let vigor = tracking
            .window_by_duration(self.window_seconds)
            .and_then(|window| {
                let column = window.column(&self.field)?;
                let xs: Vec<f64> = column
                    .iter()
                    .filter_map(Value::as_f64)
                    .filter(|v| v.is_finite())
                    .collect();
                std_dev(&xs)
            })
            .map_or(0.0, |sd| sd * self.gain);
        let record = Record::from_parts(self.schema.clone(), vec![Value::Float(vigor)]);
        self.log.append(time, record);
    }

    fn log(&self) -> &EstimatorLog {
        &self.log
    }
}

#[allow(clippy::cast_precision_loss)]
fn std_dev(xs: &[f64]) -> Option<f64> {
    if xs.is_empty() {
        return None;
    }
    let n = xs.len() as f64;
    let mean = xs.iter().sum::<f64>() / n;
    let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    Some(var.sqrt())
}

/// Position-based feedback: passes the latest tracked pose through.
pub struct PositionEstimator {
    log: EstimatorLog,
    schema: Arc<Schema>,
}

impl PositionEstimator {
    const FIELDS: [&'static str; 3] = ["x", "y", "theta"];

    /// Create a pose pass-through estimator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            log: EstimatorLog::new("position_estimator"),
            schema: Arc::new(Schema::of_floats(&Self::FIELDS)),
        }
    }
}

impl Default for PositionEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl Estimator for PositionEstimator {
    fn reset(&mut self) {
        self.log.reset(None);
    }

    fn update(&mut self, tracking: &Accumulator, time: f64) {
        let Some(latest) = tracking.window_by_count(1) else {
            return; // nothing tracked yet this epoch
        };
        let row = Self::FIELDS
            .iter()
            .map(|field| {
                let value = latest
                    .column(field)
                    .and_then(|c| c.first())
                    .and_then(Value::as_f64)
                    .unwrap_or(f64::NAN);
                Value::Float(value)
            })
            .collect();
        let record = Record::from_parts(self.schema.clone(), row);
        self.log.append(time, record);
    }

    fn log(&self) -> &EstimatorLog {
        &self.log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[allow(clippy::cast_precision_loss)]
    fn tracking_with(fields: &[&str], rows: &[&[f64]], dt: f64) -> Accumulator {
        let schema = Arc::new(Schema::of_floats(fields));
        let mut acc = Accumulator::new("tracking");
        acc.set_origin(Utc::now());
        for (i, row) in rows.iter().enumerate() {
            let values = row.iter().map(|&v| Value::Float(v)).collect();
            acc.append_record(i as f64 * dt, Record::from_parts(schema.clone(), values));
        }
        acc
    }

    #[test]
    fn test_vigor_is_zero_on_flat_signal() {
        let rows: Vec<&[f64]> = vec![&[0.5]; 40];
        let tracking = tracking_with(&["tail_sum"], &rows, 0.005);
        let mut est = VigorEstimator::new("tail_sum");
        est.update(&tracking, 0.2);
        assert_eq!(est.last_vigor(), Some(0.0));
    }

    #[test]
    fn test_vigor_scales_with_gain() {
        let rows: Vec<&[f64]> = (0..40)
            .map(|i| if i % 2 == 0 { &[1.0][..] } else { &[-1.0][..] })
            .collect();
        let tracking = tracking_with(&["tail_sum"], &rows, 0.005);

        let mut unit = VigorEstimator::new("tail_sum").with_window(0.1);
        unit.update(&tracking, 0.2);
        let mut doubled = VigorEstimator::new("tail_sum").with_window(0.1).with_gain(2.0);
        doubled.update(&tracking, 0.2);

        let base = unit.last_vigor().unwrap();
        assert!(base > 0.0);
        let scaled = doubled.last_vigor().unwrap();
        assert!((scaled - 2.0 * base).abs() < 1e-12);
    }

    #[test]
    fn test_vigor_on_empty_tracking_logs_zero() {
        let tracking = Accumulator::new("tracking");
        let mut est = VigorEstimator::new("tail_sum");
        est.update(&tracking, 0.0);
        assert_eq!(est.last_vigor(), Some(0.0));
        assert_eq!(est.log().row_count(), 1);
    }

    #[test]
    fn test_position_passes_latest_pose_through() {
        let tracking = tracking_with(
            &["x", "y", "theta"],
            &[&[1.0, 2.0, 0.1], &[3.0, 4.0, 0.2]],
            0.01,
        );
        let mut est = PositionEstimator::new();
        est.update(&tracking, 0.02);
        let table = est.log().full_table().unwrap();
        assert_eq!(table.column("x").unwrap(), &[Value::Float(3.0)]);
        assert_eq!(table.column("theta").unwrap(), &[Value::Float(0.2)]);
    }

    #[test]
    fn test_position_skips_empty_tracking() {
        let tracking = Accumulator::new("tracking");
        let mut est = PositionEstimator::new();
        est.update(&tracking, 0.0);
        assert_eq!(est.log().row_count(), 0);
    }

    #[test]
    fn test_reset_clears_attached_log() {
        let tracking = tracking_with(&["x", "y", "theta"], &[&[1.0, 2.0, 0.3]], 0.01);
        let mut est = PositionEstimator::new();
        est.update(&tracking, 0.01);
        assert_eq!(est.log().row_count(), 1);
        est.reset();
        assert_eq!(est.log().row_count(), 0);
    }
}
