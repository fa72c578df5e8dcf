//! Union-schema parameter log
//!
//! Logs time-varying control parameters contributed by an ordered
//! collection of heterogeneous producers (active and inactive stimuli).
//! The schema is the union of every producer's dynamic parameter names,
//! computed once up front; at append time, whichever producer is driving
//! the experiment supplies a sparse subset of values and the rest of the
//! row is filled with NaN.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tracing::debug;

use super::Accumulator;
use crate::record::{Record, Schema, Value};

/// A producer that may contribute dynamic parameters to the union schema.
///
/// The capability is optional: producers with nothing to log return
/// `None` (the default) and are skipped without error when the schema is
/// rebuilt.
pub trait DynamicProducer {
    /// Names of the per-cycle parameters this producer logs, if any.
    fn dynamic_parameter_names(&self) -> Option<Vec<String>> {
        None
    }
}

/// Accumulator over a fixed union schema of dynamic parameters.
pub struct DynamicLog {
    accumulator: Accumulator,
    schema: Arc<Schema>,
}

impl DynamicLog {
    /// Build the log and compute its union schema from the producers.
    #[must_use]
    pub fn new(name: impl Into<String>, producers: &[&dyn DynamicProducer]) -> Self {
        let mut log = Self {
            accumulator: Accumulator::new(name),
            schema: Arc::new(Schema::of_floats::<&str>(&[])),
        };
        log.rebuild_schema(producers);
        log
    }

    /// Recompute the union schema for a new epoch and clear storage.
    ///
    /// Parameter names are collected producer by producer in first-seen
    /// order, de-duplicated; producers without the capability are
    /// skipped. Every field is a float (absent parameters store NaN).
    pub fn rebuild_schema(&mut self, producers: &[&dyn DynamicProducer]) {
        let mut names: Vec<String> = Vec::new();
        for producer in producers {
            if let Some(params) = producer.dynamic_parameter_names() {
                for name in params {
                    if !names.contains(&name) {
                        names.push(name);
                    }
                }
            }
        }
        debug!(log = %self.accumulator.name(), fields = ?names, "rebuilt union schema");
        self.schema = Arc::new(Schema::of_floats(&names));
        self.accumulator.reset(None);
    }

    /// The fixed union schema of the current epoch.
    #[must_use]
    pub fn union_schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Append one per-cycle snapshot at elapsed time `time` (seconds on
    /// the experiment clock). Fields absent from `values` store NaN.
    pub fn append(&mut self, time: f64, values: &HashMap<String, f64>) {
        self.accumulator.ensure_origin_started();
        let row = self
            .schema
            .field_names()
            .map(|name| Value::Float(values.get(name).copied().unwrap_or(f64::NAN)))
            .collect();
        let record = Record::from_parts(self.schema.clone(), row);
        self.accumulator.append_record(time, record);
    }
}

impl Deref for DynamicLog {
    type Target = Accumulator;

    fn deref(&self) -> &Accumulator {
        &self.accumulator
    }
}

impl DerefMut for DynamicLog {
    fn deref_mut(&mut self) -> &mut Accumulator {
        &mut self.accumulator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stimulus(Vec<&'static str>);

    impl DynamicProducer for Stimulus {
        fn dynamic_parameter_names(&self) -> Option<Vec<String>> {
            Some(self.0.iter().map(ToString::to_string).collect())
        }
    }

    struct StaticStimulus;

    impl DynamicProducer for StaticStimulus {}

    #[test]
    fn test_union_schema_first_seen_order() {
        let ab = Stimulus(vec!["a", "b"]);
        let bc = Stimulus(vec!["b", "c"]);
        let log = DynamicLog::new("stimulus", &[&ab, &bc]);
        let names: Vec<_> = log.union_schema().field_names().collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_producers_without_capability_are_skipped() {
        let ab = Stimulus(vec!["a", "b"]);
        let log = DynamicLog::new("stimulus", &[&StaticStimulus, &ab, &StaticStimulus]);
        let names: Vec<_> = log.union_schema().field_names().collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_absent_fields_store_nan() {
        let ab = Stimulus(vec!["a", "b"]);
        let bc = Stimulus(vec!["b", "c"]);
        let mut log = DynamicLog::new("stimulus", &[&ab, &bc]);
        log.append(0.5, &HashMap::from([("b".to_string(), 3.0)]));

        let table = log.full_table().unwrap();
        assert_eq!(table.column("b").unwrap()[0], Value::Float(3.0));
        for field in ["a", "c"] {
            match table.column(field).unwrap()[0] {
                Value::Float(v) => assert!(v.is_nan(), "{field} should be NaN"),
                ref other => panic!("expected float, got {other:?}"),
            }
        }
        assert_eq!(table.times(), &[0.5]);
    }

    #[test]
    fn test_rebuild_clears_storage() {
        let ab = Stimulus(vec!["a", "b"]);
        let mut log = DynamicLog::new("stimulus", &[&ab]);
        log.append(0.0, &HashMap::from([("a".to_string(), 1.0)]));
        assert_eq!(log.row_count(), 1);

        let c = Stimulus(vec!["c"]);
        log.rebuild_schema(&[&c]);
        assert_eq!(log.row_count(), 0);
        let names: Vec<_> = log.union_schema().field_names().collect();
        assert_eq!(names, vec!["c"]);
    }
}
