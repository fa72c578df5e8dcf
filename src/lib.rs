//! # riglog: Real-Time Stream Accumulation for Laboratory Rigs
//!
//! riglog ingests timestamped, schema-variable records produced by
//! independent worker processes (camera drivers, frame-processing
//! pipelines, stimulus generators) and turns them into queryable,
//! exportable time series while the experiment is running.
//!
//! ## Design
//!
//! - **Append-only epochs**: an accumulator stores one schema per epoch;
//!   a `reset` (explicit or triggered by an in-flight schema change)
//!   starts a new epoch with a new time origin.
//! - **Drain-to-exhaustion consumption**: one periodic tick drains each
//!   producer queue fully, so bursty producers cannot grow queues
//!   without bound and the consuming loop never blocks for long.
//! - **Tolerant polling surface**: rolling rate and window queries are
//!   polled every display frame and never fail; degeneracies normalize
//!   to zero/empty results.
//!
//! ## Example
//!
//! ```rust
//! use chrono::Utc;
//! use crossbeam_channel::bounded;
//! use riglog::{QueueAccumulator, Record, Schema, Value};
//! use std::sync::Arc;
//!
//! let (tx, rx) = bounded(256);
//! let schema = Arc::new(Schema::of_floats(&["x", "y"]));
//! tx.send((
//!     Utc::now(),
//!     Record::new(schema, vec![Value::Float(0.1), Value::Float(0.2)])?,
//! ))
//! .unwrap();
//!
//! let mut tracking = QueueAccumulator::new("tracking", rx);
//! tracking.drain();
//! assert_eq!(tracking.schema()?, vec!["t", "x", "y"]);
//! # Ok::<(), riglog::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod accumulator;
pub mod error;
pub mod estimator;
pub mod export;
pub mod record;
pub mod table;

pub use accumulator::dynamic::{DynamicLog, DynamicProducer};
pub use accumulator::estimator::EstimatorLog;
pub use accumulator::queue::{QueueAccumulator, TimedRecord, QUEUE_PULL_TIMEOUT};
pub use accumulator::{Accumulator, Notification, DEFAULT_RATE_WINDOW};
pub use error::{Error, Result};
pub use estimator::{Estimator, PositionEstimator, VigorEstimator};
pub use export::LogFormat;
pub use record::{Field, FieldType, Record, Schema, Value};
pub use table::Table;
