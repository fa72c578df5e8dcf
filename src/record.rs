//! Runtime-described records and schemas
//!
//! The shape of a record is not known statically: it depends on which
//! tracking method or stimulus is active when the producer emits it. A
//! [`Schema`] is therefore a runtime descriptor (ordered field names plus
//! per-field type tags), and schema equality is structural. Producers
//! switch schemas simply by emitting differently-shaped records; consumers
//! detect the transition by comparing descriptors.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::{Error, Result};

/// Type tag for one schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    /// 64-bit float (measurements, derived quantities)
    Float,
    /// 64-bit signed integer (counters, indices)
    Int,
    /// Boolean flag
    Bool,
    /// Categorical text label
    Text,
}

/// One named, typed field of a schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    name: String,
    data_type: FieldType,
}

impl Field {
    /// Create a field descriptor.
    pub fn new(name: impl Into<String>, data_type: FieldType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }

    /// Field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field type tag.
    #[must_use]
    pub const fn data_type(&self) -> FieldType {
        self.data_type
    }
}

/// Ordered field descriptor for one epoch's records.
///
/// Two records are schema-compatible iff their schemas compare equal:
/// same field names, same order, same type tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    /// Create a schema from an ordered field list.
    #[must_use]
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Convenience: an all-float schema, used by the union-schema log
    /// where every dynamic parameter is a float (absent ones are NaN).
    #[must_use]
    pub fn of_floats<S: AsRef<str>>(names: &[S]) -> Self {
        Self {
            fields: names
                .iter()
                .map(|n| Field::new(n.as_ref(), FieldType::Float))
                .collect(),
        }
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when the schema has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Ordered field descriptors.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Ordered field names.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(Field::name)
    }

    /// Position of a named field, if present.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name() == name)
    }
}

/// One stored cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Float measurement. NaN is the "absent parameter" sentinel.
    Float(f64),
    /// Integer measurement.
    Int(i64),
    /// Boolean flag.
    Bool(bool),
    /// Categorical label.
    Text(String),
}

impl Value {
    /// Numeric view of the value. Booleans map to 0/1, text to `None`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            Self::Bool(v) => Some(f64::from(u8::from(*v))),
            Self::Text(_) => None,
        }
    }

    /// The type tag this value satisfies.
    #[must_use]
    pub const fn field_type(&self) -> FieldType {
        match self {
            Self::Float(_) => FieldType::Float,
            Self::Int(_) => FieldType::Int,
            Self::Bool(_) => FieldType::Bool,
            Self::Text(_) => FieldType::Text,
        }
    }
}

impl fmt::Display for Value {
    /// Tabular-text cell encoding: booleans as `0`/`1`, floats in
    /// round-trippable shortest form.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{}", u8::from(*v)),
            Self::Text(v) => write!(f, "{v}"),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

/// One fixed-shape tuple of values, tagged with its schema.
///
/// The schema handle is shared (`Arc`) across every record of an epoch,
/// so the per-record overhead of carrying the descriptor is one pointer.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    schema: Arc<Schema>,
    values: Vec<Value>,
}

impl Record {
    /// Create a record, validating values against the schema.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaMismatch`] if the value count differs from
    /// the field count or a value's type tag differs from its field's.
    pub fn new(schema: Arc<Schema>, values: Vec<Value>) -> Result<Self> {
        if values.len() != schema.len() {
            return Err(Error::SchemaMismatch(format!(
                "expected {} values for schema {:?}, got {}",
                schema.len(),
                schema.field_names().collect::<Vec<_>>(),
                values.len()
            )));
        }
        for (field, value) in schema.fields().iter().zip(&values) {
            if field.data_type() != value.field_type() {
                return Err(Error::SchemaMismatch(format!(
                    "field '{}' expects {:?}, got {:?}",
                    field.name(),
                    field.data_type(),
                    value.field_type()
                )));
            }
        }
        Ok(Self { schema, values })
    }

    /// Create a record without validation. Internal constructor for
    /// paths that build values directly from the schema.
    pub(crate) fn from_parts(schema: Arc<Schema>, values: Vec<Value>) -> Self {
        Self { schema, values }
    }

    /// The record's schema descriptor.
    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Ordered values.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Value of a named field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.schema.position(name).and_then(|i| self.values.get(i))
    }
}
