//! Column-oriented query results
//!
//! Window queries and exports hand data out as a [`Table`]: the aligned
//! time column plus one column per schema field. The table owns its data
//! (copied out of the accumulator), so callers can hold it across drain
//! ticks, and it converts to an Arrow `RecordBatch` for the binary export
//! paths.

use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int64Array, RecordBatch, StringArray};
use arrow::datatypes::{DataType, Field as ArrowField, Schema as ArrowSchema};
use std::sync::Arc;

use crate::record::{FieldType, Record, Schema, Value};
use crate::Result;

/// Synthetic name of the leading time column.
pub const TIME_COLUMN: &str = "t";

/// Column-oriented snapshot of a window of accumulator rows.
#[derive(Debug, Clone)]
pub struct Table {
    schema: Arc<Schema>,
    times: Vec<f64>,
    columns: Vec<Vec<Value>>,
}

impl Table {
    /// Assemble a table from row-oriented storage.
    ///
    /// Rows shorter than the schema (possible only under the pass-through
    /// log's trusted-producer contract) are padded with NaN cells; extra
    /// trailing values are dropped.
    pub(crate) fn from_rows(schema: Arc<Schema>, times: &[f64], rows: &[Record]) -> Self {
        debug_assert_eq!(times.len(), rows.len());
        let mut columns = vec![Vec::with_capacity(rows.len()); schema.len()];
        for row in rows {
            for (j, col) in columns.iter_mut().enumerate() {
                col.push(
                    row.values()
                        .get(j)
                        .cloned()
                        .unwrap_or(Value::Float(f64::NAN)),
                );
            }
        }
        Self {
            schema,
            times: times.to_vec(),
            columns,
        }
    }

    /// Number of rows.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.times.len()
    }

    /// Schema of the value columns (the time column is synthetic).
    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Ordered column names, `"t"` first.
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        std::iter::once(TIME_COLUMN.to_string())
            .chain(self.schema.field_names().map(str::to_string))
            .collect()
    }

    /// The aligned time column (seconds from the epoch origin).
    #[must_use]
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// A named value column, if present.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.schema
            .position(name)
            .map(|i| self.columns[i].as_slice())
    }

    /// All value columns in schema order.
    #[must_use]
    pub fn value_columns(&self) -> &[Vec<Value>] {
        &self.columns
    }

    /// Convert to an Arrow record batch for the Feather/Parquet writers.
    ///
    /// Cells whose value does not match the column's type tag (trusted-
    /// producer drift) become nulls; float columns carry NaN instead.
    ///
    /// # Errors
    ///
    /// Returns an error if Arrow rejects the assembled batch.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let mut fields = Vec::with_capacity(self.schema.len() + 1);
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(self.schema.len() + 1);

        fields.push(ArrowField::new(TIME_COLUMN, DataType::Float64, false));
        arrays.push(Arc::new(Float64Array::from(self.times.clone())));

        for (field, column) in self.schema.fields().iter().zip(&self.columns) {
            let (data_type, array): (DataType, ArrayRef) = match field.data_type() {
                FieldType::Float => (
                    DataType::Float64,
                    Arc::new(Float64Array::from_iter_values(
                        column.iter().map(|v| v.as_f64().unwrap_or(f64::NAN)),
                    )),
                ),
                FieldType::Int => (
                    DataType::Int64,
                    Arc::new(Int64Array::from(
                        column
                            .iter()
                            .map(|v| match v {
                                Value::Int(i) => Some(*i),
                                _ => None,
                            })
                            .collect::<Vec<_>>(),
                    )),
                ),
                FieldType::Bool => (
                    DataType::Boolean,
                    Arc::new(BooleanArray::from(
                        column
                            .iter()
                            .map(|v| match v {
                                Value::Bool(b) => Some(*b),
                                _ => None,
                            })
                            .collect::<Vec<_>>(),
                    )),
                ),
                FieldType::Text => (
                    DataType::Utf8,
                    Arc::new(StringArray::from(
                        column
                            .iter()
                            .map(|v| match v {
                                Value::Text(s) => Some(s.as_str()),
                                _ => None,
                            })
                            .collect::<Vec<_>>(),
                    )),
                ),
            };
            let nullable = field.data_type() != FieldType::Float;
            fields.push(ArrowField::new(field.name(), data_type, nullable));
            arrays.push(array);
        }

        let batch = RecordBatch::try_new(Arc::new(ArrowSchema::new(fields)), arrays)?;
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Field;

    fn sample_table() -> Table {
        let schema = Arc::new(Schema::new(vec![
            Field::new("x", FieldType::Float),
            Field::new("tracked", FieldType::Bool),
            Field::new("label", FieldType::Text),
        ]));
        let rows: Vec<Record> = (0..3)
            .map(|i| {
                Record::new(
                    schema.clone(),
                    vec![
                        Value::Float(f64::from(i) * 0.5),
                        Value::Bool(i % 2 == 0),
                        Value::Text(format!("s{i}")),
                    ],
                )
                .unwrap()
            })
            .collect();
        Table::from_rows(schema, &[0.0, 0.1, 0.2], &rows)
    }

    #[test]
    fn test_column_names_prepend_time() {
        let table = sample_table();
        assert_eq!(table.column_names(), vec!["t", "x", "tracked", "label"]);
    }

    #[test]
    fn test_column_lookup() {
        let table = sample_table();
        let xs = table.column("x").unwrap();
        assert_eq!(xs[2], Value::Float(1.0));
        assert!(table.column("t").is_none()); // time lives in times()
        assert!(table.column("missing").is_none());
    }

    #[test]
    fn test_record_batch_layout() {
        let table = sample_table();
        let batch = table.to_record_batch().unwrap();
        assert_eq!(batch.num_rows(), 3);
        assert_eq!(batch.num_columns(), 4);
        assert_eq!(batch.schema().field(0).name(), "t");
        assert_eq!(batch.schema().field(2).data_type(), &DataType::Boolean);
    }

    #[test]
    fn test_short_rows_pad_with_nan() {
        let schema = Arc::new(Schema::of_floats(&["a", "b"]));
        let short = Record::from_parts(schema.clone(), vec![Value::Float(7.0)]);
        let table = Table::from_rows(schema, &[0.0], &[short]);
        assert_eq!(table.column("a").unwrap()[0], Value::Float(7.0));
        match table.column("b").unwrap()[0] {
            Value::Float(v) => assert!(v.is_nan()),
            ref other => panic!("expected NaN pad, got {other:?}"),
        }
    }
}
