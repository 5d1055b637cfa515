//! Row-wise view over a record batch.

use arrow::array::{Array, AsArray, RecordBatch};
use arrow::datatypes::{
    DataType, Float16Type, Float32Type, Float64Type, Int8Type, Int16Type, Int32Type, Int64Type,
    TimeUnit, TimestampMicrosecondType, TimestampMillisecondType, TimestampNanosecondType,
    TimestampSecondType, UInt8Type, UInt16Type, UInt32Type, UInt64Type,
};
use arrow::util::display::array_value_to_string;
use chrono::{DateTime, NaiveDateTime};

use super::schema::TableSchema;
use crate::error::SinkError;

/// A single cell as handed to a database driver.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    BigInt(i64),
    Double(f64),
    Text(String),
    Timestamp(NaiveDateTime),
}

/// Cells of one table row, in [`TableSchema`] column order.
pub type Row = Vec<Value>;

/// Iterates the rows of a batch, prepending the index value when the table
/// has an index column.
pub struct BatchRows<'a> {
    batch: &'a RecordBatch,
    next_index: Option<i64>,
    row: usize,
}

impl<'a> BatchRows<'a> {
    /// `first_index` is the index value of the first row; ignored when
    /// `schema` has no index column.
    pub fn new(batch: &'a RecordBatch, schema: &TableSchema, first_index: i64) -> Self {
        Self {
            batch,
            next_index: schema.index_column().map(|_| first_index),
            row: 0,
        }
    }

    /// Rows not yet yielded.
    pub fn remaining(&self) -> usize {
        self.batch.num_rows() - self.row
    }
}

impl Iterator for BatchRows<'_> {
    type Item = Result<Row, SinkError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.row >= self.batch.num_rows() {
            return None;
        }

        let mut row = Vec::with_capacity(self.batch.num_columns() + 1);
        if let Some(index) = self.next_index.as_mut() {
            row.push(Value::BigInt(*index));
            *index += 1;
        }

        let fields = self.batch.schema_ref().fields();
        for (field, array) in fields.iter().zip(self.batch.columns()) {
            match cell(field.name(), array.as_ref(), self.row) {
                Ok(value) => row.push(value),
                Err(err) => return Some(Err(err)),
            }
        }

        self.row += 1;
        Some(Ok(row))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining(), Some(self.remaining()))
    }
}

/// Extract the value at `row` of `array`.
pub fn cell(column: &str, array: &dyn Array, row: usize) -> Result<Value, SinkError> {
    if array.is_null(row) {
        return Ok(Value::Null);
    }

    let value = match array.data_type() {
        DataType::Boolean => Value::Boolean(array.as_boolean().value(row)),
        DataType::Int8 => Value::BigInt(array.as_primitive::<Int8Type>().value(row).into()),
        DataType::Int16 => Value::BigInt(array.as_primitive::<Int16Type>().value(row).into()),
        DataType::Int32 => Value::BigInt(array.as_primitive::<Int32Type>().value(row).into()),
        DataType::Int64 => Value::BigInt(array.as_primitive::<Int64Type>().value(row)),
        DataType::UInt8 => Value::BigInt(array.as_primitive::<UInt8Type>().value(row).into()),
        DataType::UInt16 => Value::BigInt(array.as_primitive::<UInt16Type>().value(row).into()),
        DataType::UInt32 => Value::BigInt(array.as_primitive::<UInt32Type>().value(row).into()),
        DataType::UInt64 => {
            let v = array.as_primitive::<UInt64Type>().value(row);
            Value::BigInt(i64::try_from(v).map_err(|_| SinkError::Value {
                column: column.to_string(),
                message: format!("{v} does not fit in a BIGINT"),
            })?)
        }
        DataType::Float16 => Value::Double(array.as_primitive::<Float16Type>().value(row).to_f64()),
        DataType::Float32 => Value::Double(array.as_primitive::<Float32Type>().value(row).into()),
        DataType::Float64 => Value::Double(array.as_primitive::<Float64Type>().value(row)),
        DataType::Utf8 => Value::Text(array.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => Value::Text(array.as_string::<i64>().value(row).to_string()),
        DataType::Timestamp(unit, _) => {
            let micros = match unit {
                TimeUnit::Second => array
                    .as_primitive::<TimestampSecondType>()
                    .value(row)
                    .checked_mul(1_000_000),
                TimeUnit::Millisecond => array
                    .as_primitive::<TimestampMillisecondType>()
                    .value(row)
                    .checked_mul(1_000),
                TimeUnit::Microsecond => {
                    Some(array.as_primitive::<TimestampMicrosecondType>().value(row))
                }
                TimeUnit::Nanosecond => Some(
                    array
                        .as_primitive::<TimestampNanosecondType>()
                        .value(row)
                        .div_euclid(1_000),
                ),
            };
            let timestamp = micros
                .and_then(DateTime::from_timestamp_micros)
                .ok_or_else(|| SinkError::Value {
                    column: column.to_string(),
                    message: "timestamp out of range".to_string(),
                })?;
            Value::Timestamp(timestamp.naive_utc())
        }
        _ => Value::Text(
            array_value_to_string(array, row).map_err(|e| SinkError::Value {
                column: column.to_string(),
                message: e.to_string(),
            })?,
        ),
    };

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::parse_timestamp;
    use arrow::array::{
        BooleanArray, Date32Array, Float64Array, Int64Array, StringArray,
        TimestampMicrosecondArray, UInt64Array,
    };
    use arrow::datatypes::{Field, Schema};
    use std::sync::Arc;

    fn batch() -> RecordBatch {
        let pickup = parse_timestamp("2021-01-01 00:30:10")
            .unwrap()
            .and_utc()
            .timestamp_micros();
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, true),
            Field::new("fare", DataType::Float64, true),
            Field::new("flag", DataType::Utf8, true),
            Field::new("paid", DataType::Boolean, true),
            Field::new(
                "pickup",
                DataType::Timestamp(TimeUnit::Microsecond, None),
                true,
            ),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![Some(1), Some(2)])),
                Arc::new(Float64Array::from(vec![Some(8.0), None])),
                Arc::new(StringArray::from(vec![Some("N"), Some("Y")])),
                Arc::new(BooleanArray::from(vec![Some(true), Some(false)])),
                Arc::new(TimestampMicrosecondArray::from(vec![Some(pickup), None])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_rows_with_index() {
        let batch = batch();
        let schema = TableSchema::from_arrow(&batch.schema(), Some("index")).unwrap();
        let rows: Vec<Row> = BatchRows::new(&batch, &schema, 10)
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0],
            vec![
                Value::BigInt(10),
                Value::BigInt(1),
                Value::Double(8.0),
                Value::Text("N".to_string()),
                Value::Boolean(true),
                Value::Timestamp(parse_timestamp("2021-01-01 00:30:10").unwrap()),
            ]
        );
        assert_eq!(rows[1][0], Value::BigInt(11));
        assert_eq!(rows[1][2], Value::Null);
        assert_eq!(rows[1][5], Value::Null);
    }

    #[test]
    fn test_rows_without_index() {
        let batch = batch();
        let schema = TableSchema::from_arrow(&batch.schema(), None).unwrap();
        let mut rows = BatchRows::new(&batch, &schema, 10);

        assert_eq!(rows.size_hint(), (2, Some(2)));
        let first = rows.next().unwrap().unwrap();
        assert_eq!(first.len(), 5);
        assert_eq!(first[0], Value::BigInt(1));
        assert_eq!(rows.remaining(), 1);
    }

    #[test]
    fn test_unsigned_overflow_is_rejected() {
        let array = UInt64Array::from(vec![u64::MAX]);
        let err = cell("big", &array, 0).unwrap_err();
        assert!(matches!(err, SinkError::Value { column, .. } if column == "big"));
    }

    #[test]
    fn test_other_types_fall_back_to_text() {
        let array = Date32Array::from(vec![18628]);
        assert_eq!(
            cell("day", &array, 0).unwrap(),
            Value::Text("2021-01-01".to_string())
        );
    }
}
