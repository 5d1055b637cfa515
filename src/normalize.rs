//! Conversion of designated text columns to timestamps.
//!
//! The CSV source leaves every date-like column as text. The normalizer parses
//! the configured columns into `Timestamp(Microsecond, None)` and passes every
//! other column through untouched. A value that cannot be parsed fails the
//! whole batch; it is never replaced by null.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, RecordBatch, RecordBatchOptions};
use arrow::array::TimestampMicrosecondBuilder;
use arrow::datatypes::{DataType, Field, FieldRef, Schema, SchemaRef, TimeUnit};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use snafu::prelude::*;

use crate::error::{
    BatchBuildSnafu, InvalidTimestampSnafu, MissingColumnSnafu, NormalizeError,
    UnsupportedTypeSnafu,
};

/// Arrow type of every normalized column.
pub const TIMESTAMP_TYPE: DataType = DataType::Timestamp(TimeUnit::Microsecond, None);

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %I:%M:%S %p",
];

/// Converts a fixed set of columns to timestamps.
#[derive(Debug, Clone)]
pub struct Normalizer {
    columns: Vec<String>,
}

impl Normalizer {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// The designated columns.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Schema a batch with `schema` will have after [`normalize`](Self::normalize).
    pub fn normalize_schema(&self, schema: &Schema) -> Result<SchemaRef, NormalizeError> {
        let positions = self.positions(schema)?;
        Ok(with_timestamps(schema, &positions))
    }

    /// Return a copy of `batch` with the designated columns parsed.
    pub fn normalize(&self, batch: &RecordBatch) -> Result<RecordBatch, NormalizeError> {
        let input = batch.schema();
        let positions = self.positions(&input)?;
        let mut columns: Vec<ArrayRef> = batch.columns().to_vec();

        for &idx in &positions {
            columns[idx] = to_timestamps(input.field(idx).name(), &columns[idx])?;
        }

        let options = RecordBatchOptions::new().with_row_count(Some(batch.num_rows()));
        RecordBatch::try_new_with_options(with_timestamps(&input, &positions), columns, &options)
            .context(BatchBuildSnafu)
    }

    /// Column index of each designated column, in configuration order.
    fn positions(&self, schema: &Schema) -> Result<Vec<usize>, NormalizeError> {
        self.columns
            .iter()
            .map(|name| {
                let (idx, field) = schema
                    .column_with_name(name)
                    .context(MissingColumnSnafu { column: name })?;
                ensure!(
                    is_convertible(field.data_type()),
                    UnsupportedTypeSnafu {
                        column: name,
                        data_type: field.data_type().to_string(),
                    }
                );
                Ok(idx)
            })
            .collect()
    }
}

fn with_timestamps(schema: &Schema, positions: &[usize]) -> SchemaRef {
    let mut fields: Vec<FieldRef> = schema.fields().iter().cloned().collect();
    for &idx in positions {
        fields[idx] = Arc::new(Field::new(schema.field(idx).name(), TIMESTAMP_TYPE, true));
    }
    Arc::new(Schema::new_with_metadata(
        fields,
        schema.metadata().clone(),
    ))
}

fn is_convertible(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Timestamp(_, _)
    )
}

fn to_timestamps(column: &str, array: &ArrayRef) -> Result<ArrayRef, NormalizeError> {
    match array.data_type() {
        DataType::Utf8 => parse_column(column, array.len(), array.as_string::<i32>().iter()),
        DataType::LargeUtf8 => parse_column(column, array.len(), array.as_string::<i64>().iter()),
        DataType::Timestamp(_, _) => {
            arrow::compute::cast(array, &TIMESTAMP_TYPE).context(BatchBuildSnafu)
        }
        other => UnsupportedTypeSnafu {
            column,
            data_type: other.to_string(),
        }
        .fail(),
    }
}

fn parse_column<'a>(
    column: &str,
    len: usize,
    values: impl Iterator<Item = Option<&'a str>>,
) -> Result<ArrayRef, NormalizeError> {
    let mut builder = TimestampMicrosecondBuilder::with_capacity(len);

    for (row, value) in values.enumerate() {
        match value.map(str::trim) {
            None | Some("") => builder.append_null(),
            Some(text) => {
                let parsed = parse_timestamp(text).context(InvalidTimestampSnafu {
                    column,
                    row,
                    value: text,
                })?;
                builder.append_value(parsed.and_utc().timestamp_micros());
            }
        }
    }

    Ok(Arc::new(builder.finish()))
}

/// Parse a timestamp the way the TLC exports write them.
///
/// Accepts RFC 3339 (offsets are converted to UTC), ISO-8601 date-times with
/// a space or `T` separator and optional fractional seconds, plain dates, and
/// US-style `month/day/year` date-times.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int64Array, StringArray, TimestampMicrosecondArray};

    fn batch(pickups: Vec<Option<&str>>) -> RecordBatch {
        let n = pickups.len();
        let dropoffs: Vec<Option<&str>> = vec![Some("2021-01-01 01:00:00"); n];
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, true),
            Field::new("pickup_ts", DataType::Utf8, true),
            Field::new("dropoff_ts", DataType::Utf8, true),
            Field::new("note", DataType::Utf8, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from_iter_values(0..n as i64)),
                Arc::new(StringArray::from(pickups)),
                Arc::new(StringArray::from(dropoffs)),
                Arc::new(StringArray::from(vec![Some("2021-01-01"); n])),
            ],
        )
        .unwrap()
    }

    fn normalizer() -> Normalizer {
        Normalizer::new(["pickup_ts", "dropoff_ts"])
    }

    fn micros(text: &str) -> i64 {
        parse_timestamp(text).unwrap().and_utc().timestamp_micros()
    }

    #[test]
    fn test_converts_designated_columns_only() {
        let input = batch(vec![Some("2021-01-01T00:05:00"), Some("2021-01-01 00:15:56")]);
        let output = normalizer().normalize(&input).unwrap();

        let schema = output.schema();
        assert_eq!(schema.field(0).data_type(), &DataType::Int64);
        assert_eq!(schema.field(1).data_type(), &TIMESTAMP_TYPE);
        assert_eq!(schema.field(2).data_type(), &TIMESTAMP_TYPE);
        assert_eq!(schema.field(3).data_type(), &DataType::Utf8);
        assert_eq!(schema.field(3).name(), "note");

        let pickups = output.column(1).as_primitive::<arrow::datatypes::TimestampMicrosecondType>();
        assert_eq!(pickups.value(0), micros("2021-01-01T00:05:00"));
        assert_eq!(pickups.value(1), micros("2021-01-01 00:15:56"));

        // untouched columns share the same buffers
        assert_eq!(output.column(0).to_data(), input.column(0).to_data());
        assert_eq!(output.column(3).to_data(), input.column(3).to_data());
    }

    #[test]
    fn test_input_batch_is_not_modified() {
        let input = batch(vec![Some("2021-01-01T00:05:00")]);
        let _ = normalizer().normalize(&input).unwrap();
        assert_eq!(input.schema().field(1).data_type(), &DataType::Utf8);
    }

    #[test]
    fn test_text_and_timestamp_compare_equal() {
        let expected = NaiveDate::from_ymd_opt(2021, 1, 1)
            .unwrap()
            .and_hms_opt(0, 5, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2021-01-01T00:05:00"), Some(expected));
        assert_eq!(parse_timestamp("2021-01-01 00:05:00"), Some(expected));
        assert_eq!(parse_timestamp("2021-01-01T00:05:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2021-01-01T02:05:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("01/01/2021 12:05:00 AM"), Some(expected));
        assert_eq!(
            parse_timestamp("2021-01-01"),
            NaiveDate::from_ymd_opt(2021, 1, 1).unwrap().and_hms_opt(0, 0, 0)
        );
        assert_eq!(parse_timestamp("not-a-date"), None);
    }

    #[test]
    fn test_fractional_seconds() {
        let output = normalizer()
            .normalize(&batch(vec![Some("2021-01-01 00:00:00.250")]))
            .unwrap();
        let pickups: &TimestampMicrosecondArray = output.column(1).as_primitive();
        assert_eq!(pickups.value(0) % 1_000_000, 250_000);
    }

    #[test]
    fn test_nulls_and_blanks_stay_null() {
        let output = normalizer()
            .normalize(&batch(vec![None, Some(""), Some("2021-01-01 00:00:00")]))
            .unwrap();
        let pickups = output.column(1);
        assert!(pickups.is_null(0));
        assert!(pickups.is_null(1));
        assert!(!pickups.is_null(2));
    }

    #[test]
    fn test_invalid_value_fails_fast() {
        let err = normalizer()
            .normalize(&batch(vec![
                Some("2021-01-01 00:00:00"),
                Some("not-a-date"),
            ]))
            .unwrap_err();

        match err {
            NormalizeError::InvalidTimestamp { column, row, value } => {
                assert_eq!(column, "pickup_ts");
                assert_eq!(row, 1);
                assert_eq!(value, "not-a-date");
            }
            other => panic!("expected InvalidTimestamp, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_column() {
        let err = Normalizer::new(["pickup_ts", "tpep_dropoff_datetime"])
            .normalize(&batch(vec![Some("2021-01-01 00:00:00")]))
            .unwrap_err();
        assert!(matches!(
            err,
            NormalizeError::MissingColumn { column } if column == "tpep_dropoff_datetime"
        ));
    }

    #[test]
    fn test_non_text_column_rejected() {
        let err = Normalizer::new(["id"])
            .normalize(&batch(vec![Some("2021-01-01 00:00:00")]))
            .unwrap_err();
        assert!(matches!(err, NormalizeError::UnsupportedType { .. }));
    }

    #[test]
    fn test_output_schema_matches_normalize_schema() {
        let input = batch(vec![Some("2021-01-01 00:00:00")]);
        let normalizer = Normalizer::new(["dropoff_ts", "pickup_ts"]);

        let expected = normalizer.normalize_schema(&input.schema()).unwrap();
        let output = normalizer.normalize(&input).unwrap();
        assert_eq!(output.schema(), expected);
        assert_eq!(output.schema().field(1).name(), "pickup_ts");
        assert_eq!(output.schema().field(2).name(), "dropoff_ts");
    }

    #[test]
    fn test_empty_batch_changes_schema() {
        let input = batch(vec![]);
        let output = normalizer().normalize(&input).unwrap();
        assert_eq!(output.num_rows(), 0);
        assert_eq!(output.schema().field(1).data_type(), &TIMESTAMP_TYPE);
    }
}
