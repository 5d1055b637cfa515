//! SQLite backend.

use std::path::Path;

use rusqlite::types::{ToSqlOutput, Value as SqliteValue};
use rusqlite::{Connection, ToSql, params_from_iter};
use tracing::debug;

use super::schema::{Dialect, TableSchema};
use super::traits::Database;
use super::value::{BatchRows, Value};
use crate::config::ConnectionConfig;
use crate::error::SinkError;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// A file-backed or in-memory SQLite database.
pub struct SqliteDatabase {
    conn: Connection,
    target: String,
}

impl SqliteDatabase {
    /// Open the database named by `config.database`.
    pub fn open(config: &ConnectionConfig) -> Result<Self, SinkError> {
        Self::open_path(&config.database)
    }

    pub fn open_path(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let target = format!("sqlite://{}", path.as_ref().display());
        let conn = Connection::open(path.as_ref()).map_err(|e| SinkError::Connection {
            target: target.clone(),
            source: e.into(),
        })?;
        debug!("Opened {target}");
        Ok(Self { conn, target })
    }

    pub fn open_in_memory() -> Result<Self, SinkError> {
        Self::open_path(":memory:")
    }

    /// The underlying connection, for reading results back.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

impl Database for SqliteDatabase {
    fn replace_table(&mut self, table: &str, schema: &TableSchema) -> Result<(), SinkError> {
        let sql = schema.replace_table_sql(table, Dialect::Sqlite);
        self.conn
            .execute_batch(&sql)
            .map_err(|e| write_error(table, e))
    }

    fn insert_rows(
        &mut self,
        table: &str,
        schema: &TableSchema,
        rows: BatchRows<'_>,
    ) -> Result<u64, SinkError> {
        let tx = self.conn.transaction().map_err(|e| write_error(table, e))?;
        let mut count = 0u64;
        {
            let mut stmt = tx
                .prepare_cached(&schema.insert_sql(table))
                .map_err(|e| write_error(table, e))?;
            for row in rows {
                let row = row?;
                stmt.execute(params_from_iter(row.iter()))
                    .map_err(|e| write_error(table, e))?;
                count += 1;
            }
        }
        // dropping an uncommitted transaction rolls it back
        tx.commit().map_err(|e| write_error(table, e))?;
        Ok(count)
    }
}

fn write_error(table: &str, source: rusqlite::Error) -> SinkError {
    SinkError::Write {
        table: table.to_string(),
        source: source.into(),
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let value = match self {
            Value::Null => SqliteValue::Null,
            Value::Boolean(v) => SqliteValue::Integer(i64::from(*v)),
            Value::BigInt(v) => SqliteValue::Integer(*v),
            Value::Double(v) => SqliteValue::Real(*v),
            Value::Text(v) => return Ok(ToSqlOutput::from(v.as_str())),
            Value::Timestamp(v) => SqliteValue::Text(v.format(TIMESTAMP_FORMAT).to_string()),
        };
        Ok(ToSqlOutput::Owned(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{TIMESTAMP_TYPE, parse_timestamp};
    use arrow::array::{Float64Array, Int64Array, RecordBatch, TimestampMicrosecondArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn batch(ids: Vec<i64>) -> RecordBatch {
        let pickup = parse_timestamp("2021-01-01 00:30:10")
            .unwrap()
            .and_utc()
            .timestamp_micros();
        let n = ids.len();
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, true),
            Field::new("fare", DataType::Float64, true),
            Field::new("pickup", TIMESTAMP_TYPE, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(ids)),
                Arc::new(Float64Array::from(vec![Some(2.5); n])),
                Arc::new(TimestampMicrosecondArray::from(vec![Some(pickup); n])),
            ],
        )
        .unwrap()
    }

    fn count(db: &SqliteDatabase, table: &str) -> i64 {
        db.connection()
            .query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_write_and_read_back() {
        let input = batch(vec![1, 2, 3]);
        let schema = TableSchema::from_arrow(&input.schema(), Some("index")).unwrap();
        let mut db = SqliteDatabase::open_in_memory().unwrap();

        db.replace_table("trips", &schema).unwrap();
        let inserted = db
            .insert_rows("trips", &schema, BatchRows::new(&input, &schema, 0))
            .unwrap();
        assert_eq!(inserted, 3);
        assert_eq!(count(&db, "trips"), 3);

        let (index, pickup): (i64, String) = db
            .connection()
            .query_row(
                "SELECT \"index\", pickup FROM trips WHERE id = 3",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(index, 2);
        assert_eq!(pickup, "2021-01-01 00:30:10");
    }

    #[test]
    fn test_timestamp_column_compares_with_text() {
        let input = batch(vec![1]);
        let schema = TableSchema::from_arrow(&input.schema(), None).unwrap();
        let mut db = SqliteDatabase::open_in_memory().unwrap();
        db.replace_table("trips", &schema).unwrap();
        db.insert_rows("trips", &schema, BatchRows::new(&input, &schema, 0))
            .unwrap();

        let matches: i64 = db
            .connection()
            .query_row(
                "SELECT COUNT(*) FROM trips WHERE pickup = '2021-01-01 00:30:10'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(matches, 1);
    }

    #[test]
    fn test_replace_drops_previous_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("taxi.db");
        let input = batch(vec![1, 2]);
        let schema = TableSchema::from_arrow(&input.schema(), Some("index")).unwrap();

        {
            let mut db = SqliteDatabase::open_path(&path).unwrap();
            db.replace_table("trips", &schema).unwrap();
            db.insert_rows("trips", &schema, BatchRows::new(&input, &schema, 0))
                .unwrap();
        }

        let mut db = SqliteDatabase::open_path(&path).unwrap();
        assert_eq!(count(&db, "trips"), 2);
        db.replace_table("trips", &schema).unwrap();
        assert_eq!(count(&db, "trips"), 0);

        let indexes: i64 = db
            .connection()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = 'ix_trips_index'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(indexes, 1);
    }

    #[test]
    fn test_insert_without_table_fails() {
        let input = batch(vec![1]);
        let schema = TableSchema::from_arrow(&input.schema(), None).unwrap();
        let mut db = SqliteDatabase::open_in_memory().unwrap();

        let err = db
            .insert_rows("trips", &schema, BatchRows::new(&input, &schema, 0))
            .unwrap_err();
        assert!(matches!(err, SinkError::Write { .. }));
    }

    #[test]
    fn test_unopenable_path_is_a_connection_error() {
        let result = SqliteDatabase::open_path("/nonexistent/dir/taxi.db");
        assert!(matches!(result, Err(SinkError::Connection { .. })));
    }
}
