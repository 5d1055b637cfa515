//! In-process table store.

use std::collections::HashMap;

use super::schema::TableSchema;
use super::traits::Database;
use super::value::{BatchRows, Row};
use crate::error::SinkError;

#[derive(Debug, Clone)]
pub struct MemoryTable {
    pub schema: TableSchema,
    pub rows: Vec<Row>,
}

/// Keeps tables in a map. Useful in tests and when no database is wanted.
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    tables: HashMap<String, MemoryTable>,
    replacements: u64,
    inserts: u64,
    fail_insert: Option<u64>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the `n`th call to `insert_rows` (1-based) fail without writing.
    pub fn failing_insert(mut self, n: u64) -> Self {
        self.fail_insert = Some(n);
        self
    }

    pub fn table(&self, name: &str) -> Option<&MemoryTable> {
        self.tables.get(name)
    }

    /// Number of times any table was replaced.
    pub fn replacements(&self) -> u64 {
        self.replacements
    }

    /// Number of `insert_rows` calls, including failed ones.
    pub fn inserts(&self) -> u64 {
        self.inserts
    }
}

impl Database for MemoryDatabase {
    fn replace_table(&mut self, table: &str, schema: &TableSchema) -> Result<(), SinkError> {
        self.tables.insert(
            table.to_string(),
            MemoryTable {
                schema: schema.clone(),
                rows: Vec::new(),
            },
        );
        self.replacements += 1;
        Ok(())
    }

    fn insert_rows(
        &mut self,
        table: &str,
        schema: &TableSchema,
        rows: BatchRows<'_>,
    ) -> Result<u64, SinkError> {
        self.inserts += 1;
        if self.fail_insert == Some(self.inserts) {
            return Err(SinkError::Write {
                table: table.to_string(),
                source: "injected insert failure".into(),
            });
        }

        let stored = self.tables.get_mut(table).ok_or_else(|| SinkError::Write {
            table: table.to_string(),
            source: format!("no such table: {table}").into(),
        })?;
        if &stored.schema != schema {
            return Err(SinkError::SchemaMismatch {
                table: table.to_string(),
                expected: stored.schema.describe(),
                found: schema.describe(),
            });
        }

        // Collect first so a bad row leaves the table untouched.
        let rows = rows.collect::<Result<Vec<Row>, _>>()?;
        let count = rows.len() as u64;
        stored.rows.extend(rows);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::value::Value;
    use arrow::array::{Int64Array, RecordBatch, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn batch(ids: Vec<i64>) -> RecordBatch {
        let names: Vec<String> = ids.iter().map(|i| format!("row{i}")).collect();
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, true),
            Field::new("name", DataType::Utf8, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(ids)),
                Arc::new(StringArray::from(names)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_replace_then_insert() {
        let input = batch(vec![1, 2]);
        let schema = TableSchema::from_arrow(&input.schema(), None).unwrap();
        let mut db = MemoryDatabase::new();

        db.replace_table("trips", &schema).unwrap();
        let count = db
            .insert_rows("trips", &schema, BatchRows::new(&input, &schema, 0))
            .unwrap();

        assert_eq!(count, 2);
        let table = db.table("trips").unwrap();
        assert_eq!(table.rows[1][1], Value::Text("row2".to_string()));

        db.replace_table("trips", &schema).unwrap();
        assert!(db.table("trips").unwrap().rows.is_empty());
        assert_eq!(db.replacements(), 2);
    }

    #[test]
    fn test_insert_into_missing_table() {
        let input = batch(vec![1]);
        let schema = TableSchema::from_arrow(&input.schema(), None).unwrap();
        let mut db = MemoryDatabase::new();

        let err = db
            .insert_rows("trips", &schema, BatchRows::new(&input, &schema, 0))
            .unwrap_err();
        assert!(matches!(err, SinkError::Write { .. }));
    }

    #[test]
    fn test_injected_failure_writes_nothing() {
        let input = batch(vec![1, 2, 3]);
        let schema = TableSchema::from_arrow(&input.schema(), None).unwrap();
        let mut db = MemoryDatabase::new().failing_insert(2);
        db.replace_table("trips", &schema).unwrap();

        db.insert_rows("trips", &schema, BatchRows::new(&input, &schema, 0))
            .unwrap();
        assert!(
            db.insert_rows("trips", &schema, BatchRows::new(&input, &schema, 3))
                .is_err()
        );
        assert_eq!(db.table("trips").unwrap().rows.len(), 3);
        assert_eq!(db.inserts(), 2);
    }
}
