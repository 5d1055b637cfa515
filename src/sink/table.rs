//! Table sink: replaces the destination table on the first write and
//! appends on every write after that.

use arrow::array::RecordBatch;
use tracing::{debug, warn};

use super::schema::TableSchema;
use super::traits::Database;
use super::value::BatchRows;
use crate::emit;
use crate::error::SinkError;
use crate::metrics::events::TableReplaced;

/// What a successful [`TableSink::write`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The table was (re)created, then the batch rows were inserted.
    Replaced { rows: u64 },
    /// The batch rows were appended to the existing table.
    Appended { rows: u64 },
}

impl WriteOutcome {
    pub fn rows(&self) -> u64 {
        match self {
            WriteOutcome::Replaced { rows } | WriteOutcome::Appended { rows } => *rows,
        }
    }
}

/// Writes batches into one named table.
pub struct TableSink<D> {
    db: D,
    table: String,
    index_label: Option<String>,
    established: Option<TableSchema>,
    next_index: i64,
    rows_written: u64,
}

impl<D: Database> TableSink<D> {
    /// `index_label` names the row index column; `None` writes no index.
    pub fn new(db: D, table: impl Into<String>, index_label: Option<&str>) -> Self {
        Self {
            db,
            table: table.into(),
            index_label: index_label.map(str::to_string),
            established: None,
            next_index: 0,
            rows_written: 0,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// True once the table has been created in this run.
    pub fn is_initialized(&self) -> bool {
        self.established.is_some()
    }

    /// Layout fixed by the first write.
    pub fn schema(&self) -> Option<&TableSchema> {
        self.established.as_ref()
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    pub fn database(&self) -> &D {
        &self.db
    }

    pub fn into_database(self) -> D {
        self.db
    }

    /// Persist `batch`.
    ///
    /// The first call drops and recreates the table from the batch schema
    /// (the batch may be empty). Later calls must carry the same schema.
    pub fn write(&mut self, batch: &RecordBatch) -> Result<WriteOutcome, SinkError> {
        let derived = TableSchema::from_arrow(&batch.schema(), self.index_label.as_deref())?;

        let (schema, replaced) = match self.established.take() {
            None => {
                warn!(
                    "Replacing table {} ({} columns); existing rows are dropped",
                    self.table,
                    derived.columns().len()
                );
                self.db.replace_table(&self.table, &derived)?;
                emit!(TableReplaced {
                    columns: derived.columns().len(),
                    target: self.table.clone(),
                });
                (derived, true)
            }
            Some(expected) if expected == derived => (expected, false),
            Some(expected) => {
                let err = SinkError::SchemaMismatch {
                    table: self.table.clone(),
                    expected: expected.describe(),
                    found: derived.describe(),
                };
                self.established = Some(expected);
                return Err(err);
            }
        };

        let rows = BatchRows::new(batch, &schema, self.next_index);
        let result = self.db.insert_rows(&self.table, &schema, rows);
        self.established = Some(schema);
        let inserted = result?;

        self.next_index += inserted as i64;
        self.rows_written += inserted;
        debug!("Wrote {} rows to {}", inserted, self.table);

        Ok(if replaced {
            WriteOutcome::Replaced { rows: inserted }
        } else {
            WriteOutcome::Appended { rows: inserted }
        })
    }
}
