use super::schema::TableSchema;
use super::value::BatchRows;
use crate::error::SinkError;

/// A relational backend the sink can write to.
pub trait Database {
    /// Drop `table` if it exists and create it empty with `schema`.
    fn replace_table(&mut self, table: &str, schema: &TableSchema) -> Result<(), SinkError>;

    /// Append `rows` to `table` in a single transaction.
    ///
    /// Either every row is committed or none is. Returns the number of rows
    /// inserted.
    fn insert_rows(
        &mut self,
        table: &str,
        schema: &TableSchema,
        rows: BatchRows<'_>,
    ) -> Result<u64, SinkError>;
}

impl<D: Database + ?Sized> Database for Box<D> {
    fn replace_table(&mut self, table: &str, schema: &TableSchema) -> Result<(), SinkError> {
        (**self).replace_table(table, schema)
    }

    fn insert_rows(
        &mut self,
        table: &str,
        schema: &TableSchema,
        rows: BatchRows<'_>,
    ) -> Result<u64, SinkError> {
        (**self).insert_rows(table, schema, rows)
    }
}
