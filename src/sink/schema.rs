//! Table schema derived from Arrow batches, and the DDL rendered from it.

use std::fmt;

use arrow::datatypes::{DataType, Schema};

use crate::config::Scheme;
use crate::error::SinkError;

/// SQL flavour used when rendering statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl From<Scheme> for Dialect {
    fn from(scheme: Scheme) -> Self {
        match scheme {
            Scheme::Postgresql => Dialect::Postgres,
            Scheme::Sqlite => Dialect::Sqlite,
        }
    }
}

/// Column type of the destination table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    BigInt,
    Double,
    Boolean,
    Text,
    Timestamp,
}

impl SqlType {
    /// Map an Arrow type to a column type.
    ///
    /// - Integers -> BigInt
    /// - Floats -> Double
    /// - Boolean -> Boolean
    /// - Timestamps (any unit or zone) -> Timestamp
    /// - Everything else is stored as its text rendering
    pub fn from_arrow(data_type: &DataType) -> Self {
        match data_type {
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64 => SqlType::BigInt,
            DataType::Float16 | DataType::Float32 | DataType::Float64 => SqlType::Double,
            DataType::Boolean => SqlType::Boolean,
            DataType::Timestamp(_, _) => SqlType::Timestamp,
            _ => SqlType::Text,
        }
    }

    /// Type keyword for CREATE TABLE statements.
    pub fn keyword(&self, dialect: Dialect) -> &'static str {
        match (dialect, self) {
            (Dialect::Postgres, SqlType::BigInt) => "BIGINT",
            (Dialect::Postgres, SqlType::Double) => "DOUBLE PRECISION",
            (Dialect::Postgres, SqlType::Boolean) => "BOOLEAN",
            (Dialect::Postgres, SqlType::Text) => "TEXT",
            (Dialect::Postgres, SqlType::Timestamp) => "TIMESTAMP WITHOUT TIME ZONE",
            (Dialect::Sqlite, SqlType::BigInt | SqlType::Boolean) => "INTEGER",
            (Dialect::Sqlite, SqlType::Double) => "REAL",
            (Dialect::Sqlite, SqlType::Text) => "TEXT",
            (Dialect::Sqlite, SqlType::Timestamp) => "TIMESTAMP",
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SqlType::BigInt => "bigint",
            SqlType::Double => "double",
            SqlType::Boolean => "boolean",
            SqlType::Text => "text",
            SqlType::Timestamp => "timestamp",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub sql_type: SqlType,
}

/// Ordered columns of the destination table.
///
/// When an index label is set, the index column comes first and the batch
/// columns follow in batch order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    columns: Vec<Column>,
    index: Option<String>,
}

impl TableSchema {
    /// Derive the table layout for batches with `schema`.
    pub fn from_arrow(schema: &Schema, index: Option<&str>) -> Result<Self, SinkError> {
        let mut columns = Vec::with_capacity(schema.fields().len() + 1);

        if let Some(label) = index {
            if schema.column_with_name(label).is_some() {
                return Err(SinkError::Value {
                    column: label.to_string(),
                    message: "input already has a column with the index label".to_string(),
                });
            }
            columns.push(Column {
                name: label.to_string(),
                sql_type: SqlType::BigInt,
            });
        }

        columns.extend(schema.fields().iter().map(|field| Column {
            name: field.name().clone(),
            sql_type: SqlType::from_arrow(field.data_type()),
        }));

        Ok(Self {
            columns,
            index: index.map(str::to_string),
        })
    }

    /// All columns, index first.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn index_column(&self) -> Option<&str> {
        self.index.as_deref()
    }

    /// Compact `name type, ...` form used in mismatch errors.
    pub fn describe(&self) -> String {
        self.columns
            .iter()
            .map(|c| format!("{} {}", c.name, c.sql_type))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn create_table_sql(&self, table: &str, dialect: Dialect) -> String {
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("{} {}", quote_identifier(&c.name), c.sql_type.keyword(dialect)))
            .collect();

        format!(
            "CREATE TABLE {} (\n    {}\n)",
            quote_identifier(table),
            columns.join(",\n    ")
        )
    }

    /// `CREATE INDEX ix_<table>_<label>` for the index column, if any.
    pub fn create_index_sql(&self, table: &str) -> Option<String> {
        self.index.as_ref().map(|label| {
            format!(
                "CREATE INDEX {} ON {} ({})",
                quote_identifier(&format!("ix_{table}_{label}")),
                quote_identifier(table),
                quote_identifier(label)
            )
        })
    }

    /// Drop, create and index statements as one script.
    pub fn replace_table_sql(&self, table: &str, dialect: Dialect) -> String {
        let mut sql = format!(
            "DROP TABLE IF EXISTS {};\n{};\n",
            quote_identifier(table),
            self.create_table_sql(table, dialect)
        );
        if let Some(index) = self.create_index_sql(table) {
            sql.push_str(&index);
            sql.push_str(";\n");
        }
        sql
    }

    /// Parameterized INSERT with `?` placeholders.
    pub fn insert_sql(&self, table: &str) -> String {
        let placeholders = vec!["?"; self.columns.len()];
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_identifier(table),
            self.column_list(),
            placeholders.join(", ")
        )
    }

    /// Binary COPY statement for PostgreSQL.
    pub fn copy_sql(&self, table: &str) -> String {
        format!(
            "COPY {} ({}) FROM STDIN (FORMAT binary)",
            quote_identifier(table),
            self.column_list()
        )
    }

    fn column_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| quote_identifier(&c.name))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Quote a table or column name, doubling embedded quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
