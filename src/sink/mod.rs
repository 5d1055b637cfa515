//! Destination table writers.
//!
//! [`TableSink`] owns the replace-then-append lifecycle of one table and
//! delegates persistence to a [`Database`] backend.

pub mod memory;
pub mod postgres;
pub mod schema;
pub mod sqlite;
pub mod table;
mod traits;
pub mod value;

pub use memory::{MemoryDatabase, MemoryTable};
pub use self::postgres::PostgresDatabase;
pub use schema::{Column, Dialect, SqlType, TableSchema};
pub use sqlite::SqliteDatabase;
pub use table::{TableSink, WriteOutcome};
pub use traits::Database;
pub use value::{BatchRows, Row, Value};

use crate::config::{ConnectionConfig, Scheme};
use crate::error::SinkError;

/// Open the backend selected by the connection scheme.
pub fn connect(config: &ConnectionConfig) -> Result<Box<dyn Database>, SinkError> {
    Ok(match config.scheme {
        Scheme::Postgresql => Box::new(PostgresDatabase::connect(config)?),
        Scheme::Sqlite => Box::new(SqliteDatabase::open(config)?),
    })
}
