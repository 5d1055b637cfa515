//! Internal events for ingestion metrics.
//!
//! Every event carries a `target` label holding the destination table name.

use metrics::{counter, histogram};
use std::time::Duration;
use tracing::trace;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    fn emit(self);
}

/// A chunk was normalized and committed.
pub struct ChunkIngested {
    pub rows: u64,
    pub duration: Duration,
    pub target: String,
}

impl InternalEvent for ChunkIngested {
    fn emit(self) {
        trace!(
            rows = self.rows,
            duration_ms = self.duration.as_millis(),
            target = %self.target,
            "Chunk ingested"
        );
        counter!("sleet_rows_written_total", "target" => self.target.clone())
            .increment(self.rows);
        counter!("sleet_chunks_written_total", "target" => self.target.clone()).increment(1);
        histogram!("sleet_chunk_duration_seconds", "target" => self.target)
            .record(self.duration.as_secs_f64());
    }
}

/// The destination table was dropped and recreated.
pub struct TableReplaced {
    pub columns: usize,
    pub target: String,
}

impl InternalEvent for TableReplaced {
    fn emit(self) {
        trace!(columns = self.columns, target = %self.target, "Table replaced");
        counter!("sleet_tables_replaced_total", "target" => self.target).increment(1);
    }
}

/// An ingestion run ended in the failed state.
pub struct IngestFailed {
    pub stage: &'static str,
    pub target: String,
}

impl InternalEvent for IngestFailed {
    fn emit(self) {
        trace!(stage = self.stage, target = %self.target, "Ingestion failed");
        counter!("sleet_ingest_failures_total", "stage" => self.stage, "target" => self.target)
            .increment(1);
    }
}
