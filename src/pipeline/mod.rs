//! Ingestion driver.
//!
//! Pulls chunks from a [`ChunkSource`], normalizes the datetime columns and
//! writes each chunk through a [`TableSink`]. Everything runs on the calling
//! thread; a chunk is fully committed before the next one is read.
//!
//! # States
//!
//! - **Starting**: create the table from the source schema alone, so an
//!   empty input still produces a table.
//! - **Running**: one iteration per chunk until the source is exhausted.
//! - **Done** / **Failed**: terminal. The first error stops the run and is
//!   returned unchanged; chunks committed before it stay committed.

use arrow::array::RecordBatch;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::config::Config;
use crate::emit;
use crate::error::PipelineError;
use crate::metrics::events::{ChunkIngested, IngestFailed};
use crate::normalize::Normalizer;
use crate::sink::{self, Database, Dialect, TableSchema, TableSink};
use crate::source::{ChunkSource, CsvChunkSource, infer_schema};

/// Lifecycle of an [`Ingestor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestState {
    Starting,
    Running,
    Done,
    Failed,
}

/// Timing of one committed chunk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkReport {
    pub rows: u64,
    pub elapsed: Duration,
}

/// Statistics about an ingestion run.
#[derive(Debug, Clone, Default)]
pub struct IngestStats {
    /// Chunks committed, not counting the schema-only write.
    pub chunks: u64,
    pub rows_written: u64,
    pub reports: Vec<ChunkReport>,
    pub elapsed: Duration,
}

/// Drives one source into one table.
pub struct Ingestor<S, D> {
    source: S,
    normalizer: Normalizer,
    sink: TableSink<D>,
    state: IngestState,
    stats: IngestStats,
}

impl<S: ChunkSource, D: Database> Ingestor<S, D> {
    /// `source` must already be open.
    pub fn new(source: S, normalizer: Normalizer, sink: TableSink<D>) -> Self {
        Self {
            source,
            normalizer,
            sink,
            state: IngestState::Starting,
            stats: IngestStats::default(),
        }
    }

    pub fn state(&self) -> IngestState {
        self.state
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    pub fn sink(&self) -> &TableSink<D> {
        &self.sink
    }

    pub fn into_sink(self) -> TableSink<D> {
        self.sink
    }

    /// Run to completion. Meant to be called once.
    pub fn run(&mut self) -> Result<IngestStats, PipelineError> {
        let started = Instant::now();
        let result = self.drive();
        self.stats.elapsed = started.elapsed();
        self.source.close();

        match result {
            Ok(()) => {
                self.state = IngestState::Done;
                println!("all rows ingested");
                info!(
                    "Ingested {} rows into {} in {} chunks ({:.3}s)",
                    self.stats.rows_written,
                    self.sink.table(),
                    self.stats.chunks,
                    self.stats.elapsed.as_secs_f64()
                );
                Ok(self.stats.clone())
            }
            Err(e) => {
                self.state = IngestState::Failed;
                error!(
                    "Ingestion into {} failed after {} chunks: {}",
                    self.sink.table(),
                    self.stats.chunks,
                    e
                );
                emit!(IngestFailed {
                    stage: e.stage(),
                    target: self.sink.table().to_string(),
                });
                Err(e)
            }
        }
    }

    fn drive(&mut self) -> Result<(), PipelineError> {
        self.create_table()?;
        self.state = IngestState::Running;

        while let Some(batch) = self.source.next_chunk()? {
            self.ingest_chunk(&batch)?;
        }
        Ok(())
    }

    /// Write an empty batch so the table exists before any rows arrive.
    fn create_table(&mut self) -> Result<(), PipelineError> {
        let empty = RecordBatch::new_empty(self.source.schema());
        let normalized = self.normalizer.normalize(&empty)?;
        self.sink.write(&normalized)?;
        debug!("Created table {}", self.sink.table());
        Ok(())
    }

    fn ingest_chunk(&mut self, batch: &RecordBatch) -> Result<(), PipelineError> {
        let start = Instant::now();
        let normalized = self.normalizer.normalize(batch)?;
        let rows = self.sink.write(&normalized)?.rows();
        let elapsed = start.elapsed();

        println!(
            "inserted another chunk... it took {:.3} seconds",
            elapsed.as_secs_f64()
        );
        emit!(ChunkIngested {
            rows,
            duration: elapsed,
            target: self.sink.table().to_string(),
        });

        self.stats.chunks += 1;
        self.stats.rows_written += rows;
        self.stats.reports.push(ChunkReport { rows, elapsed });
        Ok(())
    }
}

/// DDL the run would execute, derived without connecting to the database.
pub fn dry_run(config: &Config) -> Result<String, PipelineError> {
    config.validate()?;
    let schema = table_schema(config)?;
    Ok(schema.replace_table_sql(&config.table_name, config.connection.scheme.into()))
}

fn table_schema(config: &Config) -> Result<TableSchema, PipelineError> {
    let inferred = infer_schema(Path::new(&config.source.path), &config.source)?;
    let normalized = Normalizer::new(&config.datetime_columns).normalize_schema(&inferred)?;
    Ok(TableSchema::from_arrow(&normalized, config.index.column())?)
}

/// Load `config.source.path` into `config.table_name`.
pub fn run_ingest(config: &Config) -> Result<IngestStats, PipelineError> {
    let mut ingestor = match prepare(config) {
        Ok(ingestor) => ingestor,
        Err(e) => {
            emit!(IngestFailed {
                stage: e.stage(),
                target: config.table_name.clone(),
            });
            return Err(e);
        }
    };
    ingestor.run()
}

fn prepare(
    config: &Config,
) -> Result<Ingestor<CsvChunkSource, Box<dyn Database>>, PipelineError> {
    config.validate()?;

    let source = CsvChunkSource::open(&config.source.path, &config.source)?;
    let normalizer = Normalizer::new(&config.datetime_columns);

    // Surface a missing datetime column before touching the database.
    let normalized = normalizer.normalize_schema(&source.schema())?;
    let schema = TableSchema::from_arrow(&normalized, config.index.column())?;
    let dialect = Dialect::from(config.connection.scheme);
    info!(
        "Table schema:\n{}",
        schema.create_table_sql(&config.table_name, dialect)
    );

    info!("Connecting to {}", config.connection.redacted_url());
    let db = sink::connect(&config.connection)?;
    let sink = TableSink::new(db, config.table_name.as_str(), config.index.column());

    Ok(Ingestor::new(source, normalizer, sink))
}
