//! CSV chunk reader.
//!
//! Column types are inferred with Arrow's CSV schema inference, then the
//! file is streamed through Arrow's CSV reader `batch_size` rows at a time.
//! Temporal columns are kept as text here; converting them is the
//! normalizer's job.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::RecordBatch;
use arrow::csv::reader::Format;
use arrow::csv::{Reader, ReaderBuilder};
use arrow::datatypes::{DataType, Field, FieldRef, Schema, SchemaRef};
use snafu::prelude::*;
use tracing::{debug, info};

use super::traits::ChunkSource;
use crate::config::SourceConfig;
use crate::error::{InferSnafu, OpenSnafu, ReaderBuildSnafu, SourceError, ZeroChunkSizeSnafu};

/// Infer the column schema of a CSV file.
///
/// Reads at most `config.infer_rows` records (the whole file when unset).
/// Date and time columns, and columns with no values, come back as `Utf8`.
pub fn infer_schema(path: &Path, config: &SourceConfig) -> Result<SchemaRef, SourceError> {
    let path_str = path.display().to_string();
    let file = File::open(path).context(OpenSnafu {
        path: path_str.clone(),
    })?;

    let (schema, records_read) = format(config)
        .infer_schema(file, config.infer_rows)
        .context(InferSnafu {
            path: path_str.clone(),
        })?;

    debug!(
        "Inferred {} columns from {} records of {}",
        schema.fields().len(),
        records_read,
        path_str
    );

    Ok(demote_schema(&schema))
}

fn format(config: &SourceConfig) -> Format {
    Format::default()
        .with_header(config.has_header)
        .with_delimiter(config.delimiter as u8)
}

/// Keep temporal and all-null columns as text.
fn demote_schema(schema: &Schema) -> SchemaRef {
    let fields: Vec<FieldRef> = schema
        .fields()
        .iter()
        .map(|field| match field.data_type() {
            DataType::Null
            | DataType::Timestamp(_, _)
            | DataType::Date32
            | DataType::Date64
            | DataType::Time32(_)
            | DataType::Time64(_) => Arc::new(Field::new(field.name(), DataType::Utf8, true)),
            _ => Arc::new(field.as_ref().clone().with_nullable(true)),
        })
        .collect();

    Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone()))
}

/// Streams a CSV file as record batches of up to `batch_size` rows.
///
/// The file handle is held until the end of input, a decode error, or drop,
/// whichever comes first.
pub struct CsvChunkSource {
    path: String,
    schema: SchemaRef,
    reader: Option<Reader<File>>,
    rows_read: u64,
    chunks_read: u64,
}

impl CsvChunkSource {
    /// Open `path`, infer its schema, and position the reader at the first row.
    pub fn open(path: impl AsRef<Path>, config: &SourceConfig) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let path_str = path.display().to_string();
        ensure!(
            config.batch_size > 0,
            ZeroChunkSizeSnafu {
                path: path_str.clone(),
            }
        );
        let schema = infer_schema(path, config)?;

        let file = File::open(path).context(OpenSnafu {
            path: path_str.clone(),
        })?;
        let reader = ReaderBuilder::new(Arc::clone(&schema))
            .with_header(config.has_header)
            .with_delimiter(config.delimiter as u8)
            .with_batch_size(config.batch_size)
            .build(file)
            .context(ReaderBuildSnafu {
                path: path_str.clone(),
            })?;

        info!(
            "Reading {} in chunks of {} rows ({} columns)",
            path_str,
            config.batch_size,
            schema.fields().len()
        );

        Ok(Self {
            path: path_str,
            schema,
            reader: Some(reader),
            rows_read: 0,
            chunks_read: 0,
        })
    }

    /// Rows produced so far.
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    /// Chunks produced so far.
    pub fn chunks_read(&self) -> u64 {
        self.chunks_read
    }

    /// True once the read handle has been released.
    pub fn is_exhausted(&self) -> bool {
        self.reader.is_none()
    }
}

impl ChunkSource for CsvChunkSource {
    fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    fn close(&mut self) {
        if self.reader.take().is_some() {
            debug!("Released {} after {} rows", self.path, self.rows_read);
        }
    }

    fn next_chunk(&mut self) -> Result<Option<RecordBatch>, SourceError> {
        loop {
            let Some(reader) = self.reader.as_mut() else {
                return Ok(None);
            };

            match reader.next() {
                Some(Ok(batch)) if batch.num_rows() == 0 => continue,
                Some(Ok(batch)) => {
                    self.rows_read += batch.num_rows() as u64;
                    self.chunks_read += 1;
                    return Ok(Some(batch));
                }
                Some(Err(source)) => {
                    let rows_read = self.rows_read;
                    self.close();
                    return Err(SourceError::Decode {
                        path: self.path.clone(),
                        rows_read,
                        source,
                    });
                }
                None => {
                    self.close();
                    return Ok(None);
                }
            }
        }
    }
}

impl Iterator for CsvChunkSource {
    type Item = Result<RecordBatch, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        ChunkSource::next_chunk(self).transpose()
    }
}
