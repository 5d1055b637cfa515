//! Traits for chunk sources.

use arrow::array::RecordBatch;
use arrow::datatypes::SchemaRef;

use crate::error::SourceError;

/// A forward-only, non-restartable sequence of record batches.
///
/// End of input is signalled with `Ok(None)`, never with an error. Once a
/// source has returned `Ok(None)` it keeps doing so.
pub trait ChunkSource {
    /// Schema of every batch this source produces.
    fn schema(&self) -> SchemaRef;

    /// Read the next batch, or `None` when the input is exhausted.
    fn next_chunk(&mut self) -> Result<Option<RecordBatch>, SourceError>;

    /// Release the underlying input early. Later reads return `Ok(None)`.
    fn close(&mut self) {}
}
