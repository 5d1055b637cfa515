//! Chunk source for reading delimited text input.
//!
//! Produces Arrow record batches of a fixed maximum size, in input order,
//! until the input is exhausted.

mod csv;
mod traits;

pub use csv::{CsvChunkSource, infer_schema};
pub use traits::ChunkSource;
