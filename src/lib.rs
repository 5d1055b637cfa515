//! sleet: load a CSV file into a relational table, one chunk at a time.
//!
//! The file is read as Arrow record batches of at most `batch_size` rows.
//! Each batch has its datetime columns parsed and is then written to a
//! PostgreSQL or SQLite table. The first write replaces the table; every
//! later write appends to it.
//!
//! # Example
//!
//! ```ignore
//! use sleet::{Config, run_ingest, error::PipelineError};
//!
//! fn main() -> Result<(), PipelineError> {
//!     let config = Config::from_file("sleet.yaml")?;
//!     let stats = run_ingest(&config)?;
//!     println!("Wrote {} rows", stats.rows_written);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod metrics;
pub mod normalize;
pub mod pipeline;
pub mod sink;
pub mod source;

// Re-export main types
pub use config::Config;
pub use pipeline::{IngestState, IngestStats, Ingestor, dry_run, run_ingest};
