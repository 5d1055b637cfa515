//! Error types for sleet using snafu.
//!
//! Each pipeline stage has its own error enum; [`PipelineError`] wraps them
//! at the driver boundary without discarding the original cause.

use snafu::prelude::*;

/// Boxed error returned by database drivers.
pub type DatabaseError = Box<dyn std::error::Error + Send + Sync>;

// ============ Config Errors ============

/// Errors that can occur during configuration parsing and validation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[snafu(display("Failed to read configuration file {path}: {source}"))]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[snafu(display("Failed to parse YAML configuration: {source}"))]
    YamlParse { source: serde_yaml::Error },

    /// A `$VAR` reference in the config file could not be resolved.
    #[snafu(display("Unresolved environment references in config:\n{message}"))]
    EnvInterpolation { message: String },

    /// A required setting was given neither on the command line nor in a file.
    #[snafu(display("Missing required setting: {field}"))]
    MissingField { field: &'static str },

    /// Batch size must be positive.
    #[snafu(display("Batch size must be greater than zero"))]
    ZeroBatchSize,

    /// Delimiter must be a single ASCII character.
    #[snafu(display("Delimiter {delimiter:?} is not a single-byte ASCII character"))]
    InvalidDelimiter { delimiter: char },

    /// Table name is empty.
    #[snafu(display("Table name cannot be empty"))]
    EmptyTableName,

    /// No designated datetime columns.
    #[snafu(display("At least one datetime column must be configured"))]
    NoDatetimeColumns,

    /// Connection scheme is not supported.
    #[snafu(display("Unsupported connection scheme '{scheme}' (expected postgresql or sqlite)"))]
    UnknownScheme { scheme: String },
}

// ============ Source Errors ============

/// Errors raised while reading CSV input.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SourceError {
    /// Input file cannot be opened.
    #[snafu(display("Failed to open input {path}: {source}"))]
    Open {
        path: String,
        source: std::io::Error,
    },

    /// Header or column types could not be inferred.
    #[snafu(display("Failed to infer schema from {path}: {source}"))]
    Infer {
        path: String,
        source: arrow::error::ArrowError,
    },

    /// Failed to build the CSV reader.
    #[snafu(display("Failed to build CSV reader for {path}: {source}"))]
    ReaderBuild {
        path: String,
        source: arrow::error::ArrowError,
    },

    /// Chunks must hold at least one row.
    #[snafu(display("Chunk size for {path} must be greater than zero"))]
    ZeroChunkSize { path: String },

    /// A row could not be decoded.
    #[snafu(display("Malformed input in {path} after {rows_read} rows: {source}"))]
    Decode {
        path: String,
        rows_read: u64,
        source: arrow::error::ArrowError,
    },
}

// ============ Normalization Errors ============

/// Errors raised while converting designated columns to timestamps.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum NormalizeError {
    /// A designated column is not present in the batch.
    #[snafu(display("Datetime column '{column}' not found in input"))]
    MissingColumn { column: String },

    /// A designated column holds a type that cannot be read as a timestamp.
    #[snafu(display("Datetime column '{column}' has unsupported type {data_type}"))]
    UnsupportedType { column: String, data_type: String },

    /// A value could not be parsed as a timestamp.
    #[snafu(display("Invalid timestamp '{value}' in column '{column}' at batch row {row}"))]
    InvalidTimestamp {
        column: String,
        row: usize,
        value: String,
    },

    /// Failed to assemble the normalized batch.
    #[snafu(display("Failed to build normalized batch: {source}"))]
    BatchBuild { source: arrow::error::ArrowError },
}

// ============ Sink Errors ============

/// Errors raised while writing to the destination table.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SinkError {
    /// Database is unreachable or the connection was lost.
    #[snafu(display("Database connection to {target} failed: {source}"))]
    Connection {
        target: String,
        source: DatabaseError,
    },

    /// Batch schema diverges from the table created on the first write.
    #[snafu(display("Schema mismatch for table {table}: expected [{expected}], found [{found}]"))]
    SchemaMismatch {
        table: String,
        expected: String,
        found: String,
    },

    /// Any other persistence failure.
    #[snafu(display("Failed to write to table {table}: {source}"))]
    Write {
        table: String,
        source: DatabaseError,
    },

    /// A cell could not be converted to a database value.
    #[snafu(display("Unsupported value in column {column}: {message}"))]
    Value { column: String, message: String },
}

impl SinkError {
    /// True if the failure is a lost or refused connection.
    pub fn is_connection(&self) -> bool {
        matches!(self, SinkError::Connection { .. })
    }
}

// ============ Pipeline Errors ============

/// Top-level ingestion errors.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PipelineError {
    /// Configuration error.
    #[snafu(display("Configuration error: {source}"))]
    Config { source: ConfigError },

    /// Input could not be read.
    #[snafu(display("Input error: {source}"))]
    Input { source: SourceError },

    /// A designated column could not be normalized.
    #[snafu(display("Normalization error: {source}"))]
    Normalization { source: NormalizeError },

    /// Destination table write failed.
    #[snafu(display("Sink error: {source}"))]
    Sink { source: SinkError },
}

impl PipelineError {
    /// Short label of the stage that failed, used for metrics.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Config { .. } => "config",
            PipelineError::Input { .. } => "input",
            PipelineError::Normalization { .. } => "normalize",
            PipelineError::Sink { source } => match source {
                SinkError::Connection { .. } => "connection",
                SinkError::SchemaMismatch { .. } => "schema",
                SinkError::Write { .. } | SinkError::Value { .. } => "write",
            },
        }
    }
}

impl From<ConfigError> for PipelineError {
    fn from(source: ConfigError) -> Self {
        PipelineError::Config { source }
    }
}

impl From<SourceError> for PipelineError {
    fn from(source: SourceError) -> Self {
        PipelineError::Input { source }
    }
}

impl From<NormalizeError> for PipelineError {
    fn from(source: NormalizeError) -> Self {
        PipelineError::Normalization { source }
    }
}

impl From<SinkError> for PipelineError {
    fn from(source: SinkError) -> Self {
        PipelineError::Sink { source }
    }
}
