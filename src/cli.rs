//! Command-line arguments.
//!
//! Every setting can come from a YAML file given with `--config`; flags and
//! the `PG*` environment variables override the file.

use clap::Parser;
use std::path::PathBuf;

use crate::config::{Config, Scheme};
use crate::error::ConfigError;

/// Load a CSV file into a PostgreSQL or SQLite table in chunks.
#[derive(Parser, Debug)]
#[command(name = "sleet")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// YAML configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Database user.
    #[arg(long, env = "PGUSER")]
    pub user: Option<String>,

    /// Database password.
    #[arg(long, env = "PGPASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Database host.
    #[arg(long, env = "PGHOST")]
    pub host: Option<String>,

    /// Database port.
    #[arg(long, env = "PGPORT")]
    pub port: Option<u16>,

    /// Database name (the file path for SQLite).
    #[arg(long, env = "PGDATABASE")]
    pub db: Option<String>,

    /// Destination table; replaced if it exists.
    #[arg(long)]
    pub table_name: Option<String>,

    /// CSV file to load.
    #[arg(long, visible_alias = "csv-filename")]
    pub input: Option<String>,

    /// Rows per chunk.
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Database kind: postgresql or sqlite.
    #[arg(long)]
    pub scheme: Option<Scheme>,

    /// Column to convert to a timestamp. Repeat for several columns.
    #[arg(long = "datetime-column")]
    pub datetime_columns: Vec<String>,

    /// Do not write the row index column.
    #[arg(long)]
    pub no_index: bool,

    /// Name of the row index column.
    #[arg(long)]
    pub index_label: Option<String>,

    /// Rows sampled for type inference (default: whole file).
    #[arg(long)]
    pub infer_rows: Option<usize>,

    /// Field delimiter.
    #[arg(long)]
    pub delimiter: Option<char>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Print the table DDL without connecting or loading anything.
    #[arg(long)]
    pub dry_run: bool,
}

impl Args {
    /// Build the run configuration: file values first, then overrides.
    pub fn to_config(&self) -> Result<Config, ConfigError> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        self.apply(&mut config);
        Ok(config)
    }

    fn apply(&self, config: &mut Config) {
        let connection = &mut config.connection;
        if let Some(scheme) = self.scheme {
            connection.scheme = scheme;
        }
        if let Some(user) = &self.user {
            connection.user = user.clone();
        }
        if let Some(password) = &self.password {
            connection.password = password.clone();
        }
        if let Some(host) = &self.host {
            connection.host = host.clone();
        }
        if let Some(port) = self.port {
            connection.port = port;
        }
        if let Some(db) = &self.db {
            connection.database = db.clone();
        }

        if let Some(table) = &self.table_name {
            config.table_name = table.clone();
        }

        let source = &mut config.source;
        if let Some(input) = &self.input {
            source.path = input.clone();
        }
        if let Some(batch_size) = self.batch_size {
            source.batch_size = batch_size;
        }
        if let Some(delimiter) = self.delimiter {
            source.delimiter = delimiter;
        }
        if let Some(rows) = self.infer_rows {
            source.infer_rows = Some(rows);
        }

        if !self.datetime_columns.is_empty() {
            config.datetime_columns = self.datetime_columns.clone();
        }
        if self.no_index {
            config.index.enabled = false;
        }
        if let Some(label) = &self.index_label {
            config.index.label = label.clone();
        }
    }
}
