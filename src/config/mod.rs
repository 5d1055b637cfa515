//! Configuration loading and validation.
//!
//! A run is described by a [`Config`], read from an optional YAML file and
//! then overridden by command-line arguments (see [`crate::cli`]).

mod vars;

use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{
    ConfigError, EmptyTableNameSnafu, EnvInterpolationSnafu, InvalidDelimiterSnafu,
    MissingFieldSnafu,
    NoDatetimeColumnsSnafu, ReadFileSnafu, YamlParseSnafu, ZeroBatchSizeSnafu,
};

pub use vars::{interpolate, interpolate_with};

/// Designated datetime columns of the NYC taxi trip exports.
pub const DEFAULT_DATETIME_COLUMNS: [&str; 2] = ["tpep_pickup_datetime", "tpep_dropoff_datetime"];

/// Top-level configuration for one ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Destination table. Replaced on every run.
    #[serde(default)]
    pub table_name: String,
    #[serde(default)]
    pub source: SourceConfig,
    /// Columns converted from text to timestamps before writing.
    #[serde(default = "default_datetime_columns")]
    pub datetime_columns: Vec<String>,
    #[serde(default)]
    pub index: IndexConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            table_name: String::new(),
            source: SourceConfig::default(),
            datetime_columns: default_datetime_columns(),
            index: IndexConfig::default(),
        }
    }
}

/// Database backend selected by the connection scheme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    #[default]
    #[serde(alias = "postgres")]
    Postgresql,
    Sqlite,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Postgresql => "postgresql",
            Scheme::Sqlite => "sqlite",
        }
    }
}

impl FromStr for Scheme {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgresql" | "postgres" => Ok(Scheme::Postgresql),
            "sqlite" => Ok(Scheme::Sqlite),
            other => Err(ConfigError::UnknownScheme {
                scheme: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the destination database lives.
///
/// For SQLite, `database` is the path of the database file (or `:memory:`)
/// and the network fields are ignored.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default)]
    pub scheme: Scheme,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub database: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            scheme: Scheme::default(),
            user: String::new(),
            password: String::new(),
            host: default_host(),
            port: default_port(),
            database: String::new(),
        }
    }
}

// Keeps the password out of `{:?}` output in logs.
impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("scheme", &self.scheme)
            .field("user", &self.user)
            .field("password", &"***")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .finish()
    }
}

impl ConnectionConfig {
    /// Connection target, `<scheme>://<user>:<password>@<host>:<port>/<database>`.
    ///
    /// For display only; the fields are not percent-encoded, so the backends
    /// connect from the fields themselves.
    pub fn url(&self) -> String {
        self.render(&self.password)
    }

    /// Same as [`url`](Self::url) with the password masked.
    pub fn redacted_url(&self) -> String {
        if self.password.is_empty() {
            self.url()
        } else {
            self.render("***")
        }
    }

    fn render(&self, password: &str) -> String {
        match self.scheme {
            Scheme::Postgresql => format!(
                "postgresql://{}:{}@{}:{}/{}",
                self.user, password, self.host, self.port, self.database
            ),
            Scheme::Sqlite => format!("sqlite://{}", self.database),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        ensure!(
            !self.database.is_empty(),
            MissingFieldSnafu { field: "database" }
        );
        if self.scheme == Scheme::Postgresql {
            ensure!(!self.user.is_empty(), MissingFieldSnafu { field: "user" });
            ensure!(!self.host.is_empty(), MissingFieldSnafu { field: "host" });
        }
        Ok(())
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

/// CSV input settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Path of the CSV file.
    #[serde(default)]
    pub path: String,
    /// Rows per chunk (default: 100000).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Field delimiter (default: `,`).
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    /// Whether the first line is a header (default: true).
    #[serde(default = "default_has_header")]
    pub has_header: bool,
    /// Rows sampled for type inference. Unset means the whole file.
    #[serde(default)]
    pub infer_rows: Option<usize>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            batch_size: default_batch_size(),
            delimiter: default_delimiter(),
            has_header: default_has_header(),
            infer_rows: None,
        }
    }
}

fn default_batch_size() -> usize {
    100_000
}

fn default_delimiter() -> char {
    ','
}

fn default_has_header() -> bool {
    true
}

fn default_datetime_columns() -> Vec<String> {
    DEFAULT_DATETIME_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .collect()
}

/// Row index column written alongside the data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default = "default_index_enabled")]
    pub enabled: bool,
    #[serde(default = "default_index_label")]
    pub label: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            enabled: default_index_enabled(),
            label: default_index_label(),
        }
    }
}

fn default_index_enabled() -> bool {
    true
}

fn default_index_label() -> String {
    "index".to_string()
}

impl IndexConfig {
    /// Label of the index column, if one is written.
    pub fn column(&self) -> Option<&str> {
        self.enabled.then_some(self.label.as_str())
    }
}

impl Config {
    /// Load configuration from a YAML file, expanding environment references.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).context(ReadFileSnafu {
            path: path.display().to_string(),
        })?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text, expanding environment references.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let expanded = interpolate(content).map_err(|unresolved| {
            EnvInterpolationSnafu {
                message: unresolved.join("\n"),
            }
            .build()
        })?;
        serde_yaml::from_str(&expanded).context(YamlParseSnafu)
    }

    /// Check that the configuration describes a runnable ingestion.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure!(!self.table_name.is_empty(), EmptyTableNameSnafu);
        ensure!(
            !self.source.path.is_empty(),
            MissingFieldSnafu { field: "input" }
        );
        ensure!(self.source.batch_size > 0, ZeroBatchSizeSnafu);
        ensure!(
            self.source.delimiter.is_ascii(),
            InvalidDelimiterSnafu {
                delimiter: self.source.delimiter
            }
        );
        ensure!(!self.datetime_columns.is_empty(), NoDatetimeColumnsSnafu);
        self.connection.validate()
    }
}
