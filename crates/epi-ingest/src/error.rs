//! Error types for the ingestion run
//!
//! Every variant is fatal to the run. Nothing here is retried internally;
//! a failed run is retried by whatever scheduled it.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Failure to retrieve a remote source
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("{url} answered {status} without a Location header")]
    MissingLocation {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("{url} redirected to unusable target '{location}': {reason}")]
    InvalidRedirect {
        url: String,
        location: String,
        reason: String,
    },

    #[error("{url} exceeded the limit of {limit} redirects")]
    TooManyRedirects { url: String, limit: usize },

    #[error("Cache file {} for {url}: {source}", .path.display())]
    Cache {
        url: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    /// URL the failed fetch was issued for, when one is known
    pub fn url(&self) -> Option<&str> {
        match self {
            FetchError::Client(_) => None,
            FetchError::InvalidUrl { url, .. }
            | FetchError::Transport { url, .. }
            | FetchError::Status { url, .. }
            | FetchError::MissingLocation { url, .. }
            | FetchError::InvalidRedirect { url, .. }
            | FetchError::TooManyRedirects { url, .. }
            | FetchError::Cache { url, .. } => Some(url),
        }
    }
}

/// Malformed or unexpected source content
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("{name}: source is empty")]
    Empty { name: String },

    #[error("{name}: invalid CSV: {source}")]
    Csv {
        name: String,
        #[source]
        source: csv::Error,
    },

    #[error("{name}: invalid JSON: {source}")]
    Json {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{name}: header has {found} columns, expected at least {expected}")]
    HeaderTooShort {
        name: String,
        found: usize,
        expected: usize,
    },

    #[error("{name}: no aggregate row for '{country}' found")]
    MissingNationalRow { name: String, country: String },

    #[error("Invalid date '{value}', expected {expected}")]
    InvalidDate {
        value: String,
        expected: &'static str,
    },

    #[error("{name}: invalid count '{value}' for {date}")]
    InvalidCount {
        name: String,
        date: String,
        value: String,
    },
}

/// Failure while writing the snapshot to the database
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Schema migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Transaction {step} failed: {source}")]
    Transaction {
        step: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("{step} failed for table {table}: {source}")]
    Table {
        table: &'static str,
        step: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

/// Missing or invalid configuration values
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Umbrella error for a whole ingestion run
#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error("Failed to write {}: {source}", .path.display())]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
