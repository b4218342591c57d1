// ⚠️ Error Taxonomy
// Provider failures abort a cycle, storage/mapping failures are per entry,
// validation failures never reach the store.

use std::time::Duration;
use thiserror::Error;

/// Upstream fetch failed wholesale - the whole cycle aborts
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} responded with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("could not decode provider payload: {0}")]
    Decode(String),

    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("provider did not answer within {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Other(String),
}

/// One record (or the run log) failed to persist
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("metrics column: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store connection poisoned")]
    Poisoned,
}

/// A raw entry could not be turned into a PlayerRecord
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MappingError {
    #[error("missing or empty field '{0}'")]
    MissingField(&'static str),

    #[error("entry has no numeric metrics")]
    NoMetrics,

    #[error("metric '{field}' is not numeric: {value}")]
    NotNumeric { field: String, value: String },

    #[error("metric '{0}' is not a finite number")]
    NonFinite(String),
}

/// Failures on the read path
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid lookup: {0}")]
    Validation(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
