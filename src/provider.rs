// 📡 Statistics Providers
// External sources of raw statistic entries, one bulk fetch per cycle

use crate::error::ProviderError;
use crate::record::RawStatEntry;
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Anything that can hand the pipeline the current statistics.
/// Either the whole list comes back or the call fails outright.
#[async_trait]
pub trait StatsProvider: Send + Sync {
    /// Name for logs and run reports
    fn name(&self) -> &str;

    async fn fetch(&self) -> Result<Vec<RawStatEntry>, ProviderError>;
}

/// Turn a decoded JSON payload into entries.
/// The payload must be an array; individual elements are checked later, during mapping.
pub fn entries_from_json(payload: Value) -> Result<Vec<RawStatEntry>, ProviderError> {
    match payload {
        Value::Array(items) => Ok(items.into_iter().map(RawStatEntry::from_value).collect()),
        other => Err(ProviderError::Decode(format!(
            "expected a JSON array of entries, got {}",
            json_type_name(&other)
        ))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ============================================================================
// HTTP JSON PROVIDER
// ============================================================================

/// GET a URL that answers with `[{"player": .., "team": .., "points": ..}, ...]`
pub struct HttpJsonProvider {
    http: reqwest::Client,
    url: String,
}

impl HttpJsonProvider {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("stat-ingest/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| ProviderError::Http {
                url: url.to_string(),
                source,
            })?;

        Ok(HttpJsonProvider {
            http,
            url: url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl StatsProvider for HttpJsonProvider {
    fn name(&self) -> &str {
        "http-json"
    }

    async fn fetch(&self) -> Result<Vec<RawStatEntry>, ProviderError> {
        debug!(url = %self.url, "fetching player statistics");

        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|source| ProviderError::Http {
                url: self.url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        entries_from_json(payload)
    }
}

// ============================================================================
// FILE PROVIDER (.json / .csv)
// ============================================================================

/// Reads a statistics export from disk on every fetch.
///
/// - `.json`: an array of entry objects
/// - `.csv`: header row with `player` and `team` columns; numeric columns become metrics
pub struct FileProvider {
    path: PathBuf,
}

impl FileProvider {
    pub fn new(path: &Path) -> Self {
        FileProvider {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_csv(&self) -> bool {
        self.path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false)
    }
}

#[async_trait]
impl StatsProvider for FileProvider {
    fn name(&self) -> &str {
        "file"
    }

    async fn fetch(&self) -> Result<Vec<RawStatEntry>, ProviderError> {
        debug!(path = %self.path.display(), "reading player statistics");

        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| ProviderError::Io {
                path: self.path.display().to_string(),
                source,
            })?;

        if self.is_csv() {
            entries_from_csv(&text)
        } else {
            let payload: Value =
                serde_json::from_str(&text).map_err(|e| ProviderError::Decode(e.to_string()))?;
            entries_from_json(payload)
        }
    }
}

/// Parse CSV text into entries. Cells stay strings; mapping does the number parsing.
/// A row that is ragged or fails to decode becomes an empty entry, so it is
/// reported on its own during mapping instead of failing the whole fetch.
pub fn entries_from_csv(text: &str) -> Result<Vec<RawStatEntry>, ProviderError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = rdr
        .headers()
        .map_err(|e| ProviderError::Decode(format!("CSV header: {}", e)))?
        .clone();

    let mut entries = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let row = match result {
            Ok(row) if row.len() == headers.len() => row,
            Ok(row) => {
                warn!(
                    row = idx + 1,
                    fields = row.len(),
                    expected = headers.len(),
                    "ragged CSV row"
                );
                entries.push(RawStatEntry::default());
                continue;
            }
            Err(e) => {
                warn!(row = idx + 1, "unreadable CSV row: {}", e);
                entries.push(RawStatEntry::default());
                continue;
            }
        };

        let mut entry = RawStatEntry::default();
        for (header, cell) in headers.iter().zip(row.iter()) {
            if cell.is_empty() {
                continue;
            }
            entry
                .fields
                .insert(header.to_string(), Value::String(cell.to_string()));
        }
        entries.push(entry);
    }

    Ok(entries)
}

// ============================================================================
// STATIC PROVIDER
// ============================================================================

/// Fixed list of entries, handed out on every fetch
pub struct StaticProvider {
    entries: Vec<RawStatEntry>,
}

impl StaticProvider {
    pub fn new(entries: Vec<RawStatEntry>) -> Self {
        StaticProvider { entries }
    }
}

#[async_trait]
impl StatsProvider for StaticProvider {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch(&self) -> Result<Vec<RawStatEntry>, ProviderError> {
        Ok(self.entries.clone())
    }
}
