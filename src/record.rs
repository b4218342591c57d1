// 🏀 Player Records
// RawStatEntry (untrusted, from the provider) → PlayerRecord (persisted)

use crate::error::MappingError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;
use uuid::Uuid;

/// Row id assigned by the store
pub type StoreId = i64;

/// Identity and store columns, never metrics
const RESERVED_KEYS: &[&str] = &["player", "team", "name", "id", "run_id", "ingested_at"];

/// Metrics that must be numeric when present; a bad value rejects the entry
const KNOWN_METRICS: &[&str] = &["points"];

// ============================================================================
// RAW ENTRY (external, ephemeral)
// ============================================================================

/// One entry as handed over by a StatsProvider.
/// Nothing about its shape is trusted until `PlayerRecord::from_raw` runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawStatEntry {
    pub fields: Map<String, Value>,
}

impl RawStatEntry {
    /// Create an entry with the two identity fields set
    pub fn new(player: &str, team: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("player".to_string(), Value::String(player.to_string()));
        fields.insert("team".to_string(), Value::String(team.to_string()));
        RawStatEntry { fields }
    }

    /// Builder pattern: add a numeric metric
    pub fn with_metric(mut self, name: &str, value: f64) -> Self {
        self.fields.insert(name.to_string(), serde_json::json!(value));
        self
    }

    /// Builder pattern: add an arbitrary raw field
    pub fn with_field(mut self, name: &str, value: Value) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    /// Wrap any JSON value. Non-objects become an empty entry, which then
    /// fails mapping on its own instead of sinking the whole payload.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(fields) => RawStatEntry { fields },
            _ => RawStatEntry::default(),
        }
    }

    /// Player identifier, if present and a string
    pub fn player(&self) -> Option<&str> {
        self.fields.get("player").and_then(Value::as_str)
    }

    pub fn team(&self) -> Option<&str> {
        self.fields.get("team").and_then(Value::as_str)
    }
}

// ============================================================================
// PLAYER RECORD (persistent entity)
// ============================================================================

/// Persisted statistics snapshot for one player.
/// Serializes flat: `{ "name": .., "team": .., "points": .. }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub name: String,
    pub team: String,
    #[serde(flatten)]
    pub metrics: BTreeMap<String, f64>,
}

impl PlayerRecord {
    pub fn new(name: &str, team: &str) -> Self {
        PlayerRecord {
            name: name.to_string(),
            team: team.to_string(),
            metrics: BTreeMap::new(),
        }
    }

    /// Builder pattern: add a metric
    pub fn with_metric(mut self, name: &str, value: f64) -> Self {
        self.metrics.insert(name.to_string(), value);
        self
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }

    pub fn points(&self) -> Option<f64> {
        self.metric("points")
    }

    /// Map an untrusted provider entry into a record.
    ///
    /// - `player` and `team` must be non-empty strings (trimmed)
    /// - a JSON number or numeric string in any other field is a metric
    /// - text columns (position, college, ...) are skipped, except known
    ///   metrics like `points`, which must be numeric when present
    /// - at least one finite metric is required
    pub fn from_raw(raw: &RawStatEntry) -> Result<Self, MappingError> {
        let name = required_text(raw, "player")?;
        let team = required_text(raw, "team")?;

        let mut metrics = BTreeMap::new();
        for (key, value) in &raw.fields {
            let key = key.trim();
            if key.is_empty() || RESERVED_KEYS.contains(&key) {
                continue;
            }

            let number = match value {
                Value::Null => continue,
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };

            let known = KNOWN_METRICS.contains(&key);

            let number = match number {
                Some(n) => n,
                None if known => {
                    return Err(MappingError::NotNumeric {
                        field: key.to_string(),
                        value: value.to_string(),
                    })
                }
                None => {
                    debug!(field = key, "ignoring non-numeric field");
                    continue;
                }
            };

            if !number.is_finite() {
                if known {
                    return Err(MappingError::NonFinite(key.to_string()));
                }
                debug!(field = key, "ignoring non-finite field");
                continue;
            }

            metrics.insert(key.to_string(), number);
        }

        if metrics.is_empty() {
            return Err(MappingError::NoMetrics);
        }

        Ok(PlayerRecord { name, team, metrics })
    }
}

fn required_text(raw: &RawStatEntry, field: &'static str) -> Result<String, MappingError> {
    raw.fields
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or(MappingError::MissingField(field))
}

// ============================================================================
// STORED RECORD (record + store metadata)
// ============================================================================

/// A record as it sits in the store, with the cycle that produced it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredRecord {
    pub id: StoreId,
    #[serde(flatten)]
    pub record: PlayerRecord,
    pub run_id: Uuid,
    pub ingested_at: DateTime<Utc>,
}
