// 🔄 Ingestion Pipeline
// One bounded cycle: fetch → map → persist, best-effort per entry
//
// Accounting rule for every cycle where the provider answered:
//   persisted + errors.len() == fetched

use crate::error::ProviderError;
use crate::provider::StatsProvider;
use crate::record::PlayerRecord;
use crate::store::{CycleLog, InsertContext, RecordStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Default bound on a single provider call
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

// ============================================================================
// CYCLE REPORT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Whole fetch failed, nothing was written
    Provider,
    /// Entry could not be mapped into a record
    Mapping,
    /// Entry mapped but the insert failed
    Storage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleError {
    /// 1-based position of the entry in the provider payload (None for provider failures)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player: Option<String>,
    pub kind: ErrorKind,
    pub reason: String,
}

impl CycleError {
    pub fn provider(err: &ProviderError) -> Self {
        CycleError {
            entry: None,
            player: None,
            kind: ErrorKind::Provider,
            reason: err.to_string(),
        }
    }
}

/// Outcome of one ingestion cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub fetched: usize,
    pub persisted: usize,
    pub errors: Vec<CycleError>,
}

impl CycleReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn provider_failed(&self) -> bool {
        self.errors.iter().any(|e| e.kind == ErrorKind::Provider)
    }

    /// Every fetched entry ended up persisted or reported, exactly once
    pub fn is_accounted(&self) -> bool {
        self.provider_failed() || self.persisted + self.errors.len() == self.fetched
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

pub struct Pipeline {
    provider: Arc<dyn StatsProvider>,
    store: Arc<dyn RecordStore>,
    cycle_log: Option<Arc<dyn CycleLog>>,
    fetch_timeout: Duration,
}

impl Pipeline {
    pub fn new(provider: Arc<dyn StatsProvider>, store: Arc<dyn RecordStore>) -> Self {
        Pipeline {
            provider,
            store,
            cycle_log: None,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Builder pattern: append every report to an audit log
    pub fn with_cycle_log(mut self, log: Arc<dyn CycleLog>) -> Self {
        self.cycle_log = Some(log);
        self
    }

    /// Builder pattern: bound the provider call
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }

    /// Run exactly one ingestion cycle. Never fails: everything that goes
    /// wrong ends up in the returned report.
    pub async fn run_cycle(&self) -> CycleReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        info!(%run_id, provider = self.provider.name(), "ingestion cycle started");

        let fetched = match tokio::time::timeout(self.fetch_timeout, self.provider.fetch()).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.fetch_timeout)),
        };

        let entries = match fetched {
            Ok(entries) => entries,
            Err(e) => {
                error!(%run_id, "Error updating weekly stats: {}", e);
                let report = CycleReport {
                    run_id,
                    started_at,
                    finished_at: Utc::now(),
                    fetched: 0,
                    persisted: 0,
                    errors: vec![CycleError::provider(&e)],
                };
                return self.finish(report);
            }
        };

        let ctx = InsertContext::new(run_id);
        let mut persisted = 0;
        let mut errors = Vec::new();

        for (idx, raw) in entries.iter().enumerate() {
            let entry = idx + 1;

            let record = match PlayerRecord::from_raw(raw) {
                Ok(record) => record,
                Err(e) => {
                    warn!(%run_id, entry, player = ?raw.player(), "skipping entry: {}", e);
                    errors.push(CycleError {
                        entry: Some(entry),
                        player: raw.player().map(str::to_string),
                        kind: ErrorKind::Mapping,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            match self.store.insert(&record, &ctx) {
                Ok(_) => {
                    persisted += 1;
                    info!(%run_id, entry, "Saved player {} to the database.", record.name);
                }
                Err(e) => {
                    warn!(%run_id, entry, player = %record.name, "insert failed: {}", e);
                    errors.push(CycleError {
                        entry: Some(entry),
                        player: Some(record.name),
                        kind: ErrorKind::Storage,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let report = CycleReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            fetched: entries.len(),
            persisted,
            errors,
        };

        self.finish(report)
    }

    fn finish(&self, report: CycleReport) -> CycleReport {
        info!(
            run_id = %report.run_id,
            fetched = report.fetched,
            persisted = report.persisted,
            errors = report.errors.len(),
            "ingestion cycle finished"
        );

        if let Some(log) = &self.cycle_log {
            if let Err(e) = log.record_cycle(&report) {
                warn!(run_id = %report.run_id, "could not record cycle in run log: {}", e);
            }
        }

        report
    }
}
