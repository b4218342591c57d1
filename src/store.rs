// 🗄️ Record Store - SQLite + WAL
// Insert-only storage for player snapshots plus an audit log of ingestion cycles

use crate::error::StorageError;
use crate::pipeline::{CycleError, CycleReport};
use crate::record::{PlayerRecord, StoreId, StoredRecord};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

// ============================================================================
// CONTRACTS
// ============================================================================

/// Store-side metadata attached to every insert
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InsertContext {
    pub run_id: Uuid,
    pub ingested_at: DateTime<Utc>,
}

impl InsertContext {
    pub fn new(run_id: Uuid) -> Self {
        InsertContext {
            run_id,
            ingested_at: Utc::now(),
        }
    }
}

/// Durable keyed storage for player records.
/// No uniqueness on `name`: every insert appends a new snapshot.
pub trait RecordStore: Send + Sync {
    /// Persist one record; visible to lookups once this returns Ok
    fn insert(&self, record: &PlayerRecord, ctx: &InsertContext) -> Result<StoreId, StorageError>;

    /// Most recently ingested snapshot for `name`
    fn find_by_name(&self, name: &str) -> Result<Option<PlayerRecord>, StorageError>;

    /// Every snapshot for `name`, newest first
    fn history(&self, name: &str) -> Result<Vec<StoredRecord>, StorageError>;

    fn count(&self) -> Result<i64, StorageError>;
}

/// Audit trail of completed cycles
pub trait CycleLog: Send + Sync {
    fn record_cycle(&self, report: &CycleReport) -> Result<(), StorageError>;

    /// Latest cycles first
    fn recent_cycles(&self, limit: usize) -> Result<Vec<CycleReport>, StorageError>;
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<(), StorageError> {
    // Enable WAL mode for crash recovery (in-memory databases stay on "memory")
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Player Records (one row per player per ingestion cycle)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS player_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            team TEXT NOT NULL,
            metrics TEXT NOT NULL,
            run_id TEXT NOT NULL,
            ingested_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Ingestion Runs (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS ingestion_runs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT UNIQUE NOT NULL,
            started_at TEXT NOT NULL,
            finished_at TEXT NOT NULL,
            fetched INTEGER NOT NULL,
            persisted INTEGER NOT NULL,
            errors TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_player_records_name ON player_records(name)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_player_records_run ON player_records(run_id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// ROW HELPERS
// ============================================================================

fn parse_time(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_uuid(row: &Row, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_json<T: serde::de::DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Columns: id, name, team, metrics, run_id, ingested_at
fn stored_record_from_row(row: &Row) -> rusqlite::Result<StoredRecord> {
    let metrics: BTreeMap<String, f64> = parse_json(row, 3)?;

    Ok(StoredRecord {
        id: row.get(0)?,
        record: PlayerRecord {
            name: row.get(1)?,
            team: row.get(2)?,
            metrics,
        },
        run_id: parse_uuid(row, 4)?,
        ingested_at: parse_time(row, 5)?,
    })
}

/// Columns: run_id, started_at, finished_at, fetched, persisted, errors
fn cycle_report_from_row(row: &Row) -> rusqlite::Result<CycleReport> {
    let fetched: i64 = row.get(3)?;
    let persisted: i64 = row.get(4)?;
    let errors: Vec<CycleError> = parse_json(row, 5)?;

    Ok(CycleReport {
        run_id: parse_uuid(row, 0)?,
        started_at: parse_time(row, 1)?,
        finished_at: parse_time(row, 2)?,
        fetched: fetched.max(0) as usize,
        persisted: persisted.max(0) as usize,
        errors,
    })
}

// ============================================================================
// QUERIES (plain functions over a connection)
// ============================================================================

pub fn insert_record(
    conn: &Connection,
    record: &PlayerRecord,
    ctx: &InsertContext,
) -> Result<StoreId, StorageError> {
    let metrics_json = serde_json::to_string(&record.metrics)?;

    conn.execute(
        "INSERT INTO player_records (name, team, metrics, run_id, ingested_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            record.name,
            record.team,
            metrics_json,
            ctx.run_id.to_string(),
            ctx.ingested_at.to_rfc3339(),
        ],
    )?;

    Ok(conn.last_insert_rowid())
}

pub fn find_latest_by_name(
    conn: &Connection,
    name: &str,
) -> Result<Option<PlayerRecord>, StorageError> {
    let stored = conn
        .query_row(
            "SELECT id, name, team, metrics, run_id, ingested_at
             FROM player_records
             WHERE name = ?1
             ORDER BY id DESC
             LIMIT 1",
            [name],
            stored_record_from_row,
        )
        .optional()?;

    Ok(stored.map(|s| s.record))
}

pub fn get_history(conn: &Connection, name: &str) -> Result<Vec<StoredRecord>, StorageError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, team, metrics, run_id, ingested_at
         FROM player_records
         WHERE name = ?1
         ORDER BY id DESC",
    )?;

    let records = stmt
        .query_map([name], stored_record_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(records)
}

pub fn count_records(conn: &Connection) -> Result<i64, StorageError> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM player_records", [], |row| row.get(0))?;

    Ok(count)
}

pub fn insert_cycle(conn: &Connection, report: &CycleReport) -> Result<(), StorageError> {
    let errors_json = serde_json::to_string(&report.errors)?;

    conn.execute(
        "INSERT INTO ingestion_runs (
            run_id, started_at, finished_at, fetched, persisted, errors
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            report.run_id.to_string(),
            report.started_at.to_rfc3339(),
            report.finished_at.to_rfc3339(),
            report.fetched as i64,
            report.persisted as i64,
            errors_json,
        ],
    )?;

    Ok(())
}

pub fn get_recent_cycles(conn: &Connection, limit: usize) -> Result<Vec<CycleReport>, StorageError> {
    let mut stmt = conn.prepare(
        "SELECT run_id, started_at, finished_at, fetched, persisted, errors
         FROM ingestion_runs
         ORDER BY id DESC
         LIMIT ?1",
    )?;

    let reports = stmt
        .query_map([limit as i64], cycle_report_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(reports)
}

// ============================================================================
// SQLITE STORE
// ============================================================================

/// Shared SQLite-backed store.
/// One connection behind a mutex; each call holds the lock only for its own statement.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file and make sure the schema exists
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    pub fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        setup_database(&conn)?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }
}

impl RecordStore for SqliteStore {
    fn insert(&self, record: &PlayerRecord, ctx: &InsertContext) -> Result<StoreId, StorageError> {
        insert_record(&*self.conn()?, record, ctx)
    }

    fn find_by_name(&self, name: &str) -> Result<Option<PlayerRecord>, StorageError> {
        find_latest_by_name(&*self.conn()?, name)
    }

    fn history(&self, name: &str) -> Result<Vec<StoredRecord>, StorageError> {
        get_history(&*self.conn()?, name)
    }

    fn count(&self) -> Result<i64, StorageError> {
        count_records(&*self.conn()?)
    }
}

impl CycleLog for SqliteStore {
    fn record_cycle(&self, report: &CycleReport) -> Result<(), StorageError> {
        insert_cycle(&*self.conn()?, report)
    }

    fn recent_cycles(&self, limit: usize) -> Result<Vec<CycleReport>, StorageError> {
        get_recent_cycles(&*self.conn()?, limit)
    }
}
