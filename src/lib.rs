// Player Statistics Ingestion - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod config;
pub mod error;
pub mod pipeline;
pub mod provider;
pub mod query;
pub mod record;
pub mod scheduler;
pub mod store;

#[cfg(feature = "server")]
pub mod api;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use config::{init_tracing, Config, ProviderSource};
pub use error::{MappingError, ProviderError, QueryError, StorageError};
pub use pipeline::{CycleError, CycleReport, ErrorKind, Pipeline, DEFAULT_FETCH_TIMEOUT};
pub use provider::{FileProvider, HttpJsonProvider, StaticProvider, StatsProvider};
pub use query::QueryService;
pub use record::{PlayerRecord, RawStatEntry, StoreId, StoredRecord};
pub use scheduler::{Scheduler, SchedulerState, TriggerOutcome, DEFAULT_CRON};
pub use store::{setup_database, CycleLog, InsertContext, RecordStore, SqliteStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
