// Player Statistics - Web Server
// Weekly ingestion scheduler + REST API with Axum

use anyhow::{Context, Result};
use stat_ingest::api::{router, AppState};
use stat_ingest::{init_tracing, Config, Pipeline, QueryService, Scheduler, SqliteStore};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Config::from_env()?;

    let store = Arc::new(
        SqliteStore::open(&config.db_path)
            .with_context(|| format!("Failed to open database {}", config.db_path.display()))?,
    );
    info!(path = %config.db_path.display(), "database opened");

    // Keep the handle alive for the process lifetime
    let _scheduler = if config.scheduler_enabled {
        let provider = config.build_provider()?;
        let pipeline = Pipeline::new(provider, store.clone())
            .with_cycle_log(store.clone())
            .with_fetch_timeout(config.fetch_timeout);

        let scheduler = Arc::new(Scheduler::new(Arc::new(pipeline), &config.cron));
        let handle = scheduler
            .start()
            .await
            .with_context(|| format!("Failed to schedule ingestion with cron {:?}", config.cron))?;
        Some(handle)
    } else {
        warn!("scheduler disabled (STATS_SCHEDULER_ENABLED=false); serving stored data only");
        None
    };

    let app = router(AppState {
        query: QueryService::new(store.clone()),
        cycles: store,
    });

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Server is running on port {}", config.port);

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}
