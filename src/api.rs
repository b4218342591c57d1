// 🌐 REST API with Axum
// Thin HTTP layer over the Query Service and the cycle log

use crate::error::QueryError;
use crate::query::QueryService;
use crate::store::CycleLog;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::error;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub query: QueryService,
    pub cycles: Arc<dyn CycleLog>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

fn query_error_response(err: QueryError) -> Response {
    match err {
        QueryError::Validation(message) => error_response(StatusCode::BAD_REQUEST, &message),
        QueryError::Storage(e) => {
            error!("Error fetching player data: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}

#[derive(Deserialize)]
struct PlayerParams {
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
struct RunsParams {
    limit: Option<usize>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/players?name=<name> - Latest snapshot for one player
async fn get_player(
    State(state): State<AppState>,
    Query(params): Query<PlayerParams>,
) -> Response {
    match state.query.lookup(&params.name) {
        Ok(Some(record)) => (StatusCode::OK, Json(record)).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Player not found"),
        Err(e) => query_error_response(e),
    }
}

/// GET /api/players/history?name=<name> - Every stored snapshot, newest first
async fn get_player_history(
    State(state): State<AppState>,
    Query(params): Query<PlayerParams>,
) -> Response {
    match state.query.history(&params.name) {
        Ok(history) => (StatusCode::OK, Json(ApiResponse::ok(history))).into_response(),
        Err(e) => query_error_response(e),
    }
}

/// GET /api/runs?limit=<n> - Most recent ingestion cycles
async fn get_runs(State(state): State<AppState>, Query(params): Query<RunsParams>) -> Response {
    let limit = params.limit.unwrap_or(10).clamp(1, 100);

    match state.cycles.recent_cycles(limit) {
        Ok(runs) => (StatusCode::OK, Json(ApiResponse::ok(runs))).into_response(),
        Err(e) => {
            error!("Error getting ingestion runs: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}

/// Build the `/api` router with permissive CORS
pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/players", get(get_player))
        .route("/players/history", get(get_player_history))
        .route("/runs", get(get_runs))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::pipeline::{CycleReport, Pipeline};
    use crate::provider::StaticProvider;
    use crate::record::RawStatEntry;
    use crate::store::SqliteStore;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn seeded_router() -> Router {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let provider = Arc::new(StaticProvider::new(vec![
            RawStatEntry::new("A", "X").with_metric("points", 10.0),
            RawStatEntry::new("Stephen Curry", "GSW").with_metric("points", 26.4),
        ]));
        Pipeline::new(provider, store.clone())
            .with_cycle_log(store.clone())
            .run_cycle()
            .await;

        router(AppState {
            query: QueryService::new(store.clone()),
            cycles: store,
        })
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_player_found() {
        let (status, body) = get(seeded_router().await, "/api/players?name=A").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"name": "A", "team": "X", "points": 10.0}));
    }

    #[tokio::test]
    async fn test_player_name_is_url_decoded() {
        let (status, body) = get(seeded_router().await, "/api/players?name=Stephen%20Curry").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["team"], "GSW");
    }

    #[tokio::test]
    async fn test_player_not_found() {
        let (status, body) = get(seeded_router().await, "/api/players?name=Unknown").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Player not found");
    }

    #[tokio::test]
    async fn test_missing_name_is_bad_request() {
        let (status, _) = get(seeded_router().await, "/api/players").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = get(seeded_router().await, "/api/players?name=").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_history_and_runs() {
        let app = seeded_router().await;

        let (status, body) = get(app.clone(), "/api/players/history?name=A").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let (status, body) = get(app, "/api/runs").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["persisted"], 2);
    }

    /// Run log whose backing storage is gone
    struct BrokenLog;

    impl CycleLog for BrokenLog {
        fn record_cycle(&self, _report: &CycleReport) -> Result<(), StorageError> {
            Err(StorageError::Poisoned)
        }

        fn recent_cycles(&self, _limit: usize) -> Result<Vec<CycleReport>, StorageError> {
            Err(StorageError::Poisoned)
        }
    }

    #[tokio::test]
    async fn test_runs_storage_failure_is_error_body() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let app = router(AppState {
            query: QueryService::new(store),
            cycles: Arc::new(BrokenLog),
        });

        let (status, body) = get(app, "/api/runs").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "Internal Server Error"}));
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get(seeded_router().await, "/api/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"success": true, "data": "OK"}));
    }
}
