use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::info;

use foreman_rules::ClientSnapshot;

use crate::engine::{EvaluationOutcome, ForemanEngine};
use crate::error::EngineError;

/// Configuration for the evaluation API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineServiceConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

fn default_bind_address() -> String {
    "0.0.0.0:8090".to_string()
}

impl Default for EngineServiceConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

#[derive(Clone)]
struct EngineApiState {
    engine: ForemanEngine,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: String,
    message: String,
}

/// Composes the REST router that exposes evaluation triggers. Check-in
/// handlers post the client's snapshot here; the response reports what fired.
pub struct EngineApiBuilder {
    state: EngineApiState,
}

impl EngineApiBuilder {
    pub fn new(engine: ForemanEngine) -> Self {
        Self {
            state: EngineApiState { engine },
        }
    }

    pub fn into_router(self) -> Router {
        Router::new()
            .route("/health", get(health))
            .route("/clients/:client_id/evaluate", post(evaluate_client))
            .route("/clients/:client_id/ledger", get(client_ledger))
            .with_state(self.state)
    }

    /// Spawns an HTTP server binding to the configured address.
    pub async fn serve(self, config: EngineServiceConfig) -> anyhow::Result<oneshot::Sender<()>> {
        let (tx, rx) = oneshot::channel();
        let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
        let state = self.state;

        tokio::spawn(async move {
            info!(address = %config.bind_address, "starting foreman engine service");
            let app = EngineApiBuilder { state }.into_router();
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = rx.await;
                })
                .await
                .ok();
        });

        Ok(tx)
    }
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn evaluate_client(
    State(state): State<EngineApiState>,
    Path(client_id): Path<String>,
    Json(snapshot): Json<ClientSnapshot>,
) -> Result<Json<EvaluationOutcome>, (StatusCode, Json<ErrorResponse>)> {
    state
        .engine
        .evaluate(&client_id, &snapshot)
        .await
        .map(Json)
        .map_err(map_error)
}

async fn client_ledger(
    State(state): State<EngineApiState>,
    Path(client_id): Path<String>,
) -> impl IntoResponse {
    Json(state.engine.ledger().client(&client_id))
}

fn map_error(err: EngineError) -> (StatusCode, Json<ErrorResponse>) {
    let (status, code) = match &err {
        EngineError::Storage(_) | EngineError::Ledger(_) => {
            (StatusCode::SERVICE_UNAVAILABLE, "storage_unavailable")
        }
        EngineError::SnapshotUnavailable { .. } => (StatusCode::NOT_FOUND, "snapshot_unavailable"),
    };

    (
        status,
        Json(ErrorResponse {
            code: code.to_string(),
            message: err.to_string(),
        }),
    )
}
