use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::info;

use crate::error::RuleError;
use crate::rule::ForemanRule;
use crate::store::{RuleSet, RuleSetStore};

/// Configuration for the rule management API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleServiceConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

fn default_bind_address() -> String {
    "0.0.0.0:8081".to_string()
}

impl Default for RuleServiceConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

#[derive(Clone)]
struct RuleServiceState {
    store: RuleSetStore,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: String,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ReplaceRequest {
    rules: Vec<ForemanRule>,
}

/// Composes the REST router for rule management. These are pure data
/// operations; rendering and editor authorization live outside the foreman.
#[derive(Clone)]
pub struct RuleApiBuilder {
    state: RuleServiceState,
}

impl RuleApiBuilder {
    pub fn new(store: RuleSetStore) -> Self {
        Self {
            state: RuleServiceState { store },
        }
    }

    pub fn into_router(self) -> Router {
        Router::new()
            .route("/health", get(health))
            .route(
                "/rules",
                get(list_rules).post(add_rule).put(replace_rules),
            )
            .route("/rules/:index", delete(remove_rule))
            .with_state(self.state)
    }

    /// Spawns an HTTP server binding to the configured address.
    pub async fn serve(self, config: RuleServiceConfig) -> anyhow::Result<oneshot::Sender<()>> {
        let (tx, rx) = oneshot::channel();
        let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
        let state = self.state.clone();

        tokio::spawn(async move {
            info!(address = %config.bind_address, "starting foreman rule service");
            let app = RuleApiBuilder { state }.into_router();
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

async fn list_rules(State(state): State<RuleServiceState>) -> impl IntoResponse {
    Json(state.store.load())
}

async fn add_rule(
    State(state): State<RuleServiceState>,
    Json(rule): Json<ForemanRule>,
) -> Result<(StatusCode, Json<RuleSet>), (StatusCode, Json<ErrorResponse>)> {
    state
        .store
        .append(rule)
        .map(|set| (StatusCode::CREATED, Json(set)))
        .map_err(map_error)
}

async fn remove_rule(
    State(state): State<RuleServiceState>,
    Path(index): Path<usize>,
) -> Result<Json<RuleSet>, (StatusCode, Json<ErrorResponse>)> {
    state.store.remove_at(index).map(Json).map_err(map_error)
}

async fn replace_rules(
    State(state): State<RuleServiceState>,
    Json(payload): Json<ReplaceRequest>,
) -> Result<Json<RuleSet>, (StatusCode, Json<ErrorResponse>)> {
    state
        .store
        .replace(payload.rules)
        .map(Json)
        .map_err(map_error)
}

fn map_error(err: RuleError) -> (StatusCode, Json<ErrorResponse>) {
    let (status, code) = match &err {
        RuleError::InvalidRule { .. } | RuleError::MalformedPattern { .. } => {
            (StatusCode::BAD_REQUEST, "invalid_rule")
        }
        RuleError::IndexOutOfRange { .. } | RuleError::NotFound { .. } => {
            (StatusCode::NOT_FOUND, "not_found")
        }
        RuleError::DuplicateRule { .. } => (StatusCode::CONFLICT, "duplicate_rule"),
        RuleError::StorageUnavailable { .. } => {
            (StatusCode::SERVICE_UNAVAILABLE, "storage_unavailable")
        }
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    };

    (
        status,
        Json(ErrorResponse {
            code: code.to_string(),
            message: err.to_string(),
        }),
    )
}
