use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use niche_engine::config::preview;
use niche_engine::{CancelAck, EngineError, ProgressSummary, RunEngine, RunSpec};
use serde::Deserialize;
use serde_json::json;
use sheets_client::SheetsClient;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RunEngine>,
    /// Receives tokens from `POST /auth/token`.
    pub sheets: Arc<SheetsClient>,
}

pub fn build_router(state: AppState, allowed_origins: &[String]) -> Router {
    let cors = if allowed_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .route("/health", get(health))
        .route("/auth/token", post(set_token))
        .route("/runs", post(start_run))
        .route("/runs/step", post(step_run))
        .route("/runs/cancel", post(cancel_run))
        .route("/runs/current", get(current_run))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }),
        )
        .with_state(state)
}

// --- Errors ---

pub enum ApiError {
    Engine(EngineError),
    BadRequest(String),
    NotFound(&'static str),
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError::Engine(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Engine(err) => (engine_status(err), err.to_string()),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message.clone()),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message.to_string()),
        };
        if status.is_server_error() {
            error!(error = message.as_str(), "Request failed");
        }

        let mut body = json!({ "error": message });
        if matches!(self, ApiError::Engine(EngineError::NotAuthorized)) {
            body["authorize"] = json!(true);
        }
        (status, Json(body)).into_response()
    }
}

fn engine_status(err: &EngineError) -> StatusCode {
    match err {
        EngineError::NotAuthorized => StatusCode::UNAUTHORIZED,
        EngineError::InvalidLeadsTab(_) | EngineError::InvalidRange { .. } => {
            StatusCode::BAD_REQUEST
        }
        EngineError::NoActiveRun => StatusCode::NOT_FOUND,
        EngineError::RunMismatch { .. } => StatusCode::CONFLICT,
        EngineError::Setup(_) | EngineError::StepInterrupted(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

// --- Handlers ---

async fn health() -> &'static str {
    "ok"
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenRequest {
    access_token: String,
}

async fn set_token(
    State(state): State<AppState>,
    Json(request): Json<TokenRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let token = request.access_token.trim();
    if token.is_empty() {
        return Err(ApiError::BadRequest("accessToken must not be empty".to_string()));
    }
    info!(token = preview(token).as_str(), "Spreadsheet access token updated");
    state.sheets.set_access_token(token.to_string());
    Ok(Json(json!({ "ok": true })))
}

async fn start_run(
    State(state): State<AppState>,
    Json(spec): Json<RunSpec>,
) -> Result<Json<ProgressSummary>, ApiError> {
    Ok(Json(state.engine.start(spec).await?))
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StepRequest {
    run_id: Option<String>,
}

/// The body is optional; an empty one steps whatever run is active.
async fn step_run(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ProgressSummary>, ApiError> {
    let request: StepRequest = if body.iter().all(u8::is_ascii_whitespace) {
        StepRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid step request: {e}")))?
    };
    Ok(Json(state.engine.step(request.run_id.as_deref()).await?))
}

async fn cancel_run(State(state): State<AppState>) -> Json<CancelAck> {
    Json(state.engine.cancel().await)
}

async fn current_run(State(state): State<AppState>) -> Result<Json<ProgressSummary>, ApiError> {
    state
        .engine
        .status()
        .map(Json)
        .ok_or(ApiError::NotFound("No run has been started"))
}
