//! HTTP surface against an engine backed by the in-memory doubles.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use niche_engine::testing::{MemorySpreadsheet, MockJobProvider};
use niche_engine::{EngineSettings, RunEngine};
use niche_server::routes::{build_router, AppState};
use serde_json::{json, Value};
use sheets_client::SheetsClient;
use tower::ServiceExt;

fn app_with(sheets: MemorySpreadsheet) -> (Router, Arc<SheetsClient>) {
    let engine = Arc::new(RunEngine::new(
        Arc::new(MockJobProvider::new()),
        Arc::new(sheets),
        EngineSettings::builder().build(),
    ));
    let credentials = Arc::new(SheetsClient::with_base_url("http://127.0.0.1:9", None));
    let state = AppState {
        engine,
        sheets: credentials.clone(),
    };
    (build_router(state, &[]), credentials)
}

fn app() -> Router {
    let sheets = MemorySpreadsheet::new().with_tab(
        "Settings",
        &[
            &["Location", "Sub-Niches", "Apify Token", "Scraped"],
            &["Austin", "plumbers", "tok", "Y"],
        ],
    );
    app_with(sheets).0
}

fn run_body(start_row: u32, end_row: u32) -> Value {
    json!({
        "spreadsheetId": "doc-1",
        "settingsSheetName": "Settings",
        "startRow": start_row,
        "endRow": end_row,
    })
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            request = request.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn health_is_ok() {
    let response = app()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn run_lifecycle_over_http() {
    let app = app();

    let (status, _) = send(&app, "GET", "/runs/current", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, started) = send(&app, "POST", "/runs", Some(run_body(2, 2))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(started["done"], false);
    assert_eq!(started["processed"], 0);
    let run_id = started["runId"].as_str().unwrap().to_string();

    let (status, body) = send(&app, "POST", "/runs/step", Some(json!({ "runId": "stale" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("stale"));

    let (status, stepped) = send(&app, "POST", "/runs/step", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stepped["runId"], run_id.as_str());
    assert_eq!(stepped["done"], true);
    assert_eq!(stepped["perRow"][0]["row"], 2);
    assert_eq!(stepped["perRow"][0]["status"], "skipped");

    let (status, current) = send(&app, "GET", "/runs/current", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(current["done"], true);

    let (status, body) = send(&app, "POST", "/runs/step", Some(json!({ "runId": run_id }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "No active run");
}

#[tokio::test]
async fn invalid_range_is_bad_request() {
    let (status, body) = send(&app(), "POST", "/runs", Some(run_body(1, 3))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Invalid row range"));
}

#[tokio::test]
async fn missing_credentials_ask_for_authorization() {
    let (app, _) = app_with(MemorySpreadsheet::new().unauthorized());
    let (status, body) = send(&app, "POST", "/runs", Some(run_body(2, 3))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["authorize"], true);
}

#[tokio::test]
async fn malformed_step_body_is_bad_request() {
    let (status, body) = send(&app(), "POST", "/runs/step", Some(json!({ "runId": 42 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Invalid step request"));
}

#[tokio::test]
async fn cancel_without_run_is_acknowledged() {
    let (status, body) = send(&app(), "POST", "/runs/cancel", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["acknowledged"], true);
    assert_eq!(body["runId"], Value::Null);
}

#[tokio::test]
async fn access_token_is_handed_to_the_sheets_client() {
    let (app, credentials) = app_with(MemorySpreadsheet::new());
    assert!(!credentials.has_access_token());

    let (status, _) = send(&app, "POST", "/auth/token", Some(json!({ "accessToken": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!credentials.has_access_token());

    let (status, body) = send(
        &app,
        "POST",
        "/auth/token",
        Some(json!({ "accessToken": "ya29.token" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert!(credentials.has_access_token());
}
