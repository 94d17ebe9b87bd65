//! HTTP surface tests
//!
//! Exercise the axum router with `tower::ServiceExt::oneshot` against an
//! in-memory database and scripted adapters. Entry-point validation is the
//! focus: malformed input is the only thing that may hard-fail, and it must
//! fail before any source work starts.

mod helpers;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use scout_common::events::EventBus;
use scout_cs::models::search_session::{SearchSession, SessionState};
use scout_cs::oracle::HeuristicValidator;
use scout_cs::sources::AdapterRegistry;
use scout_cs::types::Platform;
use scout_cs::{build_router, AppState};

use helpers::{full_candidate, test_pool, ScriptedAdapter};

/// App with one scripted GitHub adapter and the heuristic validator
async fn test_app() -> (axum::Router, sqlx::SqlitePool) {
    let pool = test_pool().await;

    let mut registry = AdapterRegistry::new();
    registry.register(Arc::new(ScriptedAdapter::returning(
        Platform::Github,
        vec![full_candidate(Platform::Github, "Test Person", None, &["rust"])],
    )));

    let state = AppState::new(
        pool.clone(),
        EventBus::new(64),
        Arc::new(registry),
        Arc::new(HeuristicValidator),
        Vec::new(),
    );
    (build_router(state), pool)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn health_reports_module_and_sources() {
    let (app, _pool) = test_app().await;

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "scout-cs");
    assert_eq!(json["sources"], json!(["github"]));
    assert!(json["uptime_seconds"].is_u64());
}

#[tokio::test]
async fn start_rejects_empty_query() {
    let (app, _pool) = test_app().await;

    let response = app
        .oneshot(post_json("/search/start", json!({ "query": "   " })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn start_rejects_unknown_platform() {
    let (app, _pool) = test_app().await;

    let response = app
        .oneshot(post_json(
            "/search/start",
            json!({ "query": "rust developer", "sources": ["myspace"] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn start_rejects_unregistered_platform() {
    let (app, _pool) = test_app().await;

    // Kaggle is a valid tag but has no adapter in this app
    let response = app
        .oneshot(post_json(
            "/search/start",
            json!({ "query": "rust developer", "sources": ["kaggle"] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"]["message"]
        .as_str()
        .unwrap()
        .contains("kaggle"));
}

#[tokio::test]
async fn blocking_search_returns_final_results() {
    let (app, pool) = test_app().await;

    let response = app
        .oneshot(post_json(
            "/search",
            json!({
                "query": "rust developer",
                "sources": ["github"],
                "minimum_results": 1,
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["state"], "DONE");
    assert_eq!(json["candidates"].as_array().unwrap().len(), 1);
    assert_eq!(json["metadata"]["completion_rate"], 1.0);
    assert_eq!(json["metadata"]["quality_report"]["guarantee_met"], true);

    // The session row reached its terminal state before the response
    let session_id: uuid::Uuid = json["session_id"].as_str().unwrap().parse().unwrap();
    let stored = scout_cs::db::sessions::load_session(&pool, session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.state, SessionState::Done);
}

#[tokio::test]
async fn start_conflicts_with_running_session() {
    let (app, pool) = test_app().await;

    // A non-terminal session row is enough to represent "already running"
    let running = SearchSession::new("other search".to_string(), None, vec![], Some(60), 10);
    scout_cs::db::sessions::save_session(&pool, &running)
        .await
        .unwrap();

    let response = app
        .oneshot(post_json("/search/start", json!({ "query": "rust" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn start_then_status_roundtrip() {
    let (app, _pool) = test_app().await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/search/start",
            json!({
                "query": "senior rust developer",
                "sources": ["github"],
                "time_budget_seconds": 45,
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let started = body_json(response).await;
    assert_eq!(started["state"], "COLLECTING");
    assert_eq!(started["time_budget_seconds"], 45);
    let session_id = started["session_id"].as_str().unwrap().to_string();

    let response = app
        .oneshot(get(&format!("/search/status/{}", session_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let status = body_json(response).await;
    assert_eq!(status["session_id"], started["session_id"]);
    assert_eq!(status["query"], "senior rust developer");
}

#[tokio::test]
async fn status_unknown_session_returns_404() {
    let (app, _pool) = test_app().await;

    let response = app
        .oneshot(get(&format!(
            "/search/status/{}",
            uuid::Uuid::new_v4()
        )))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn results_conflict_while_session_running() {
    let (app, pool) = test_app().await;

    let running = SearchSession::new("rust".to_string(), None, vec![], Some(60), 10);
    scout_cs::db::sessions::save_session(&pool, &running)
        .await
        .unwrap();

    let response = app
        .oneshot(get(&format!("/search/results/{}", running.session_id)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn cancel_terminal_session_is_rejected() {
    let (app, pool) = test_app().await;

    let mut finished = SearchSession::new("rust".to_string(), None, vec![], Some(60), 10);
    finished.transition_to(SessionState::Done);
    scout_cs::db::sessions::save_session(&pool, &finished)
        .await
        .unwrap();

    let response = app
        .oneshot(post_json(
            &format!("/search/cancel/{}", finished.session_id),
            json!({}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cancel_stale_session_closes_it_directly() {
    let (app, pool) = test_app().await;

    // Session row without a live background task (service restart scenario)
    let stale = SearchSession::new("rust".to_string(), None, vec![], Some(60), 10);
    scout_cs::db::sessions::save_session(&pool, &stale)
        .await
        .unwrap();

    let response = app
        .oneshot(post_json(
            &format!("/search/cancel/{}", stale.session_id),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let stored = scout_cs::db::sessions::load_session(&pool, stale.session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.state, SessionState::Cancelled);
}

#[tokio::test]
async fn settings_roundtrip_masks_secrets() {
    let (app, _pool) = test_app().await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/settings/github_token",
            json!({ "value": "ghp_supersecrettoken" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/api/settings")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let entry = json["keys"]
        .as_array()
        .unwrap()
        .iter()
        .find(|k| k["name"] == "github_token")
        .expect("github_token listed");
    assert_eq!(entry["configured"], true);
    let shown = entry["value"].as_str().unwrap();
    assert!(shown.starts_with("ghp_"));
    assert!(!shown.contains("supersecret"));

    // Guarantee tunables come back with their defaults
    assert_eq!(json["guarantee"]["minimum_results"], 10);
    assert_eq!(json["guarantee"]["quality_threshold"], 60.0);
    assert_eq!(json["guarantee"]["max_retries"], 3);
}

#[tokio::test]
async fn settings_rejects_unknown_key() {
    let (app, _pool) = test_app().await;

    let response = app
        .oneshot(post_json(
            "/api/settings/favourite_color",
            json!({ "value": "green" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn settings_validates_tunable_ranges() {
    let (app, _pool) = test_app().await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/settings/cs_max_retries",
            json!({ "value": "50" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/settings/cs_max_retries",
            json!({ "value": "2" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/api/settings")).await.unwrap();
    let json = body_json(response).await;
    assert_eq!(json["guarantee"]["max_retries"], 2);
}
