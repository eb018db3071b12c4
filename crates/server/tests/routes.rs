//! Smoke tests for the HTTP surface: auth enforcement and the
//! board -> column -> task happy path, driven through the real router
//! with `tower::ServiceExt::oneshot` against an in-memory database.

use std::path::PathBuf;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;

use kanban_core_db::storage::StorageEngine;
use kanban_core_server::state::AppState;
use kanban_core_services::{BackupScheduler, EventHub, TagService, TaskService};
use kanban_core_utils::config::{
    AuthConfig, BackupConfig, Config, DatabaseConfig, PriorityWeights, ServerConfig, WebsocketConfig,
};

const API_KEY: &str = "test-key";

async fn test_state() -> AppState {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite connects");
    kanban_core_db::migrations::up(&pool, None).await.expect("migrations apply");
    let storage = StorageEngine::from_pool(pool);
    let events = EventHub::new();
    let weights = PriorityWeights::default();

    let config = Config {
        server: ServerConfig { host: "127.0.0.1".to_string(), port: 0 },
        database: DatabaseConfig {
            path: ":memory:".to_string(),
            memory_limit_bytes: 64 * 1024 * 1024,
            busy_timeout: Duration::from_secs(5),
        },
        auth: AuthConfig { api_key_secret: "test-secret".to_string(), api_keys: vec![API_KEY.to_string()] },
        websocket: WebsocketConfig {
            port: 0,
            max_connections: 10,
            heartbeat_interval: Duration::from_secs(25),
            heartbeat_timeout: Duration::from_secs(60),
            write_queue_capacity: 16,
            max_inbound_per_minute: 100,
            max_subscriptions: 50,
        },
        backup: BackupConfig {
            enabled: false,
            schedule: "0 0 2 * * *".to_string(),
            retention_days: 7,
            max_count: 5,
            dir: "./data/backups".to_string(),
        },
        priority_weights: weights,
    };

    let tasks = TaskService::new(storage.pool().clone(), events.clone(), weights);
    let tags = TagService::new(storage.pool().clone(), events.clone());
    let backups = BackupScheduler::new(
        storage.pool().clone(),
        events.clone(),
        PathBuf::from(&config.database.path),
        PathBuf::from(&config.backup.dir),
        config.backup.retention_days,
        config.backup.max_count,
    );

    AppState::new(storage, tasks, tags, backups, events, config)
}

fn authed_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("X-API-Key", API_KEY)
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn database_health_is_reachable_without_a_credential() {
    let app = kanban_core_server::app(test_state().await);
    let request = Request::builder().uri("/api/database/health").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn board_routes_reject_requests_without_a_credential() {
    let app = kanban_core_server::app(test_state().await);
    let request = Request::builder().uri("/api/boards").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_board_column_and_task_round_trips_through_the_api() {
    let app = kanban_core_server::app(test_state().await);

    let response = app
        .clone()
        .oneshot(authed_request("POST", "/api/boards", json!({"name": "Launch", "description": null})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let board_id = body["data"]["id"].as_str().expect("board id present").to_string();

    let response = app
        .clone()
        .oneshot(authed_request(
            "POST",
            &format!("/api/boards/{board_id}/columns"),
            json!({"board_id": board_id, "name": "Todo", "color": null}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let column_id = body["data"]["id"].as_str().expect("column id present").to_string();

    let response = app
        .clone()
        .oneshot(authed_request(
            "POST",
            "/api/tasks",
            json!({
                "board_id": board_id,
                "column_id": column_id,
                "title": "Write the release notes",
                "description": null,
                "priority_int": null,
                "due_date": null,
                "assignee": null,
                "estimated_hours": null,
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["title"], "Write the release notes");

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/tasks?board={board_id}"))
                .header("X-API-Key", API_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"].as_array().expect("task list").len(), 1);
}
