//! The HTTP surface itself: four read-only routes plus the ambient
//! `/metrics` companion. Every handler only reads the cached snapshot —
//! none of them talk to the Dispatcher or NameService directly.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::{Json, Router};

use crate::state::MonitorState;

pub fn build_router(state: Arc<MonitorState>) -> Router {
    Router::new()
        .route("/stats", get(stats_handler))
        .route("/workers", get(workers_handler))
        .route("/tasks", get(tasks_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/", get(snapshot_page))
        .with_state(state)
}

async fn stats_handler(State(state): State<Arc<MonitorState>>) -> impl IntoResponse {
    let (status, body) = snapshot_field_body(state.snapshot().await.stats);
    (status, Json(body))
}

async fn workers_handler(State(state): State<Arc<MonitorState>>) -> impl IntoResponse {
    let (status, body) = snapshot_field_body(state.snapshot().await.workers);
    (status, Json(body))
}

async fn tasks_handler(State(state): State<Arc<MonitorState>>) -> impl IntoResponse {
    let (status, body) = snapshot_field_body(state.snapshot().await.tasks);
    (status, Json(body))
}

/// Shared shape for `/stats`, `/workers`, `/tasks`: echo the cached field
/// verbatim, or report that nothing has been polled yet.
fn snapshot_field_body(field: Option<serde_json::Value>) -> (StatusCode, serde_json::Value) {
    match field {
        Some(value) => (StatusCode::OK, value),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            serde_json::json!({"error": "no data polled yet"}),
        ),
    }
}

/// Health check: healthy only if the last poll reached both the Dispatcher
/// and the NameService.
async fn health_handler(State(state): State<Arc<MonitorState>>) -> impl IntoResponse {
    let (status, body) = health_body(&state.snapshot().await);
    (status, Json(body))
}

fn health_body(snapshot: &crate::state::Snapshot) -> (StatusCode, serde_json::Value) {
    let status = if snapshot.healthy() { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };

    let body = serde_json::json!({
        "status": if snapshot.healthy() { "healthy" } else { "unhealthy" },
        "services": {
            "dispatcher": if snapshot.dispatcher_reachable { "healthy" } else { "unhealthy" },
            "nameservice": if snapshot.nameservice_reachable { "healthy" } else { "unhealthy" },
        },
        "last_polled_at": snapshot.last_polled_at,
    });

    (status, body)
}

/// Prometheus metrics endpoint — exposes the fabric-wide gauges the poll
/// loop maintains (`fabric_total_tasks`, `fabric_completed_tasks`,
/// `fabric_open_tasks`), not the Monitor process's own metrics.
async fn metrics_handler(State(state): State<Arc<MonitorState>>) -> String {
    state.metrics_handle.render()
}

/// Minimal static HTML snapshot page — a richer UI is out of scope.
async fn snapshot_page(State(state): State<Arc<MonitorState>>) -> Html<String> {
    let snapshot = state.snapshot().await;
    let stats = snapshot
        .stats
        .as_ref()
        .map(|s| serde_json::to_string_pretty(s).unwrap_or_default())
        .unwrap_or_else(|| "no data polled yet".to_string());
    let workers = snapshot
        .workers
        .as_ref()
        .map(|w| serde_json::to_string_pretty(w).unwrap_or_default())
        .unwrap_or_else(|| "no data polled yet".to_string());

    Html(format!(
        "<!DOCTYPE html><html><head><title>fabric monitor</title></head><body>\
         <h1>fabric monitor</h1>\
         <p>status: {}</p>\
         <h2>stats</h2><pre>{}</pre>\
         <h2>workers</h2><pre>{}</pre>\
         </body></html>",
        if snapshot.healthy() { "healthy" } else { "unhealthy" },
        html_escape(&stats),
        html_escape(&workers),
    ))
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Snapshot;

    #[test]
    fn snapshot_field_reports_unavailable_before_any_poll() {
        let (status, body) = snapshot_field_body(None);
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].is_string());
    }

    #[test]
    fn snapshot_field_echoes_the_cached_value() {
        let (status, body) = snapshot_field_body(Some(serde_json::json!({"total_tasks": 3})));
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_tasks"], 3);
    }

    #[test]
    fn health_body_is_unhealthy_until_both_peers_are_reachable() {
        let mut snapshot = Snapshot { dispatcher_reachable: true, nameservice_reachable: false, ..Default::default() };
        let (status, body) = health_body(&snapshot);
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "unhealthy");
        assert_eq!(body["services"]["dispatcher"], "healthy");
        assert_eq!(body["services"]["nameservice"], "unhealthy");

        snapshot.nameservice_reachable = true;
        let (status, body) = health_body(&snapshot);
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }
}
