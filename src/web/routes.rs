//! HTTP routes

use axum::{extract::State, response::Html, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use super::AppState;
use crate::query::{serialize_last_update, SnapshotView};
use crate::refresher::RefreshStatus;

/// Serve the dashboard page
pub async fn index() -> Html<&'static str> {
    Html(include_str!("../../static/index.html"))
}

/// API: current snapshot
pub async fn api_earthquakes(State(state): State<Arc<AppState>>) -> Json<SnapshotView> {
    Json(state.query.snapshot_view())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// `ok`, `degraded` (serving an older snapshot after failures) or `empty`
    pub status: &'static str,
    #[serde(serialize_with = "serialize_last_update")]
    pub last_update: Option<DateTime<Utc>>,
    pub stale_seconds: Option<i64>,
    pub count: usize,
    pub subscribers: usize,
    pub refresh: RefreshStatus,
}

/// API: refresher health and snapshot staleness
pub async fn api_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let view = state.query.snapshot_view();
    let refresh = state.monitor.status().as_ref().clone();

    let status = match (view.last_update, refresh.consecutive_failures) {
        (None, _) => "empty",
        (Some(_), 0) => "ok",
        (Some(_), _) => "degraded",
    };

    Json(HealthResponse {
        status,
        last_update: view.last_update,
        stale_seconds: view
            .last_update
            .map(|at| (Utc::now() - at).num_seconds().max(0)),
        count: view.count,
        subscribers: state.hub.subscriber_count(),
        refresh,
    })
}
