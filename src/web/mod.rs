//! Web server module

mod middleware;
mod routes;
mod sse;

use axum::{
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderName, HeaderValue, Method,
    },
    routing::get,
    Router,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
};
use tracing::info;

use crate::error::ServerError;
use crate::hub::SharedHub;
use crate::query::QueryService;
use crate::refresher::RefreshMonitor;

pub use middleware::RequestLoggingLayer;
pub use routes::HealthResponse;

pub struct AppState {
    pub query: QueryService,
    pub hub: SharedHub,
    pub monitor: Arc<RefreshMonitor>,
    /// Ends open event streams when the server shuts down
    pub shutdown: CancellationToken,
    pub keep_alive: Duration,
}

/// Build the application router.
///
/// - `GET /` dashboard page
/// - `GET /api/earthquakes` current snapshot
/// - `GET /api/stream` server-sent snapshot stream
/// - `GET /api/health` refresh status and staleness
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([ACCEPT, CONTENT_TYPE])
        .max_age(Duration::from_secs(300));

    // Reverse proxies must not buffer the event stream
    let no_proxy_buffering = SetResponseHeaderLayer::overriding(
        HeaderName::from_static("x-accel-buffering"),
        HeaderValue::from_static("no"),
    );

    Router::new()
        .route("/", get(routes::index))
        .route("/api/earthquakes", get(routes::api_earthquakes))
        .route("/api/health", get(routes::api_health))
        .route(
            "/api/stream",
            get(sse::stream_handler).layer(no_proxy_buffering),
        )
        .layer(cors)
        .layer(RequestLoggingLayer::new())
        .with_state(state)
}

/// Serve until `shutdown` fires, then drain open connections
pub async fn start_server(
    addr: &str,
    state: Arc<AppState>,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind(format!("bind failed on {addr}: {e}")))?;

    info!("Earthquake monitor running on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown.cancelled_owned())
    .await
    .map_err(|e| ServerError::Serve(e.to_string()))?;

    Ok(())
}
