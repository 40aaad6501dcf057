//! `WanderSafeServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use wandersafe_core::ConnectionId;
use wandersafe_proximity::{HubConfig, ProximityHub};

use crate::config::ServerConfig;
use crate::errors::{Result, ServerError};
use crate::health::{self, HealthResponse};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::broadcast::BroadcastManager;
use crate::websocket::session::{SessionContext, run_ws_session};

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Proximity hub handle.
    pub hub: ProximityHub,
    /// Connection table and fan-out.
    pub broadcast: Arc<BroadcastManager>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle for `/metrics`.
    pub metrics_handle: PrometheusHandle,
}

/// The WanderSafe proximity server.
pub struct WanderSafeServer {
    config: Arc<ServerConfig>,
    hub: ProximityHub,
    broadcast: Arc<BroadcastManager>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    metrics_handle: PrometheusHandle,
}

impl WanderSafeServer {
    /// Create a server and start its proximity hub.
    ///
    /// Must be called inside a Tokio runtime. The hub stops when the
    /// server's shutdown token fires.
    pub fn new(config: ServerConfig, hub_config: HubConfig, metrics_handle: PrometheusHandle) -> Self {
        let broadcast = Arc::new(BroadcastManager::new());
        let shutdown = Arc::new(ShutdownCoordinator::new());
        let (hub, hub_task) = ProximityHub::spawn(hub_config, broadcast.clone(), shutdown.token());
        shutdown.track(hub_task);
        Self {
            config: Arc::new(config),
            hub,
            broadcast,
            shutdown,
            start_time: Instant::now(),
            metrics_handle,
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            config: self.config.clone(),
            hub: self.hub.clone(),
            broadcast: self.broadcast.clone(),
            shutdown: self.shutdown.clone(),
            start_time: self.start_time,
            metrics_handle: self.metrics_handle.clone(),
        };

        Router::new()
            .route("/", get(root_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/api/live/sessions", get(live_sessions_handler))
            .route("/ws", get(ws_handler))
            .with_state(state)
            .layer(cors_layer(&self.config.cors_origins))
            .layer(TraceLayer::new_for_http())
    }

    /// Bind and serve in the background until the shutdown token fires.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>)> {
        let addr = self.config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "wandersafe server listening");

        let router = self.router();
        let token = self.shutdown.token();
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await
            {
                warn!(error = %e, "server error");
            }
        });
        Ok((local_addr, handle))
    }

    /// Proximity hub handle.
    pub fn hub(&self) -> &ProximityHub {
        &self.hub
    }

    /// Get the broadcast manager.
    pub fn broadcast(&self) -> &Arc<BroadcastManager> {
        &self.broadcast
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// CORS for the configured frontend origins, with credentials.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| {
            if o.trim() == "*" {
                warn!("ignoring wildcard CORS origin, credentials require explicit origins");
                return None;
            }
            match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(origin = %o, "ignoring invalid CORS origin");
                    None
                }
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

/// GET /
async fn root_handler() -> Json<serde_json::Value> {
    Json(json!({ "message": "Root BackEnd, Nothing here!" }))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let sessions = state.hub.snapshot().await.ok().map(|s| s.len());
    Json(health::health_check(
        state.start_time,
        state.broadcast.connection_count(),
        sessions,
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        crate::metrics::render(&state.metrics_handle),
    )
}

/// GET /api/live/sessions: current positions for the dashboard map.
async fn live_sessions_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.hub.snapshot().await {
        Ok(snapshot) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "count": snapshot.len(),
                "sessions": snapshot.sessions(),
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "success": false, "error": e.to_string() })),
        ),
    }
}

/// GET /ws: upgrade and hand the socket to a session task.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let client_id = ConnectionId::generate();
    let ctx = SessionContext {
        hub: state.hub.clone(),
        broadcast: state.broadcast.clone(),
        heartbeat_interval: state.config.heartbeat_interval(),
        heartbeat_timeout: state.config.heartbeat_timeout(),
        send_queue_capacity: state.config.send_queue_capacity,
        shutdown: state.shutdown.token(),
    };
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| run_ws_session(socket, client_id, ctx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use tower::ServiceExt;
    use wandersafe_proximity::LocationReport;

    fn make_server() -> WanderSafeServer {
        let handle = PrometheusBuilder::new().build_recorder().handle();
        WanderSafeServer::new(ServerConfig::default(), HubConfig::default(), handle)
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), 100_000).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn server_with_default_config() {
        let server = make_server();
        assert_eq!(server.config().host, "127.0.0.1");
        assert_eq!(server.config().port, 0);
        assert_eq!(server.broadcast().connection_count(), 0);
        assert!(!server.shutdown().is_shutting_down());
        // Hub task is tracked for shutdown.
        assert_eq!(server.shutdown().tracked(), 1);
    }

    #[tokio::test]
    async fn root_returns_message() {
        let (status, body) = get_json(make_server().router(), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Root BackEnd, Nothing here!");
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let (status, body) = get_json(make_server().router(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["connections"], 0);
        assert_eq!(body["active_sessions"], 0);
        assert!(body["uptime_secs"].is_number());
    }

    #[tokio::test]
    async fn health_degraded_after_hub_stops() {
        let server = make_server();
        server.shutdown().graceful_shutdown(std::time::Duration::from_secs(5)).await;
        let (_, body) = get_json(server.router(), "/health").await;
        assert_eq!(body["status"], "degraded");
    }

    #[tokio::test]
    async fn live_sessions_lists_registry() {
        let server = make_server();
        server
            .hub()
            .report("conn_a".into(), LocationReport::new("A", "Asha", 18.5204, 73.8567))
            .await
            .unwrap();

        let (status, body) = get_json(server.router(), "/api/live/sessions").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["count"], 1);
        assert_eq!(body["sessions"][0]["userId"], "A");
        assert_eq!(body["sessions"][0]["name"], "Asha");
        assert_eq!(body["sessions"][0]["location"]["lat"], 18.5204);
    }

    #[tokio::test]
    async fn live_sessions_unavailable_after_shutdown() {
        let server = make_server();
        server.shutdown().graceful_shutdown(std::time::Duration::from_secs(5)).await;
        let (status, body) = get_json(server.router(), "/api/live/sessions").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn metrics_endpoint_is_text() {
        let app = make_server().router();
        let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let ct = resp.headers().get(header::CONTENT_TYPE).unwrap();
        assert!(ct.to_str().unwrap().starts_with("text/plain"));
    }

    #[tokio::test]
    async fn ws_without_upgrade_is_rejected() {
        let app = make_server().router();
        let req = Request::builder().uri("/ws").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert!(resp.status().is_client_error());
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let app = make_server().router();
        let req = Request::builder().uri("/nonexistent").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cors_allows_configured_origin() {
        let app = make_server().router();
        let req = Request::builder()
            .uri("/health")
            .header(header::ORIGIN, "http://localhost:3000")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(
            resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "http://localhost:3000"
        );
        assert_eq!(
            resp.headers().get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
            "true"
        );
    }

    #[tokio::test]
    async fn cors_ignores_other_origins() {
        let app = make_server().router();
        let req = Request::builder()
            .uri("/health")
            .header(header::ORIGIN, "http://evil.example")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert!(resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    #[tokio::test]
    async fn wildcard_origin_is_skipped() {
        let config = ServerConfig {
            cors_origins: vec!["*".into(), "http://localhost:3000".into()],
            ..ServerConfig::default()
        };
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let server = WanderSafeServer::new(config, HubConfig::default(), handle);
        let req = Request::builder()
            .uri("/health")
            .header(header::ORIGIN, "http://elsewhere.example")
            .body(Body::empty())
            .unwrap();
        let resp = server.router().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    #[test]
    fn invalid_origin_is_skipped() {
        let _layer = cors_layer(&["http://ok.example".into(), "bad\norigin".into()]);
    }
}
