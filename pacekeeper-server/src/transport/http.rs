//! HTTP transport
//!
//! # API Endpoints
//!
//! | Route | Method | Response body |
//! |-------|--------|---------------|
//! | `/` | GET | empty HTML page |
//! | `/health` | GET | `OK` |
//! | `/metrics` | GET | Prometheus text |
//! | `/limiter/{key}` | GET, POST | wait in milliseconds; POST consumes one unit |
//! | `/api` | GET | `Counter 'A' count: N` for the default counter |
//! | `/api/session` | POST | a new four-letter session code |
//! | `/api/session/{code}` | GET, POST | counter value; POST increments first |
//! | `/api/session/{code}/websocket` | GET | WebSocket upgrade, see [`websocket`](super::websocket) |
//!
//! Anything else is `404 Not found`. Failures inside a handler, panics
//! included, are answered with `500` and the diagnostic text as the body.

use super::{AppState, Transport, websocket};
use crate::actor::ActorError;
use crate::registry::session_key;
use anyhow::Result;
use async_trait::async_trait;
use axum::{
    Router,
    extract::{Path, Request, State, WebSocketUpgrade},
    http::{Method, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use futures::FutureExt;
use pacekeeper::{PacerError, SessionCode, session_code};
use std::any::Any;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Instant, SystemTime};
use thiserror::Error;

/// Errors surfaced by request handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found")]
    NotFound,
    #[error(transparent)]
    Actor(#[from] ActorError),
    #[error(transparent)]
    Pacer(#[from] PacerError),
    #[error("request handler panicked: {0}")]
    Panic(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Not found").into_response(),
            other => {
                tracing::error!("Request failed: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Internal server error: {other}"),
                )
                    .into_response()
            }
        }
    }
}

/// HTTP transport implementation
pub struct HttpTransport {
    addr: SocketAddr,
}

impl HttpTransport {
    pub fn new(host: &str, port: u16) -> Result<Self> {
        let addr = format!("{host}:{port}").parse()?;
        Ok(Self { addr })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn start(self, state: Arc<AppState>) -> Result<()> {
        let app = router(state);

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("HTTP server listening on {}", listener.local_addr()?);

        axum::serve(listener, app).await?;

        Ok(())
    }
}

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    with_boundary(routes(), state)
}

/// Wrap `routes` with the not-found fallback, metrics and panic capture
pub(crate) fn with_boundary(routes: Router<Arc<AppState>>, state: Arc<AppState>) -> Router {
    routes
        .fallback(|| async { ApiError::NotFound })
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            track_requests,
        ))
        .with_state(state)
}

fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(handle_index))
        .route("/health", get(|| async { "OK" }))
        .route("/metrics", get(handle_metrics))
        .route("/limiter/{key}", get(handle_limiter).post(handle_limiter))
        .route("/api", get(handle_api))
        .route("/api/session", post(handle_new_session))
        .route(
            "/api/session/{code}",
            get(handle_session_get).post(handle_session_increment),
        )
        .route("/api/session/{code}/websocket", get(handle_websocket))
}

async fn track_requests(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let response = match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => response,
        Err(panic) => ApiError::Panic(panic_message(panic.as_ref())).into_response(),
    };
    state
        .metrics
        .record_http(start.elapsed(), response.status().is_server_error());
    response
}

/// Text carried by a panic payload
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl AppState {
    /// Pass an actor result through, counting failures
    fn observe<T>(&self, result: Result<T, ActorError>) -> Result<T, ApiError> {
        result.map_err(|e| {
            self.metrics.record_actor_error(&e);
            ApiError::from(e)
        })
    }
}

async fn handle_index() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/html;charset=UTF-8")], "")
}

async fn handle_metrics(State(state): State<Arc<AppState>>) -> String {
    state
        .metrics
        .update_active_actors(state.actors.limiters.len(), state.actors.counters.len());
    state.metrics.export_prometheus()
}

async fn handle_limiter(
    State(state): State<Arc<AppState>>,
    method: Method,
    Path(key): Path<String>,
) -> Result<String, ApiError> {
    let mutating = method == Method::POST;
    let limiter = state.actors.limiters.get_or_spawn(&key);
    let admission = state.observe(limiter.admit(mutating).await)?;

    state.metrics.record_admission(mutating, admission.wait);
    Ok(admission.wait.as_millis().to_string())
}

async fn handle_api(State(state): State<Arc<AppState>>) -> Result<String, ApiError> {
    let counter = state.actors.counters.get_or_spawn(&state.counter_key);
    let count = state.observe(counter.get().await)?;
    Ok(format!("Counter '{}' count: {}", state.counter_key, count))
}

async fn handle_new_session() -> Result<String, ApiError> {
    let code = session_code(SystemTime::now())?;
    tracing::debug!("Issued session code {}", code);
    Ok(code.to_string())
}

fn parse_code(raw: &str) -> Result<SessionCode, ApiError> {
    SessionCode::parse(raw).map_err(|_| ApiError::NotFound)
}

async fn handle_session_get(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<String, ApiError> {
    let code = parse_code(&code)?;
    let counter = state.actors.counters.get_or_spawn(&session_key(code));
    let count = state.observe(counter.get().await)?;
    Ok(count.to_string())
}

async fn handle_session_increment(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<String, ApiError> {
    let code = parse_code(&code)?;
    let counter = state.actors.counters.get_or_spawn(&session_key(code));
    let count = state.observe(counter.increment(1).await)?;
    Ok(count.to_string())
}

async fn handle_websocket(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let code = parse_code(&code)?;
    Ok(ws.on_upgrade(move |socket| websocket::run_session(socket, state, code)))
}
