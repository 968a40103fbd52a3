//! WebSocket sessions
//!
//! A session is bound to one session counter. On connect the server sends the
//! counter's current value; afterwards every text frame from the client is a
//! request to increment it. Each connection gets its own
//! [`RateLimiterClient`] over the shared limiter, so a client that sends faster
//! than the shared budget allows gets error frames instead of increments.
//!
//! ```text
//! client                     server
//!   │ ── upgrade ───────────► │ counter.get()
//!   │ ◄──────── {"count":4} ─ │
//!   │ ── "inc" ─────────────► │ check_limit() ─► counter.increment(1)
//!   │ ◄──────── {"count":5} ─ │
//!   │ ── "inc" ─────────────► │ check_limit() = false
//!   │ ◄─── {"error":"..."} ── │
//! ```
//!
//! If the counter cannot be initialized, or the session handler panics, the
//! server sends a single error frame and closes with code 1011.

use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use futures::FutureExt;
use futures::future::BoxFuture;
use pacekeeper::SessionCode;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use super::AppState;
use super::http::panic_message;
use crate::registry::{Actors, session_key};
use crate::types::SessionFrame;

pub const SETUP_FAILURE_REASON: &str = "Uncaught exception during session setup";
pub const PANIC_REASON: &str = "Uncaught exception during session";
pub const RATE_LIMITED: &str = "Your IP is being rate-limited, please stop!";

/// Body of a session, run against an upgraded socket
pub(crate) type SessionFn =
    for<'a> fn(&'a mut WebSocket, &'a Arc<AppState>, SessionCode) -> BoxFuture<'a, ()>;

/// Serve one upgraded connection until either side closes it
pub async fn run_session(socket: WebSocket, state: Arc<AppState>, code: SessionCode) {
    run_guarded(socket, state, code, |socket, state, code| {
        serve(socket, state, code).boxed()
    })
    .await
}

/// Run `session`, turning a panic into an error frame and close code 1011
pub(crate) async fn run_guarded(
    mut socket: WebSocket,
    state: Arc<AppState>,
    code: SessionCode,
    session: SessionFn,
) {
    state.metrics.connection_opened();
    tracing::debug!("Session {} connected", code);

    let outcome = AssertUnwindSafe(session(&mut socket, &state, code))
        .catch_unwind()
        .await;
    if let Err(panic) = outcome {
        let message = panic_message(panic.as_ref());
        tracing::error!("Session {} panicked: {}", code, message);
        fail_session(
            &mut socket,
            format!("session handler panicked: {message}"),
            PANIC_REASON,
        )
        .await;
    }

    state.metrics.connection_closed();
    tracing::debug!("Session {} disconnected", code);
}

async fn serve(socket: &mut WebSocket, state: &Arc<AppState>, code: SessionCode) {
    let key = session_key(code);

    let count = match state.actors.counters.get_or_spawn(&key).get().await {
        Ok(count) => count,
        Err(e) => {
            state.metrics.record_actor_error(&e);
            tracing::error!("Session {} setup failed: {}", code, e);

            fail_session(socket, e.to_string(), SETUP_FAILURE_REASON).await;
            return;
        }
    };

    if send_frame(socket, SessionFrame::count(count)).await.is_err() {
        return;
    }

    let limiter = {
        let metrics = Arc::clone(&state.metrics);
        Actors::limiter_client(&state.actors, &state.limiter_key, move |e| {
            tracing::error!("Session {} lost its limiter: {}", code, e);
            metrics.record_limiter_client_failure();
        })
    };

    while let Some(msg) = socket.recv().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!("Session {} receive error: {}", code, e);
                break;
            }
        };

        match msg {
            Message::Text(_) => {
                let allowed = limiter.check_limit();
                state.metrics.record_session_message(!allowed);

                let frame = if allowed {
                    // Re-resolve so an evicted counter is replaced
                    let counter = state.actors.counters.get_or_spawn(&key);
                    match counter.increment(1).await {
                        Ok(count) => SessionFrame::count(count),
                        Err(e) => {
                            state.metrics.record_actor_error(&e);
                            SessionFrame::error(e.to_string())
                        }
                    }
                } else {
                    SessionFrame::error(RATE_LIMITED)
                };

                if send_frame(socket, frame).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            // Ping/pong is answered by axum; binary frames are ignored
            _ => {}
        }
    }
}

async fn send_frame(socket: &mut WebSocket, frame: SessionFrame) -> Result<(), axum::Error> {
    socket.send(Message::Text(frame.to_json().into())).await
}

/// Send one error frame, then close with 1011; send failures are ignored
async fn fail_session(socket: &mut WebSocket, error: String, reason: &'static str) {
    let _ = send_frame(socket, SessionFrame::error(error)).await;
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code: close_code::ERROR,
            reason: reason.into(),
        })))
        .await;
}
