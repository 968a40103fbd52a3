//! Transport layer for the server
//!
//! This module exposes the actors to network clients. All transports implement
//! the [`Transport`] trait and share one [`AppState`]: the actor registries,
//! metrics, and the keys of the shared limiter and default counter.
//!
//! # Available Transports
//!
//! - [`http`]: plain-text REST endpoints plus WebSocket sessions ([`websocket`])

pub mod http;
pub mod websocket;


use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::metrics::Metrics;
use crate::registry::Actors;

/// State shared by every request handler
pub struct AppState {
    pub actors: Arc<Actors>,
    pub metrics: Arc<Metrics>,
    /// Limiter holding the budget shared by all sessions
    pub limiter_key: String,
    /// Counter served at `/api`
    pub counter_key: String,
}

impl AppState {
    pub fn new(
        actors: Arc<Actors>,
        metrics: Arc<Metrics>,
        limiter_key: impl Into<String>,
        counter_key: impl Into<String>,
    ) -> Self {
        Self {
            actors,
            metrics,
            limiter_key: limiter_key.into(),
            counter_key: counter_key.into(),
        }
    }
}

/// Common interface for all transport implementations
///
/// Each transport is responsible for:
/// - Accepting client connections
/// - Resolving request targets to actor handles
/// - Sending responses back to clients
#[async_trait]
pub trait Transport {
    /// Start the transport server
    ///
    /// The method runs indefinitely until an error occurs or the server shuts down.
    async fn start(self, state: Arc<AppState>) -> Result<()>;
}
