//! Single-writer actors
//!
//! Every actor is one tokio task owning its state, reached through a cloneable
//! handle wrapping a bounded `mpsc` sender. Requests carry a `oneshot` for the
//! reply. Operations on one actor are strictly serialized; actors for
//! different keys share nothing.
//!
//! - [`limiter`]: owns a [`Pacer`](pacekeeper::Pacer) deadline
//! - [`counter`]: owns one integer loaded from the [`KvStore`](crate::store::KvStore)
//! - [`gate`]: the initialization gate both are started through

pub mod counter;
pub mod gate;
pub mod limiter;

#[cfg(test)]
mod tests;

pub use counter::{CounterActor, CounterHandle};
pub use limiter::{LimiterActor, LimiterHandle};

use async_trait::async_trait;
use pacekeeper::PacerError;
use thiserror::Error;

use crate::store::StoreError;

/// Errors returned through actor handles
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActorError {
    /// The actor has shut down or dropped the request
    #[error("actor unavailable: {0}")]
    Unavailable(String),
    /// The actor's one-time setup failed; every queued request sees this
    #[error("actor initialization failed: {0}")]
    Initialization(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Pacer(#[from] PacerError),
}

/// Common surface of actor handles, used by the registry
#[async_trait]
pub trait ActorHandle: Clone + Send + Sync + 'static {
    /// Whether the actor behind this handle has stopped
    fn is_closed(&self) -> bool;

    /// Ask the actor to stop after the requests already queued
    async fn shutdown(&self);

    /// Whether stopping this actor now loses no state
    fn can_evict(&self) -> bool {
        true
    }
}
