//! Initialization gate shared by all actors
//!
//! An actor's mailbox is created before its state exists. [`run_gated`] awaits
//! the one-time setup future before taking the first message, so requests sent
//! in the meantime wait in the channel and are served against the fully
//! initialized state. No request ever observes a half-built actor.
//!
//! If setup fails, the failure is recorded in the actor's [`InitFailure`]
//! slot, the mailbox is closed and every request already queued is answered
//! with the failure. Handles consult the slot when their channel is gone, so
//! callers arriving later see the same error. The closed mailbox makes the
//! registry start a fresh instance (and a fresh setup attempt).

use async_trait::async_trait;
use std::future::Future;
use std::sync::{Arc, OnceLock};
use tokio::sync::mpsc;

use super::ActorError;

/// A message an actor mailbox can carry through the gate
pub trait GatedMessage: Send + 'static {
    /// Answer this message with a setup failure
    fn fail(self, error: ActorError);

    /// Whether this message asks the actor to stop
    fn is_shutdown(&self) -> bool;
}

/// Setup failure of one actor instance, shared between its task and handles
#[derive(Clone, Default)]
pub struct InitFailure(Arc<OnceLock<ActorError>>);

impl InitFailure {
    fn record(&self, error: ActorError) {
        let _ = self.0.set(error);
    }

    /// The recorded setup failure, if setup failed
    pub fn get(&self) -> Option<ActorError> {
        self.0.get().cloned()
    }

    /// Error for a caller whose request could not be delivered or answered
    ///
    /// A recorded setup failure wins over the generic `Unavailable(detail)`.
    pub fn or_unavailable(&self, detail: impl FnOnce() -> String) -> ActorError {
        self.get()
            .unwrap_or_else(|| ActorError::Unavailable(detail()))
    }
}

/// State that handles messages once setup has completed
#[async_trait]
pub trait GatedActor: Send + 'static {
    type Message: GatedMessage;

    async fn handle(&mut self, msg: Self::Message);
}

/// Run an actor: setup exactly once, then serve its mailbox in order
pub async fn run_gated<A, I>(
    name: String,
    mut rx: mpsc::Receiver<A::Message>,
    failure: InitFailure,
    init: I,
) where
    A: GatedActor,
    I: Future<Output = Result<A, ActorError>> + Send,
{
    let mut actor = match init.await {
        Ok(actor) => actor,
        Err(error) => {
            tracing::error!("Actor {} failed to initialize: {}", name, error);
            // Record before closing so no sender can see the closed channel first
            failure.record(error.clone());
            rx.close();

            let mut rejected = 0usize;
            while let Some(msg) = rx.recv().await {
                if !msg.is_shutdown() {
                    msg.fail(error.clone());
                    rejected += 1;
                }
            }
            tracing::debug!("Actor {} rejected {} queued requests", name, rejected);
            return;
        }
    };

    tracing::debug!("Actor {} initialized", name);

    while let Some(msg) = rx.recv().await {
        if msg.is_shutdown() {
            break;
        }
        actor.handle(msg).await;
    }

    tracing::info!("Actor {} shutting down", name);
}
