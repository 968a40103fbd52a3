use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use super::gate::{GatedActor, GatedMessage, InitFailure, run_gated};
use super::{ActorError, ActorHandle};
use crate::store::{KvStore, StoreError};

/// Message types for the counter actor
pub enum CounterMessage {
    Get {
        response_tx: oneshot::Sender<Result<i64, ActorError>>,
    },
    Increment {
        delta: i64,
        response_tx: oneshot::Sender<Result<i64, ActorError>>,
    },
    Shutdown,
}

impl GatedMessage for CounterMessage {
    fn fail(self, error: ActorError) {
        match self {
            CounterMessage::Get { response_tx } | CounterMessage::Increment { response_tx, .. } => {
                let _ = response_tx.send(Err(error));
            }
            CounterMessage::Shutdown => {}
        }
    }

    fn is_shutdown(&self) -> bool {
        matches!(self, CounterMessage::Shutdown)
    }
}

/// Handle to communicate with a counter actor
#[derive(Clone)]
pub struct CounterHandle {
    key: Arc<str>,
    tx: mpsc::Sender<CounterMessage>,
    failure: InitFailure,
}

impl CounterHandle {
    /// Current value
    pub async fn get(&self) -> Result<i64, ActorError> {
        self.request(|response_tx| CounterMessage::Get { response_tx })
            .await
    }

    /// Add `delta`, persist, and return the new value
    pub async fn increment(&self, delta: i64) -> Result<i64, ActorError> {
        self.request(|response_tx| CounterMessage::Increment { delta, response_tx })
            .await
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    async fn request(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<i64, ActorError>>) -> CounterMessage,
    ) -> Result<i64, ActorError> {
        let (response_tx, response_rx) = oneshot::channel();

        self.tx
            .send(build(response_tx))
            .await
            .map_err(|_| {
                self.failure
                    .or_unavailable(|| format!("counter {} has shut down", self.key))
            })?;

        response_rx.await.map_err(|_| {
            self.failure
                .or_unavailable(|| format!("counter {} dropped the request", self.key))
        })?
    }
}

#[async_trait]
impl ActorHandle for CounterHandle {
    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn shutdown(&self) {
        let _ = self.tx.send(CounterMessage::Shutdown).await;
    }
}

/// The counter actor
pub struct CounterActor {
    storage_key: String,
    value: i64,
    store: Arc<dyn KvStore>,
}

impl CounterActor {
    /// Spawn a counter actor; its value is loaded from `store` before any request is served
    pub fn spawn(key: &str, store: Arc<dyn KvStore>, buffer_size: usize) -> CounterHandle {
        let (tx, rx) = mpsc::channel(buffer_size);
        let key: Arc<str> = Arc::from(key);
        let storage_key = format!("{key}/value");
        let failure = InitFailure::default();

        tokio::spawn(run_gated(
            format!("counter:{key}"),
            rx,
            failure.clone(),
            Self::load(storage_key, store),
        ));

        CounterHandle { key, tx, failure }
    }

    async fn load(storage_key: String, store: Arc<dyn KvStore>) -> Result<Self, ActorError> {
        // Absent means never written; any store failure is fatal to this instance
        let value = match store.get(&storage_key).await {
            Ok(None) => 0,
            Ok(Some(raw)) => raw.trim().parse::<i64>().map_err(|_| {
                ActorError::Initialization(
                    StoreError::Corrupt(format!("{storage_key} holds {raw:?}")).to_string(),
                )
            })?,
            Err(e) => return Err(ActorError::Initialization(e.to_string())),
        };

        Ok(CounterActor {
            storage_key,
            value,
            store,
        })
    }
}

#[async_trait]
impl GatedActor for CounterActor {
    type Message = CounterMessage;

    async fn handle(&mut self, msg: CounterMessage) {
        match msg {
            CounterMessage::Get { response_tx } => {
                let _ = response_tx.send(Ok(self.value));
            }
            CounterMessage::Increment { delta, response_tx } => {
                let next = self.value.saturating_add(delta);
                let result = match self.store.put(&self.storage_key, next.to_string()).await {
                    Ok(()) => {
                        self.value = next;
                        Ok(next)
                    }
                    Err(e) => {
                        tracing::warn!("Counter {} failed to persist: {}", self.storage_key, e);
                        Err(ActorError::from(e))
                    }
                };
                let _ = response_tx.send(result);
            }
            CounterMessage::Shutdown => {}
        }
    }
}
