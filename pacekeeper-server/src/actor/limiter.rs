use async_trait::async_trait;
use pacekeeper::{Admission, Pacer, PacerConfig};
use pacekeeper_client::{ClientError, LimiterStub};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, oneshot};

use super::gate::{GatedActor, GatedMessage, InitFailure, run_gated};
use super::{ActorError, ActorHandle};

/// Source of "now" for a limiter actor
pub type Clock = Arc<dyn Fn() -> SystemTime + Send + Sync>;

/// Message types for the limiter actor
pub enum LimiterMessage {
    Admit {
        mutating: bool,
        response_tx: oneshot::Sender<Result<Admission, ActorError>>,
    },
    Shutdown,
}

impl GatedMessage for LimiterMessage {
    fn fail(self, error: ActorError) {
        if let LimiterMessage::Admit { response_tx, .. } = self {
            let _ = response_tx.send(Err(error));
        }
    }

    fn is_shutdown(&self) -> bool {
        matches!(self, LimiterMessage::Shutdown)
    }
}

/// Handle to communicate with a limiter actor
#[derive(Clone)]
pub struct LimiterHandle {
    key: Arc<str>,
    tx: mpsc::Sender<LimiterMessage>,
    failure: InitFailure,
    /// Last deadline published by the actor (epoch milliseconds)
    deadline: Arc<AtomicU64>,
    clock: Clock,
}

impl LimiterHandle {
    /// Ask for admission of one unit of work (`mutating`) or peek the backlog
    pub async fn admit(&self, mutating: bool) -> Result<Admission, ActorError> {
        let (response_tx, response_rx) = oneshot::channel();

        self.tx
            .send(LimiterMessage::Admit {
                mutating,
                response_tx,
            })
            .await
            .map_err(|_| {
                self.failure
                    .or_unavailable(|| format!("limiter {} has shut down", self.key))
            })?;

        response_rx.await.map_err(|_| {
            self.failure
                .or_unavailable(|| format!("limiter {} dropped the request", self.key))
        })?
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

#[async_trait]
impl ActorHandle for LimiterHandle {
    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn shutdown(&self) {
        let _ = self.tx.send(LimiterMessage::Shutdown).await;
    }

    /// Only once the backlog has drained; a fresh limiter would forget it
    fn can_evict(&self) -> bool {
        let now_ms = (self.clock)()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        self.deadline.load(Ordering::Acquire) <= now_ms
    }
}

/// In-process stub: lets a [`RateLimiterClient`](pacekeeper_client::RateLimiterClient)
/// talk to a limiter actor without going over the network
#[async_trait]
impl LimiterStub for LimiterHandle {
    async fn admit(&self, mutating: bool) -> pacekeeper_client::Result<Duration> {
        LimiterHandle::admit(self, mutating)
            .await
            .map(|admission| admission.wait)
            .map_err(|e| ClientError::Unavailable(e.to_string()))
    }
}

/// The limiter actor
pub struct LimiterActor {
    key: Arc<str>,
    pacer: Pacer,
    clock: Clock,
    deadline: Arc<AtomicU64>,
}

impl LimiterActor {
    /// Spawn a limiter actor reading the system clock
    pub fn spawn(key: &str, config: PacerConfig, buffer_size: usize) -> LimiterHandle {
        Self::spawn_with_clock(key, config, buffer_size, Arc::new(SystemTime::now))
    }

    /// Spawn a limiter actor reading time from `clock`
    pub fn spawn_with_clock(
        key: &str,
        config: PacerConfig,
        buffer_size: usize,
        clock: Clock,
    ) -> LimiterHandle {
        let (tx, rx) = mpsc::channel(buffer_size);
        let key: Arc<str> = Arc::from(key);
        let failure = InitFailure::default();
        let deadline = Arc::new(AtomicU64::new(0));

        let init = {
            let key = Arc::clone(&key);
            let clock = Arc::clone(&clock);
            let deadline = Arc::clone(&deadline);
            async move {
                let pacer = Pacer::new(config, clock())
                    .map_err(|e| ActorError::Initialization(e.to_string()))?;
                Ok::<_, ActorError>(LimiterActor {
                    key,
                    pacer,
                    clock,
                    deadline,
                })
            }
        };
        tokio::spawn(run_gated(
            format!("limiter:{key}"),
            rx,
            failure.clone(),
            init,
        ));

        LimiterHandle {
            key,
            tx,
            failure,
            deadline,
            clock,
        }
    }
}

#[async_trait]
impl GatedActor for LimiterActor {
    type Message = LimiterMessage;

    async fn handle(&mut self, msg: LimiterMessage) {
        if let LimiterMessage::Admit {
            mutating,
            response_tx,
        } = msg
        {
            let result = self
                .pacer
                .admit(mutating, (self.clock)())
                .map_err(ActorError::from);

            if let Ok(admission) = &result {
                self.deadline
                    .store(admission.next_allowed_ms, Ordering::Release);
                if !admission.wait.is_zero() {
                    tracing::debug!(
                        "Limiter {} over grace period, wait {:?}",
                        self.key,
                        admission.wait
                    );
                }
            }

            // Ignore send errors - receiver may have timed out
            let _ = response_tx.send(result);
        }
    }
}
