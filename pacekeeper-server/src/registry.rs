//! Key to actor resolution
//!
//! An [`ActorRegistry`] hands out the handle for a key, spawning the actor on
//! first use. A cached handle whose actor has stopped (evicted, or failed its
//! initialization) is replaced transparently, which is what gives callers a
//! "fresh" reference after their old one went stale.
//!
//! Idle actors are stopped by [`ActorRegistry::sweep_idle`], normally driven
//! by [`Actors::spawn_sweeper`]. An actor is idle once its key has not been
//! resolved for the configured time and its handle reports
//! [`can_evict`](ActorHandle::can_evict); a limiter still carrying a backlog
//! is kept until the backlog drains.
//!
//! Keys are plain strings chosen by the caller:
//! - the shared limiter budget lives under the configured limiter key
//! - independent budgets use one limiter key per protected sub-resource
//! - session counters live under `session:<CODE>`

use ahash::AHashMap;
use pacekeeper::{PacerConfig, SessionCode};
use pacekeeper_client::{ClientError, LimiterStub, RateLimiterClient};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::actor::{ActorHandle, CounterActor, CounterHandle, LimiterActor, LimiterHandle};
use crate::store::KvStore;

type SpawnFn<H> = Box<dyn Fn(&str) -> H + Send + Sync>;

struct Entry<H> {
    handle: H,
    last_used: Instant,
}

/// Lazily populated map of live actors
pub struct ActorRegistry<H: ActorHandle> {
    actors: Mutex<AHashMap<String, Entry<H>>>,
    spawn: SpawnFn<H>,
}

impl<H: ActorHandle> ActorRegistry<H> {
    pub fn new(spawn: impl Fn(&str) -> H + Send + Sync + 'static) -> Self {
        Self {
            actors: Mutex::new(AHashMap::new()),
            spawn: Box::new(spawn),
        }
    }

    /// Handle for `key`, spawning a new actor if none is running
    ///
    /// Must be called from within a Tokio runtime.
    pub fn get_or_spawn(&self, key: &str) -> H {
        let mut actors = self.actors.lock();
        let now = Instant::now();

        if let Some(entry) = actors.get_mut(key) {
            if !entry.handle.is_closed() {
                entry.last_used = now;
                return entry.handle.clone();
            }
            tracing::debug!("Actor {} has stopped, spawning a replacement", key);
        }

        let handle = (self.spawn)(key);
        actors.insert(
            key.to_string(),
            Entry {
                handle: handle.clone(),
                last_used: now,
            },
        );
        handle
    }

    /// Stop the actor for `key` and forget it
    ///
    /// Outstanding handles go stale; their next call fails.
    pub async fn evict(&self, key: &str) -> bool {
        let entry = self.actors.lock().remove(key);
        match entry {
            Some(Entry { handle, .. }) => {
                handle.shutdown().await;
                tracing::info!("Evicted actor {}", key);
                true
            }
            None => false,
        }
    }

    /// Number of live actors
    pub fn len(&self) -> usize {
        let mut actors = self.actors.lock();
        actors.retain(|_, entry| !entry.handle.is_closed());
        actors.len()
    }

    /// Stop every actor not resolved within `max_idle` that can be stopped
    /// without losing state, and forget stopped ones
    ///
    /// Returns the number of running actors stopped.
    pub async fn sweep_idle(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let mut idle = Vec::new();

        self.actors.lock().retain(|key, entry| {
            if entry.handle.is_closed() {
                return false;
            }
            let expired = now.duration_since(entry.last_used) >= max_idle;
            if expired && entry.handle.can_evict() {
                idle.push((key.clone(), entry.handle.clone()));
                return false;
            }
            true
        });

        for (key, handle) in &idle {
            handle.shutdown().await;
            tracing::debug!("Stopped idle actor {}", key);
        }
        idle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Every actor family the server hosts
pub struct Actors {
    pub limiters: ActorRegistry<LimiterHandle>,
    pub counters: ActorRegistry<CounterHandle>,
}

impl Actors {
    pub fn new(pacer: PacerConfig, store: Arc<dyn KvStore>, buffer_size: usize) -> Self {
        Self {
            limiters: ActorRegistry::new(move |key| LimiterActor::spawn(key, pacer, buffer_size)),
            counters: ActorRegistry::new(move |key| {
                CounterActor::spawn(key, Arc::clone(&store), buffer_size)
            }),
        }
    }

    /// Sweep both registries every `every`, stopping actors idle for `max_idle`
    ///
    /// The task ends once the registries are dropped. Panics if `every` is zero.
    pub fn spawn_sweeper(actors: &Arc<Self>, every: Duration, max_idle: Duration) -> JoinHandle<()> {
        let actors = Arc::downgrade(actors);
        tokio::spawn(async move {
            let mut ticks = tokio::time::interval(every);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticks.tick().await;

            loop {
                ticks.tick().await;
                let Some(actors) = actors.upgrade() else {
                    break;
                };

                let limiters = actors.limiters.sweep_idle(max_idle).await;
                let counters = actors.counters.sweep_idle(max_idle).await;
                if limiters + counters > 0 {
                    tracing::debug!(
                        "Swept {} idle limiters and {} idle counters",
                        limiters,
                        counters
                    );
                }
            }
        })
    }

    /// A coalescing client over the limiter for `key`
    ///
    /// The client re-resolves the key through this registry whenever its
    /// current handle fails.
    pub fn limiter_client(
        actors: &Arc<Self>,
        key: &str,
        report_error: impl Fn(ClientError) + Send + Sync + 'static,
    ) -> RateLimiterClient {
        let actors = Arc::clone(actors);
        let key = key.to_string();
        RateLimiterClient::new(
            move || Arc::new(actors.limiters.get_or_spawn(&key)) as Arc<dyn LimiterStub>,
            report_error,
        )
    }
}

/// Registry key for a session's counter
pub fn session_key(code: SessionCode) -> String {
    format!("session:{code}")
}
