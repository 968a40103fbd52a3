//! Coalescing wrapper around a limiter actor
//!
//! [`RateLimiterClient::check_limit`] is a cheap, non-suspending hint. The
//! first call starts a *wait cycle* in the background: one consuming
//! admission call to the actor, followed by a local sleep for the wait the
//! actor reported. Until that cycle finishes every further call returns
//! `false` without contacting the actor.
//!
//! ```text
//! check_limit() ──► busy? ──yes──► false
//!                     │
//!                     no ──► busy = true ──► spawn cycle ──► true
//!
//! cycle: admit(true) ──err──► refresh stub ──► admit(true) ──err──► report, stay busy
//!             │                                    │
//!             ok ◄─────────────────────────────────┘
//!             │
//!        sleep(wait) ──► busy = false
//! ```
//!
//! A cycle that fails twice in a row leaves the client busy for good. The
//! client fails closed: a caller that cannot reach its limiter stops doing
//! limited work instead of running unmetered.

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::error::{ClientError, Result};
use crate::stub::LimiterStub;

type StubFactory = Box<dyn Fn() -> Arc<dyn LimiterStub> + Send + Sync>;
type ErrorSink = Box<dyn Fn(ClientError) + Send + Sync>;

/// Per-caller admission wrapper
///
/// Create one per logical caller (e.g. per connection). The stub it holds is
/// never shared with other clients, so the type is deliberately not `Clone`.
///
/// # Example
///
/// ```ignore
/// let stub = HttpLimiterStub::builder("http://127.0.0.1:8080").key("A").build()?;
/// let client = RateLimiterClient::new(stub.factory(), |err| {
///     tracing::error!("limiter unreachable: {}", err);
/// });
///
/// if client.check_limit() {
///     do_expensive_work().await;
/// }
/// ```
pub struct RateLimiterClient {
    inner: Arc<Inner>,
}

struct Inner {
    new_stub: StubFactory,
    report_error: ErrorSink,
    limiter: Mutex<Arc<dyn LimiterStub>>,
    busy: AtomicBool,
}

impl RateLimiterClient {
    /// Create a client, acquiring its first stub from `new_stub`
    ///
    /// `report_error` receives failures of background wait cycles; callers of
    /// [`check_limit`](Self::check_limit) have already returned by then.
    pub fn new<F, R>(new_stub: F, report_error: R) -> Self
    where
        F: Fn() -> Arc<dyn LimiterStub> + Send + Sync + 'static,
        R: Fn(ClientError) + Send + Sync + 'static,
    {
        let limiter = new_stub();
        Self {
            inner: Arc::new(Inner {
                new_stub: Box::new(new_stub),
                report_error: Box::new(report_error),
                limiter: Mutex::new(limiter),
                busy: AtomicBool::new(false),
            }),
        }
    }

    /// Start a wait cycle unless one is already running
    ///
    /// Returns `false` if this client is currently limited; the caller should
    /// skip the protected operation. Returns `true` if a new cycle was
    /// started. Never suspends.
    ///
    /// The cycle runs on the current Tokio runtime. Outside a runtime the
    /// call returns `false` and leaves the client untouched.
    pub fn check_limit(&self) -> bool {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::warn!("check_limit called outside a Tokio runtime: {}", e);
                return false;
            }
        };

        if self.inner.busy.swap(true, Ordering::AcqRel) {
            return false;
        }

        let inner = Arc::clone(&self.inner);
        runtime.spawn(inner.run_cycle());
        true
    }

    /// Whether a wait cycle currently owns this client
    pub fn is_busy(&self) -> bool {
        self.inner.busy.load(Ordering::Acquire)
    }
}

impl Inner {
    async fn run_cycle(self: Arc<Self>) {
        let wait = match self.admit_with_refresh().await {
            Ok(wait) => wait,
            Err(e) => {
                tracing::warn!("Limiter unreachable after retry, client stays limited: {}", e);
                (self.report_error)(e);
                return;
            }
        };

        if !wait.is_zero() {
            tracing::debug!("Limiter requested a wait of {:?}", wait);
        }
        tokio::time::sleep(wait).await;

        self.busy.store(false, Ordering::Release);
    }

    async fn admit_with_refresh(&self) -> Result<Duration> {
        let limiter = Arc::clone(&*self.limiter.lock());

        match limiter.admit(true).await {
            Ok(wait) => Ok(wait),
            Err(e) => {
                tracing::debug!("Limiter call failed, refreshing stub: {}", e);
                let fresh = (self.new_stub)();
                *self.limiter.lock() = Arc::clone(&fresh);
                fresh.admit(true).await
            }
        }
    }
}
