//! Single-writer admission pacer
//!
//! This module provides the [`Pacer`] state machine. It keeps one deadline,
//! the earliest instant at which the next unit of work may be admitted, and
//! converts it into a wait hint for the caller.

use super::{PacerError, epoch_millis};
use std::time::{Duration, SystemTime};

/// Tuning parameters for a [`Pacer`]
///
/// - `unit_cost`: how far a consuming request pushes the deadline
/// - `grace_period`: backlog a caller may accumulate before being told to wait
///
/// The sustained throughput is one consuming request per `unit_cost`; the burst
/// allowance is `grace_period / unit_cost` requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacerConfig {
    /// Deadline advance per consuming request (whole milliseconds)
    pub unit_cost: Duration,
    /// Backlog tolerated before a non-zero wait is reported (whole milliseconds)
    pub grace_period: Duration,
}

impl Default for PacerConfig {
    fn default() -> Self {
        Self {
            unit_cost: Duration::from_millis(10),
            grace_period: Duration::from_millis(20_000),
        }
    }
}

impl PacerConfig {
    /// Check that the parameters describe a usable pacer
    ///
    /// # Errors
    ///
    /// Returns [`PacerError::InvalidConfig`] if `unit_cost` is below one
    /// millisecond, or if either duration is not a whole number of
    /// milliseconds (the pacer keeps time in milliseconds).
    pub fn validate(&self) -> Result<(), PacerError> {
        if self.unit_cost < Duration::from_millis(1) {
            return Err(PacerError::InvalidConfig(
                "unit cost must be at least 1ms".to_string(),
            ));
        }
        for (name, value) in [
            ("unit cost", self.unit_cost),
            ("grace period", self.grace_period),
        ] {
            if value.subsec_nanos() % 1_000_000 != 0 {
                return Err(PacerError::InvalidConfig(format!(
                    "{name} must be a whole number of milliseconds, got {value:?}"
                )));
            }
        }
        Ok(())
    }

    fn unit_cost_ms(&self) -> u64 {
        self.unit_cost.as_millis() as u64
    }

    fn grace_period_ms(&self) -> u64 {
        self.grace_period.as_millis() as u64
    }
}

/// Outcome of a single admission request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    /// How long the caller should wait before its next consuming request
    pub wait: Duration,
    /// The deadline after this request, in milliseconds since the Unix epoch
    pub next_allowed_ms: u64,
}

/// Admission pacer for one protected resource
///
/// # Example
///
/// ```
/// use pacekeeper::{Pacer, PacerConfig};
/// use std::time::{Duration, SystemTime};
///
/// let config = PacerConfig {
///     unit_cost: Duration::from_millis(10),
///     grace_period: Duration::from_millis(50),
/// };
/// let now = SystemTime::now();
/// let mut pacer = Pacer::new(config, now).unwrap();
///
/// // The first five consuming requests fit inside the grace period
/// for _ in 0..5 {
///     assert!(pacer.admit(true, now).unwrap().wait.is_zero());
/// }
///
/// // The sixth pushes the backlog 10ms past it
/// let admission = pacer.admit(true, now).unwrap();
/// assert_eq!(admission.wait, Duration::from_millis(10));
/// ```
#[derive(Debug, Clone)]
pub struct Pacer {
    next_allowed_ms: u64,
    config: PacerConfig,
}

impl Pacer {
    /// Create a pacer with zero backlog at `now`
    ///
    /// # Errors
    ///
    /// - [`PacerError::InvalidConfig`]: If `config` fails validation
    /// - [`PacerError::ClockBeforeEpoch`]: If `now` predates the Unix epoch
    pub fn new(config: PacerConfig, now: SystemTime) -> Result<Self, PacerError> {
        config.validate()?;
        Ok(Pacer {
            next_allowed_ms: epoch_millis(now)?,
            config,
        })
    }

    /// Decide how long the caller must wait before its next unit of work
    ///
    /// `mutating` marks a request that consumes capacity; peeks pass `false`
    /// and only observe the current backlog.
    ///
    /// # Errors
    ///
    /// Returns [`PacerError::ClockBeforeEpoch`] if `now` predates the Unix epoch.
    pub fn admit(&mut self, mutating: bool, now: SystemTime) -> Result<Admission, PacerError> {
        let now_ms = epoch_millis(now)?;

        // Idle time is not banked: a stale deadline snaps forward to now
        self.next_allowed_ms = self.next_allowed_ms.max(now_ms);

        if mutating {
            self.next_allowed_ms = self
                .next_allowed_ms
                .saturating_add(self.config.unit_cost_ms());
        }

        let wait_ms = self
            .next_allowed_ms
            .saturating_sub(now_ms)
            .saturating_sub(self.config.grace_period_ms());

        Ok(Admission {
            wait: Duration::from_millis(wait_ms),
            next_allowed_ms: self.next_allowed_ms,
        })
    }

    /// Outstanding backlog at `now`, zero once the deadline has passed
    pub fn backlog(&self, now: SystemTime) -> Result<Duration, PacerError> {
        let now_ms = epoch_millis(now)?;
        Ok(Duration::from_millis(
            self.next_allowed_ms.saturating_sub(now_ms),
        ))
    }

    /// The current deadline in milliseconds since the Unix epoch
    pub fn next_allowed_ms(&self) -> u64 {
        self.next_allowed_ms
    }

    /// The parameters this pacer was built with
    pub fn config(&self) -> &PacerConfig {
        &self.config
    }
}
