//! Core components of the pacekeeper library
//!
//! This module contains the fundamental building blocks:
//! - [`pacer`]: The single-writer admission pacer
//! - [`session_code`]: Time-of-day derived routing labels

pub mod pacer;
pub mod session_code;
#[cfg(test)]
mod tests;

pub use pacer::{Admission, Pacer, PacerConfig};
pub use session_code::{SessionCode, session_code};

use std::error::Error;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Errors that can occur while pacing admissions or deriving session codes
///
/// # Variants
///
/// - [`InvalidConfig`](PacerError::InvalidConfig): Pacer parameters are unusable (e.g., zero unit cost)
/// - [`ClockBeforeEpoch`](PacerError::ClockBeforeEpoch): A timestamp predates the Unix epoch
/// - [`InvalidSessionCode`](PacerError::InvalidSessionCode): A string is not a 4-letter code
///
/// # Example
///
/// ```
/// use pacekeeper::{Pacer, PacerConfig, PacerError};
/// use std::time::{Duration, SystemTime};
///
/// let config = PacerConfig {
///     unit_cost: Duration::ZERO,
///     grace_period: Duration::from_secs(20),
/// };
///
/// match Pacer::new(config, SystemTime::now()) {
///     Err(PacerError::InvalidConfig(msg)) => println!("Error: {}", msg),
///     _ => {}
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacerError {
    /// Pacer parameters are invalid
    InvalidConfig(String),
    /// The supplied time lies before 1970-01-01T00:00:00Z
    ClockBeforeEpoch,
    /// The supplied string is not a valid session code
    InvalidSessionCode(String),
}

impl fmt::Display for PacerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacerError::InvalidConfig(msg) => write!(f, "invalid pacer configuration: {msg}"),
            PacerError::ClockBeforeEpoch => write!(f, "timestamp is before the unix epoch"),
            PacerError::InvalidSessionCode(code) => write!(f, "invalid session code: {code:?}"),
        }
    }
}

impl Error for PacerError {}

/// Milliseconds since the Unix epoch
pub(crate) fn epoch_millis(at: SystemTime) -> Result<u64, PacerError> {
    at.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .map_err(|_| PacerError::ClockBeforeEpoch)
}
