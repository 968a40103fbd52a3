//! # Pacekeeper
//!
//! Admission pacing for a shared, globally rate-limited resource.
//!
//! ## Overview
//!
//! A [`Pacer`] owns a single scheduling deadline, `next_allowed_ms`. Every
//! admission request first snaps the deadline forward to "now" (idle time is
//! never banked), then consuming requests push it further by a fixed
//! `unit_cost`. The caller is told how long to wait before its next unit of
//! work: the part of the backlog that exceeds the `grace_period`.
//!
//! - **Burst allowance**: up to `grace_period` worth of backlog is free
//! - **Advisory waits**: the pacer never rejects, it returns a wait hint
//! - **Monotonic**: `next_allowed_ms` only ever moves forward
//! - **O(1) state**: one integer per protected resource
//!
//! ## Quick Start
//!
//! ```
//! use pacekeeper::{Pacer, PacerConfig};
//! use std::time::SystemTime;
//!
//! let now = SystemTime::now();
//! let mut pacer = Pacer::new(PacerConfig::default(), now).unwrap();
//!
//! // A consuming (mutating) request
//! let admission = pacer.admit(true, now).unwrap();
//! assert!(admission.wait.is_zero());
//! ```
//!
//! ## Session Codes
//!
//! Session-scoped actors are addressed by a short, human-typable code derived
//! from the wall-clock time of day:
//!
//! ```
//! use pacekeeper::session_code;
//! use std::time::{Duration, UNIX_EPOCH};
//!
//! let code = session_code(UNIX_EPOCH + Duration::from_secs(12 * 3600)).unwrap();
//! assert_eq!(code.as_str(), "NAAA");
//! ```
//!
//! Codes are labels, not identifiers: two codes issued within a fraction of a
//! second of each other collide, and every code repeats daily.
//!
//! ## Thread Safety
//!
//! The pacer is a plain state machine and is not thread-safe. Correctness of
//! the deadline arithmetic depends on a single writer: run it inside an actor
//! or wrap it in a mutex.

pub mod core;

pub use core::{Admission, Pacer, PacerConfig, PacerError, SessionCode, session_code};
