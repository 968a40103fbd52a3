//! Client-side access to pacekeeper limiter actors
//!
//! This crate provides [`RateLimiterClient`], a per-caller wrapper that
//! multiplexes many concurrent local callers onto one outstanding admission
//! call, and the [`LimiterStub`] seam it talks through. [`HttpLimiterStub`]
//! reaches a limiter actor hosted by `pacekeeper-server`.

pub mod error;
pub mod limiter_client;
pub mod stub;

pub use error::{ClientError, Result};
pub use limiter_client::RateLimiterClient;
pub use stub::{HttpLimiterStub, HttpStubBuilder, LimiterStub};
