//! # Pacekeeper Server
//!
//! Routes HTTP and WebSocket traffic to per-key single-writer actors, and
//! paces access to a shared, globally rate-limited resource.
//!
//! ## Purpose
//!
//! Many clients edit small pieces of shared state (session counters) while all
//! of them draw on one global budget. The server gives every key exactly one
//! actor, so updates to a key are strictly serialized, and puts one limiter
//! actor in front of the global budget:
//!
//! - **Counter actors** own one integer each, loaded from the durable store
//!   before their first request and written back on every increment
//! - **Limiter actors** own a pacing deadline and answer "how long must I
//!   wait?" for each consuming request
//! - **Sessions** gate every client message through a per-connection
//!   [`RateLimiterClient`](pacekeeper_client::RateLimiterClient)
//!
//! ## Quick Start
//!
//! ```bash
//! # Show all available options
//! pacekeeper --help
//!
//! # Defaults: 127.0.0.1:8080, in-memory store, 10 ms per request, 20 s burst
//! pacekeeper
//!
//! # Persist counters across restarts
//! pacekeeper --store file --store-path /var/lib/pacekeeper/data.json
//!
//! # List all available environment variables
//! pacekeeper --list-env-vars
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Create a session and bump its counter
//! code=$(curl -s -X POST http://localhost:8080/api/session)
//! curl -X POST http://localhost:8080/api/session/$code
//!
//! # Ask the shared limiter for admission
//! curl -X POST http://localhost:8080/limiter/A
//! ```
//!
//! ## Architecture
//!
//! ```text
//!   HTTP / WebSocket
//!          │
//!    ┌─────▼─────┐
//!    │  Router   │  key ─► handle, spawning on first use
//!    └─────┬─────┘
//!          │
//!    ┌─────┴───────────────┐
//!    │                     │
//! ┌──▼──────┐         ┌────▼────┐
//! │ Limiter │  ...    │ Counter │ ...   one actor per key
//! └─────────┘         └────┬────┘
//!                          │
//!                    ┌─────▼─────┐
//!                    │  KvStore  │
//!                    └───────────┘
//! ```

pub mod actor;
pub mod config;
pub mod metrics;
pub mod registry;
pub mod store;
pub mod transport;
pub mod types;
