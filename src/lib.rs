//! # acbank
//!
//! Community solution bank: members submit solutions, earn points, and
//! follow each other's activity live over WebSocket.
//!
//! Every request path touches a small set of shared in-process resources:
//!
//! - a bounded pool of store connections with health checks
//!   ([`store::ConnectionPool`]),
//! - a single-active-session authority ([`domain::SessionAuthority`]),
//! - a sliding-window abuse limiter ([`domain::RateLimiter`]),
//! - a fan-out bus for live notifications ([`domain::EventBus`]).
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)  ── AuthSession ── SessionAuthority
//!     ├── WS Handler (ws/)      ── Subscriber
//!     │
//!     ├── SolutionService, AuthLimits (service/) ── RateLimiter
//!     ├── EventBus (domain/)
//!     │
//!     ├── Persistence (persistence/)
//!     └── ConnectionPool ── PostgreSQL (store/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
pub mod store;
pub mod ws;
