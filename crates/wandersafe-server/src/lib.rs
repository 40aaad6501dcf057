//! # wandersafe-server
//!
//! Axum HTTP + `WebSocket` gateway for live proximity updates.
//!
//! - HTTP endpoints: root, health check, Prometheus metrics, live sessions
//! - `WebSocket` gateway: connection table, heartbeat, inbound report dispatch
//! - Per-client nearby lists delivered through bounded outbound queues
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use errors::{Result, ServerError};
pub use server::{AppState, WanderSafeServer};
