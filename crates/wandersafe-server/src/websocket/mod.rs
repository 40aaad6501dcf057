//! WebSocket connection management, heartbeat, frame dispatch, and fan-out.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `connection` | Per-client outbound queue, liveness flag, close token |
//! | `broadcast` | Connection table; delivers nearby lists as the hub's sink |
//! | `handler` | Decodes inbound frames and forwards reports to the hub |
//! | `heartbeat` | Drops clients that stop answering pings |
//! | `session` | One client's lifecycle from upgrade to disconnect |

pub mod broadcast;
pub mod connection;
pub mod handler;
pub mod heartbeat;
pub mod session;
