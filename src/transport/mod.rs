//! Network transport layer.
//!
//! This module owns the listening socket and TLS termination. Everything
//! above the byte stream (HTTP routing, the WebSocket upgrade, relaying) is
//! delegated to [`crate::http`] and [`crate::relay`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Browser        │      HTTP / WebSocket        │  Server         │
//! │                 │◄────────────────────────────►│  TcpListener    │
//! │  web UI + /ws   │      listen-addr (TLS opt.)  │  → axum Router  │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `listener` | Accept loop with backoff and concurrent TLS handshakes |
//! | `server` | Binding and serving the router |
//! | `tls` | PEM loading and TLS acceptor construction |

// ============================================================================
// Submodules
// ============================================================================

/// Accept loop and TLS termination.
pub mod listener;

/// HTTP server binding and serving.
pub mod server;

/// TLS certificate loading.
pub mod tls;

// ============================================================================
// Re-exports
// ============================================================================

pub use listener::RelayListener;
pub use server::Server;
