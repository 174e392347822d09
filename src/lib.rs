//! MPD web relay - browser access to a Music Player Daemon over WebSocket.
//!
//! This library serves a bundled web UI and bridges each WebSocket opened by
//! that UI to a fresh TCP connection to MPD. Bytes are relayed opaquely in
//! both directions; the relay never parses MPD commands or responses.
//!
//! # Architecture
//!
//! - **Server**: binds the listen address, optionally terminates TLS, serves an axum router
//! - **Session acceptor**: dials MPD for each upgraded WebSocket
//! - **Relay session**: two direction workers, torn down together as soon as
//!   either one ends
//!
//! Key design principles:
//!
//! - One daemon connection per client, nothing shared between sessions
//! - Daemon output keeps its read boundaries (one read, one message)
//! - Session failures never reach the server; only startup errors are fatal
//!
//! # Quick Start
//!
//! ```no_run
//! use mpd_web_relay::{Result, Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ServerConfig::new()
//!         .with_listen_addr("127.0.0.1:8080")
//!         .with_upstream_addr("127.0.0.1:6600");
//!
//!     Server::bind(config).await?.serve().await
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`acceptor`] | Per-client session creation |
//! | [`cli`] | Command-line interface |
//! | [`config`] | Server and relay configuration |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`http`] | Request routing, WebSocket upgrade, bundled assets |
//! | [`identifiers`] | Session IDs |
//! | [`relay`] | Relay session and direction workers |
//! | [`transport`] | Listener and TLS |

// ============================================================================
// Modules
// ============================================================================

/// Session acceptor.
///
/// Dials the daemon and runs one [`RelaySession`] per client.
pub mod acceptor;

/// Command-line interface.
pub mod cli;

/// Server and relay configuration.
pub mod config;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// HTTP routing, WebSocket upgrade and bundled assets.
pub mod http;

/// Type-safe identifiers.
pub mod identifiers;

/// Bidirectional relay.
///
/// - [`RelaySession`] - One client and one daemon connection
/// - [`FrameKind`] - Opcode of messages sent to the client
pub mod relay;

/// Listener and TLS termination.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

pub use acceptor::SessionAcceptor;
pub use cli::Cli;
pub use config::{RelayConfig, ServerConfig, TlsFiles};
pub use error::{Error, Result};
pub use identifiers::SessionId;
pub use relay::{
    ClientMessage, Direction, DirectionStats, Ending, FrameKind, Inbound, RelaySession, SessionStats,
};
pub use transport::{RelayListener, Server};
