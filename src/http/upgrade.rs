//! WebSocket upgrade on `/ws`.
//!
//! axum validates the RFC 6455 handshake and answers `101 Switching
//! Protocols`. Once the connection is upgraded the socket is handed to the
//! [`SessionAcceptor`] on a task of its own, so the session outlives the
//! HTTP request handler.

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, State};
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use crate::acceptor::SessionAcceptor;
use crate::error::Error;

// ============================================================================
// Constants
// ============================================================================

/// Path that upgrades to the relay.
pub const WS_PATH: &str = "/ws";

// ============================================================================
// Handler
// ============================================================================

/// Answers a WebSocket handshake and starts the relay once upgraded.
///
/// Invalid handshakes get axum's rejection (`400 Bad Request` for a plain
/// GET) and never reach the acceptor.
pub async fn ws_handler(
    State(acceptor): State<SessionAcceptor>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let upgrade = match upgrade {
        Ok(upgrade) => upgrade,
        Err(rejection) => {
            warn!(%peer, reason = %rejection.body_text(), "Rejected invalid WebSocket handshake");
            return rejection.into_response();
        }
    };

    upgrade
        .on_failed_upgrade(move |e: axum::Error| {
            let err = Error::handshake(e.to_string());
            debug!(%peer, error = %err, "WebSocket upgrade did not complete");
        })
        .on_upgrade(move |socket| async move {
            debug!(%peer, "WebSocket connection established");

            // Dial failures are already logged by the acceptor.
            if let Err(e) = acceptor.accept(socket).await {
                debug!(%peer, error = %e, "Client session refused");
            }
        })
}

// ============================================================================
// Tests
// ============================================================================
