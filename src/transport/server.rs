//! HTTP server.
//!
//! Owns the listener and hands it to `axum::serve`. Every accepted
//! connection is served on its own task: optional TLS handshake, then HTTP
//! with upgrades enabled so `/ws` can become a relay session.
//!
//! # Connection Flow
//!
//! 1. `Server::bind` - Load TLS material, bind the listener
//! 2. `Server::serve` - Accept connections until shutdown
//! 3. Per connection: TLS handshake (if enabled), then HTTP routing
//! 4. `/ws` requests hand the upgraded socket to the session acceptor

// ============================================================================
// Imports
// ============================================================================

use std::future::{Future, pending};
use std::net::SocketAddr;

use axum::serve::ListenerExt;
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::acceptor::SessionAcceptor;
use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::http;

use super::listener::RelayListener;
use super::tls;

// ============================================================================
// Server
// ============================================================================

/// A bound HTTP server that relays `/ws` to the daemon.
///
/// # Example
///
/// ```ignore
/// use mpd_web_relay::{Server, ServerConfig};
///
/// let server = Server::bind(ServerConfig::new()).await?;
/// println!("Listening on {}", server.local_addr());
/// server.serve().await?;
/// ```
pub struct Server {
    /// Listener for incoming connections, TLS-terminating if configured.
    listener: RelayListener,
    /// Address the listener is bound to.
    local_addr: SocketAddr,
    /// Session factory shared by all connections.
    acceptor: SessionAcceptor,
}

impl Server {
    /// Validates the configuration, loads TLS material and binds the listener.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the configuration is invalid
    /// - [`Error::Tls`] if the certificate or key cannot be loaded
    /// - [`Error::Bind`] if the listen address cannot be bound
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        config.validate()?;

        let tls = config.tls.as_ref().map(tls::load_acceptor).transpose()?;

        let listener = TcpListener::bind(config.listen_addr.as_str())
            .await
            .map_err(|e| Error::bind(config.listen_addr.as_str(), e))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| Error::bind(config.listen_addr.as_str(), e))?;

        debug!(%local_addr, tls = tls.is_some(), "HTTP server bound");

        Ok(Self {
            listener: RelayListener::new(listener, tls),
            local_addr,
            acceptor: SessionAcceptor::new(config.relay),
        })
    }

    /// Returns the bound address.
    #[inline]
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns `true` if connections are TLS-terminated.
    #[inline]
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        self.listener.is_tls()
    }

    /// Returns the WebSocket URL clients should connect to.
    #[must_use]
    pub fn ws_url(&self) -> String {
        let scheme = if self.is_tls() { "wss" } else { "ws" };
        format!("{scheme}://{}{}", self.local_addr, http::WS_PATH)
    }

    /// Serves until the process ends.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the HTTP server stops unexpectedly. Accept
    /// failures are logged and retried with backoff.
    pub async fn serve(self) -> Result<()> {
        self.serve_with_shutdown(pending()).await
    }

    /// Serves until `shutdown` resolves.
    ///
    /// Stops accepting new connections and lets in-flight HTTP requests
    /// finish. Upgraded relay sessions run on their own tasks and are not
    /// waited for.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the HTTP server stops unexpectedly. Accept
    /// failures are logged and retried with backoff.
    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!(
            addr = %self.local_addr,
            tls = self.is_tls(),
            upstream = %self.acceptor.config().upstream_addr,
            "Listening"
        );

        let app = http::router(self.acceptor);
        axum::serve(
            self.listener.tap_io(|_| {}),
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("Shutdown requested, no longer accepting connections");
        })
        .await?;

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    fn local_config() -> ServerConfig {
        ServerConfig::new().with_listen_addr("127.0.0.1:0")
    }

    #[tokio::test]
    async fn test_bind_random_port() {
        let server = Server::bind(local_config()).await.expect("bind should succeed");

        assert!(server.local_addr().port() > 0);
        assert!(!server.is_tls());
        assert_eq!(
            server.ws_url(),
            format!("ws://127.0.0.1:{}/ws", server.local_addr().port())
        );
    }

    #[tokio::test]
    async fn test_bind_port_in_use() {
        let first = Server::bind(local_config()).await.expect("bind should succeed");
        let taken = first.local_addr().to_string();

        let result = Server::bind(ServerConfig::new().with_listen_addr(taken)).await;
        let err = result.err().expect("second bind must fail");
        assert!(matches!(err, Error::Bind { .. }));
        assert!(err.is_startup_error());
    }

    #[tokio::test]
    async fn test_bind_rejects_bad_tls_material() {
        let config = local_config().with_tls("/nonexistent/cert.pem", "/nonexistent/key.pem");
        let err = Server::bind(config).await.err().expect("tls load must fail");
        assert!(matches!(err, Error::Tls { .. }));
    }

    #[tokio::test]
    async fn test_bind_with_tls_fixture() {
        let dir = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");
        let config = local_config().with_tls(format!("{dir}/cert.pem"), format!("{dir}/key.pem"));
        let server = Server::bind(config).await.expect("bind should succeed");

        assert!(server.is_tls());
        assert!(server.ws_url().starts_with("wss://127.0.0.1:"));
    }

    #[tokio::test]
    async fn test_serves_index_over_http() {
        let server = Server::bind(local_config()).await.expect("bind should succeed");
        let addr = server.local_addr();
        tokio::spawn(server.serve());

        let mut stream = TcpStream::connect(addr).await.expect("connect");
        stream
            .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .expect("write request");

        let mut response = Vec::new();
        tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut response))
            .await
            .expect("response in time")
            .expect("read response");

        let response = String::from_utf8_lossy(&response);
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.contains("<!doctype html>"));
    }

    #[tokio::test]
    async fn test_shutdown_stops_accept_loop() {
        let server = Server::bind(local_config()).await.expect("bind should succeed");
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let serving = tokio::spawn(server.serve_with_shutdown(async {
            let _ = rx.await;
        }));

        tx.send(()).expect("send shutdown");
        let result = tokio::time::timeout(Duration::from_secs(5), serving)
            .await
            .expect("serve returns in time")
            .expect("serve task");
        assert!(result.is_ok());
    }
}
