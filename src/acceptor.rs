//! Session acceptor.
//!
//! Turns an upgraded client connection into a running relay session: dial
//! the daemon, and only if that succeeds build and run the session. A failed
//! dial leaves nothing behind besides the closed client connection.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::RelayConfig;
use crate::error::{Error, Result};
use crate::identifiers::SessionId;
use crate::relay::{ClientMessage, RelaySession, SessionStats};

// ============================================================================
// Constants
// ============================================================================

/// Upper bound for closing the client after a failed dial.
const REFUSE_GRACE: Duration = Duration::from_secs(5);

// ============================================================================
// SessionAcceptor
// ============================================================================

/// Creates one relay session per upgraded client connection.
///
/// Cheap to clone; all clones share the same immutable configuration.
#[derive(Debug, Clone)]
pub struct SessionAcceptor {
    config: Arc<RelayConfig>,
}

impl SessionAcceptor {
    /// Creates an acceptor relaying to the configured daemon.
    #[must_use]
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Returns the relay configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Opens a connection to the daemon.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Dial`] if the daemon cannot be reached.
    pub async fn dial(&self) -> Result<TcpStream> {
        let addr = &self.config.upstream_addr;
        let stream = TcpStream::connect(addr.as_str())
            .await
            .map_err(|e| Error::dial(addr.as_str(), e))?;

        // MPD commands are small request/response exchanges.
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "Failed to disable Nagle on daemon socket");
        }

        Ok(stream)
    }

    /// Relays one client until either side ends.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Dial`] if the daemon cannot be reached. The client
    /// connection is closed and no session is created in that case. Once the
    /// session runs, nothing is reported as an error.
    pub async fn accept<W, M, E>(&self, mut downstream: W) -> Result<SessionStats>
    where
        W: Stream<Item = std::result::Result<M, E>> + Sink<M, Error = E> + Unpin + Send + 'static,
        M: ClientMessage,
        E: fmt::Display + Send + 'static,
    {
        let upstream = match self.dial().await {
            Ok(upstream) => upstream,
            Err(e) => {
                warn!(error = %e, "Refusing client, daemon unreachable");
                if let Ok(Err(close_err)) = timeout(REFUSE_GRACE, downstream.close()).await {
                    debug!(error = %close_err, "Closing refused client failed");
                }
                return Err(e);
            }
        };

        let id = SessionId::next();
        info!(
            session = %id,
            upstream = %self.config.upstream_addr,
            "Relay session started"
        );

        let session = RelaySession::with_id(id, upstream, downstream, (*self.config).clone());
        let stats = session.run().await;

        info!(
            session = %id,
            to_client_bytes = stats.to_client.bytes,
            to_daemon_bytes = stats.to_daemon.bytes,
            first_ended = ?stats.first_ended,
            "Relay session closed"
        );

        Ok(stats)
    }
}

// ============================================================================
// Tests
// ============================================================================
