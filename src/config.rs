//! Server and relay configuration.
//!
//! Values are read once at startup and never change afterwards. The daemon
//! address lives in [`RelayConfig`], which the session acceptor owns.
//!
//! # Example
//!
//! ```ignore
//! use mpd_web_relay::ServerConfig;
//!
//! let config = ServerConfig::new()
//!     .with_listen_addr("0.0.0.0:8080")
//!     .with_upstream_addr("music.lan:6600")
//!     .with_tls("cert.pem", "key.pem");
//! config.validate()?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::relay::FrameKind;

// ============================================================================
// Constants
// ============================================================================

/// Default HTTP listen address.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";

/// Default MPD address.
pub const DEFAULT_UPSTREAM_ADDR: &str = "127.0.0.1:6600";

/// Default size of one upstream read.
pub const DEFAULT_BUFFER_SIZE: usize = 16 * 1024;

/// Largest accepted upstream read size.
///
/// One read becomes one WebSocket message, and tungstenite peers reject
/// frames above 16 MiB by default.
pub const MAX_BUFFER_SIZE: usize = 16 * 1024 * 1024;

// ============================================================================
// RelayConfig
// ============================================================================

/// Per-session relay settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Daemon address in `host:port` form.
    pub upstream_addr: String,

    /// Capacity of the upstream read buffer, and so the largest message sent.
    pub buffer_size: usize,

    /// Opcode used for messages to the client.
    pub frame_kind: FrameKind,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            upstream_addr: DEFAULT_UPSTREAM_ADDR.to_string(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            frame_kind: FrameKind::Binary,
        }
    }
}

impl RelayConfig {
    /// Sets the daemon address.
    #[inline]
    #[must_use]
    pub fn with_upstream_addr(mut self, addr: impl Into<String>) -> Self {
        self.upstream_addr = addr.into();
        self
    }

    /// Sets the upstream read buffer size.
    #[inline]
    #[must_use]
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Sets the opcode for messages to the client.
    #[inline]
    #[must_use]
    pub fn with_frame_kind(mut self, kind: FrameKind) -> Self {
        self.frame_kind = kind;
        self
    }

    /// Checks the settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an empty address, or a buffer size of
    /// zero or above [`MAX_BUFFER_SIZE`].
    pub fn validate(&self) -> Result<()> {
        if self.upstream_addr.trim().is_empty() {
            return Err(Error::config("daemon address must not be empty"));
        }
        if self.buffer_size == 0 {
            return Err(Error::config("buffer size must be greater than zero"));
        }
        if self.buffer_size > MAX_BUFFER_SIZE {
            return Err(Error::config(format!(
                "buffer size {} exceeds the maximum of {MAX_BUFFER_SIZE} bytes",
                self.buffer_size
            )));
        }
        Ok(())
    }
}

// ============================================================================
// TlsFiles
// ============================================================================

/// PEM files for TLS termination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsFiles {
    /// Certificate chain.
    pub cert: PathBuf,
    /// Private key.
    pub key: PathBuf,
}

// ============================================================================
// ServerConfig
// ============================================================================

/// Complete server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// HTTP listen address in `host:port` form.
    pub listen_addr: String,

    /// TLS material. Plain HTTP when `None`.
    pub tls: Option<TlsFiles>,

    /// Relay settings handed to every session.
    pub relay: RelayConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerConfig {
    /// Creates a configuration with default addresses and no TLS.
    #[must_use]
    pub fn new() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            tls: None,
            relay: RelayConfig::default(),
        }
    }

    /// Sets the listen address.
    #[inline]
    #[must_use]
    pub fn with_listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = addr.into();
        self
    }

    /// Sets the daemon address.
    #[inline]
    #[must_use]
    pub fn with_upstream_addr(mut self, addr: impl Into<String>) -> Self {
        self.relay.upstream_addr = addr.into();
        self
    }

    /// Enables TLS with the given certificate and key files.
    #[inline]
    #[must_use]
    pub fn with_tls(mut self, cert: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Self {
        self.tls = Some(TlsFiles {
            cert: cert.into(),
            key: key.into(),
        });
        self
    }

    /// Enables TLS only when both paths are present.
    #[must_use]
    pub fn with_optional_tls(mut self, cert: Option<PathBuf>, key: Option<PathBuf>) -> Self {
        self.tls = match (cert, key) {
            (Some(cert), Some(key)) => Some(TlsFiles { cert, key }),
            _ => None,
        };
        self
    }

    /// Replaces the relay settings.
    #[inline]
    #[must_use]
    pub fn with_relay(mut self, relay: RelayConfig) -> Self {
        self.relay = relay;
        self
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if an address is empty or the buffer size is
    /// out of range.
    pub fn validate(&self) -> Result<()> {
        if self.listen_addr.trim().is_empty() {
            return Err(Error::config("listen address must not be empty"));
        }
        self.relay.validate()
    }
}

// ============================================================================
// Tests
// ============================================================================
