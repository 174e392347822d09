//! Error types for the relay.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use mpd_web_relay::{Result, Server, ServerConfig};
//!
//! async fn example() -> Result<()> {
//!     let server = Server::bind(ServerConfig::new()).await?;
//!     server.serve().await
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants | Scope |
//! |----------|----------|-------|
//! | Startup | [`Error::Config`], [`Error::Tls`], [`Error::Bind`] | Fatal to the process |
//! | Session | [`Error::Dial`], [`Error::Handshake`] | Contained in one client |
//! | External | [`Error::Io`] | Depends on where they surface |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::path::PathBuf;
use std::result::Result as StdResult;

use thiserror::Error;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Startup Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when the server configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// TLS material could not be loaded.
    ///
    /// Returned when the certificate or key file is missing or malformed.
    #[error("TLS error ({}): {message}", .path.display())]
    Tls {
        /// File that failed to load.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },

    /// Listener could not be bound.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Address the server tried to listen on.
        addr: String,
        /// Underlying socket error.
        source: IoError,
    },

    // ========================================================================
    // Session Errors
    // ========================================================================
    /// Upstream daemon could not be reached.
    ///
    /// The session is refused before any relay starts.
    #[error("Failed to connect to daemon at {addr}: {source}")]
    Dial {
        /// Daemon address.
        addr: String,
        /// Underlying socket error.
        source: IoError,
    },

    /// WebSocket upgrade failed after the HTTP handshake was accepted.
    #[error("WebSocket handshake failed: {message}")]
    Handshake {
        /// Description of the failure.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a TLS error for the given file.
    #[inline]
    pub fn tls(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Tls {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a bind error.
    #[inline]
    pub fn bind(addr: impl Into<String>, source: IoError) -> Self {
        Self::Bind {
            addr: addr.into(),
            source,
        }
    }

    /// Creates an upstream dial error.
    #[inline]
    pub fn dial(addr: impl Into<String>, source: IoError) -> Self {
        Self::Dial {
            addr: addr.into(),
            source,
        }
    }

    /// Creates a handshake error.
    #[inline]
    pub fn handshake(message: impl Into<String>) -> Self {
        Self::Handshake {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this error must terminate the process.
    #[inline]
    #[must_use]
    pub fn is_startup_error(&self) -> bool {
        matches!(
            self,
            Self::Config { .. } | Self::Tls { .. } | Self::Bind { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
