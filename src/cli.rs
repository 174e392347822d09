//! Command-line interface.
//!
//! Every flag has an environment variable fallback so the relay can be
//! configured from a service unit or container without arguments.

// ============================================================================
// Imports
// ============================================================================

use std::path::PathBuf;

use clap::Parser;

use crate::config::{
    DEFAULT_BUFFER_SIZE, DEFAULT_LISTEN_ADDR, DEFAULT_UPSTREAM_ADDR, RelayConfig, ServerConfig,
};
use crate::relay::FrameKind;

// ============================================================================
// Cli
// ============================================================================

/// Serve the MPD web UI and relay its WebSocket to an MPD server.
#[derive(Debug, Parser)]
#[command(name = "mpd-web-relay", version, about)]
pub struct Cli {
    /// Listen on this address.
    #[arg(long, env = "MPD_WEB_LISTEN_ADDR", default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: String,

    /// MPD server address.
    #[arg(long, env = "MPD_WEB_MPD_ADDR", default_value = DEFAULT_UPSTREAM_ADDR)]
    pub mpd_addr: String,

    /// TLS certificate file path (skip to disable TLS).
    #[arg(long, env = "MPD_WEB_TLS_CERT")]
    pub tls_cert: Option<PathBuf>,

    /// TLS key file path (skip to disable TLS).
    #[arg(long, env = "MPD_WEB_TLS_KEY")]
    pub tls_key: Option<PathBuf>,

    /// WebSocket message type for MPD output.
    #[arg(long, env = "MPD_WEB_FRAME_TYPE", value_enum, default_value_t = FrameKind::Binary)]
    pub frame_type: FrameKind,

    /// Largest chunk read from MPD at once, in bytes.
    #[arg(long, env = "MPD_WEB_BUFFER_SIZE", default_value_t = DEFAULT_BUFFER_SIZE)]
    pub buffer_size: usize,

    /// Log filter directive (e.g. `debug`, `mpd_web_relay=trace`).
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_filter: String,
}

impl Cli {
    /// Converts parsed arguments into a server configuration.
    #[must_use]
    pub fn into_config(self) -> ServerConfig {
        let relay = RelayConfig::default()
            .with_upstream_addr(self.mpd_addr)
            .with_buffer_size(self.buffer_size)
            .with_frame_kind(self.frame_type);

        ServerConfig::new()
            .with_listen_addr(self.listen_addr)
            .with_optional_tls(self.tls_cert, self.tls_key)
            .with_relay(relay)
    }
}

// ============================================================================
// Tests
// ============================================================================
