//! Bidirectional relay between a WebSocket client and the daemon.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   binary/text messages   ┌──────────────┐   byte stream   ┌──────────────┐
//! │  Browser     │◄─────────────────────────│ RelaySession │◄────────────────│  MPD daemon  │
//! │  (WebSocket) │─────────────────────────►│  2 workers   │────────────────►│  (TCP)       │
//! └──────────────┘   messages, any framing  └──────────────┘   raw bytes     └──────────────┘
//! ```
//!
//! Daemon output keeps its read boundaries: one read, one message. Client
//! messages are appended to the daemon stream without boundaries.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `frame` | Daemon chunk and client message mapping |
//! | `session` | Session lifecycle and joint teardown |
//! | `worker` | The two copy directions |

// ============================================================================
// Submodules
// ============================================================================

/// Daemon chunk and client message mapping.
pub mod frame;

/// Session lifecycle and joint teardown.
pub mod session;

/// Direction workers.
pub mod worker;

// ============================================================================
// Re-exports
// ============================================================================

pub use frame::{ClientMessage, FrameKind, Inbound};
pub use session::{Direction, RelaySession, SessionStats};
pub use worker::{DirectionStats, Ending};
