//! Mapping between daemon bytes and WebSocket messages.
//!
//! One read from the daemon always becomes exactly one message. The
//! [`FrameKind`] only decides which opcode carries it.
//!
//! The relay is generic over the client's WebSocket implementation.
//! [`ClientMessage`] is the small surface it needs from a message type:
//! build a data message and classify an incoming one. It is implemented for
//! axum messages (what the server hands out) and tungstenite messages.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use axum::extract::ws::Message as AxumMessage;
use bytes::Bytes;
use clap::ValueEnum;
use tokio_tungstenite::tungstenite::Message as WsMessage;

// ============================================================================
// FrameKind
// ============================================================================

/// WebSocket opcode used for daemon output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum FrameKind {
    /// Every chunk is sent as a binary message.
    #[default]
    Binary,

    /// Chunks are sent as text messages when they are valid UTF-8.
    ///
    /// A chunk that is not valid UTF-8 (for example one that splits a
    /// multi-byte character, or album art) is sent as a binary message.
    Text,
}

impl FrameKind {
    /// Wraps one upstream chunk into a single WebSocket message.
    #[must_use]
    pub fn encode<M: ClientMessage>(self, chunk: &[u8]) -> M {
        match self {
            Self::Binary => M::from_binary(Bytes::copy_from_slice(chunk)),
            Self::Text => match std::str::from_utf8(chunk) {
                Ok(text) => M::from_text(text),
                Err(_) => M::from_binary(Bytes::copy_from_slice(chunk)),
            },
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Binary => f.write_str("binary"),
            Self::Text => f.write_str("text"),
        }
    }
}

// ============================================================================
// ClientMessage
// ============================================================================

/// What an incoming client message means to the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Text or binary payload, forwarded as raw bytes.
    Data(Bytes),
    /// Ping, pong or raw frame. Handled by the WebSocket layer.
    Control,
    /// Close frame. Ends the client to daemon direction.
    Close,
}

/// A WebSocket message type the relay can speak.
pub trait ClientMessage: Send + Unpin + 'static {
    /// Builds a binary message.
    fn from_binary(data: Bytes) -> Self;

    /// Builds a text message.
    fn from_text(text: &str) -> Self;

    /// Classifies a message received from the client.
    fn inbound(self) -> Inbound;
}

impl ClientMessage for AxumMessage {
    fn from_binary(data: Bytes) -> Self {
        Self::Binary(data)
    }

    fn from_text(text: &str) -> Self {
        Self::Text(text.to_owned().into())
    }

    fn inbound(self) -> Inbound {
        match self {
            Self::Binary(data) => Inbound::Data(data),
            Self::Text(text) => Inbound::Data(Bytes::copy_from_slice(text.as_str().as_bytes())),
            Self::Ping(_) | Self::Pong(_) => Inbound::Control,
            Self::Close(_) => Inbound::Close,
        }
    }
}

impl ClientMessage for WsMessage {
    fn from_binary(data: Bytes) -> Self {
        Self::Binary(data)
    }

    fn from_text(text: &str) -> Self {
        Self::text(text)
    }

    fn inbound(self) -> Inbound {
        match self {
            Self::Binary(data) => Inbound::Data(data),
            Self::Text(text) => Inbound::Data(Bytes::from(text)),
            Self::Ping(_) | Self::Pong(_) | Self::Frame(_) => Inbound::Control,
            Self::Close(_) => Inbound::Close,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
