//! Direction workers.
//!
//! Each worker owns one source half and one sink half and copies strictly
//! sequentially: chunk N is fully written before chunk N+1 is read. Workers
//! never close anything themselves. They stop when their source ends, when
//! any read or write fails, or when the session signals shutdown, and hand
//! their halves back to the session for teardown.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::frame::{ClientMessage, FrameKind, Inbound};

// ============================================================================
// Types
// ============================================================================

/// Why a direction stopped.
///
/// All endings lead to the same teardown; the distinction is only logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ending {
    /// The source reached end-of-stream (or the client sent a close frame).
    EndOfStream,
    /// The session shut the direction down because the other one ended.
    Shutdown,
    /// A read or write failed.
    Failed(String),
}

/// Counters of one direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectionStats {
    /// Payload bytes forwarded.
    pub bytes: u64,
    /// Chunks (upstream reads or client messages) forwarded.
    pub chunks: u64,
    /// Why the direction stopped.
    pub ending: Ending,
}

/// What a worker hands back to the session when it stops.
pub(crate) struct Finished<Src, Dst> {
    pub(crate) source: Src,
    pub(crate) sink: Dst,
    pub(crate) stats: DirectionStats,
}

// ============================================================================
// Upstream -> Downstream
// ============================================================================

/// Copies daemon output to the client, one message per read.
pub(crate) async fn upstream_to_downstream<W, M>(
    mut source: OwnedReadHalf,
    mut sink: SplitSink<W, M>,
    frame_kind: FrameKind,
    buffer_size: usize,
    shutdown: CancellationToken,
) -> Finished<OwnedReadHalf, SplitSink<W, M>>
where
    W: Sink<M> + Unpin,
    W::Error: fmt::Display,
    M: ClientMessage,
{
    let mut buffer = vec![0u8; buffer_size];
    let mut bytes = 0u64;
    let mut chunks = 0u64;

    let ending = loop {
        let read = tokio::select! {
            biased;
            () = shutdown.cancelled() => break Ending::Shutdown,
            read = source.read(&mut buffer) => read,
        };

        // TCP reports end-of-stream as a zero-length read, so a chunk is never empty.
        let n = match read {
            Ok(0) => break Ending::EndOfStream,
            Ok(n) => n,
            Err(e) => break Ending::Failed(e.to_string()),
        };

        let message: M = frame_kind.encode(&buffer[..n]);
        let sent = tokio::select! {
            biased;
            () = shutdown.cancelled() => break Ending::Shutdown,
            sent = sink.send(message) => sent,
        };
        if let Err(e) = sent {
            break Ending::Failed(e.to_string());
        }

        bytes += n as u64;
        chunks += 1;
        trace!(len = n, "Daemon chunk forwarded");
    };

    Finished {
        source,
        sink,
        stats: DirectionStats {
            bytes,
            chunks,
            ending,
        },
    }
}

// ============================================================================
// Downstream -> Upstream
// ============================================================================

/// Copies client messages to the daemon as a raw byte stream.
///
/// Empty messages are skipped: writing zero bytes to a TCP stream is a no-op.
pub(crate) async fn downstream_to_upstream<W, M, E>(
    mut source: SplitStream<W>,
    mut sink: OwnedWriteHalf,
    shutdown: CancellationToken,
) -> Finished<SplitStream<W>, OwnedWriteHalf>
where
    W: Stream<Item = Result<M, E>> + Unpin,
    M: ClientMessage,
    E: fmt::Display,
{
    let mut bytes = 0u64;
    let mut chunks = 0u64;

    let ending = loop {
        let next = tokio::select! {
            biased;
            () = shutdown.cancelled() => break Ending::Shutdown,
            next = source.next() => next,
        };

        let data = match next.map(|message| message.map(ClientMessage::inbound)) {
            None | Some(Ok(Inbound::Close)) => break Ending::EndOfStream,
            Some(Ok(Inbound::Control)) => continue,
            Some(Ok(Inbound::Data(data))) => data,
            Some(Err(e)) => break Ending::Failed(e.to_string()),
        };
        if data.is_empty() {
            continue;
        }

        let written = tokio::select! {
            biased;
            () = shutdown.cancelled() => break Ending::Shutdown,
            written = sink.write_all(&data) => written,
        };
        if let Err(e) = written {
            break Ending::Failed(e.to_string());
        }

        bytes += data.len() as u64;
        chunks += 1;
        trace!(len = data.len(), "Client message forwarded");
    };

    Finished {
        source,
        sink,
        stats: DirectionStats {
            bytes,
            chunks,
            ending,
        },
    }
}

// ============================================================================
// Tests
// ============================================================================
