//! Relay session lifecycle.
//!
//! A session pairs one daemon connection with one client connection:
//!
//! 1. Split both transports and spawn the two direction workers
//! 2. Wait for the first worker to finish, whatever the reason
//! 3. Signal shutdown so the other worker returns from its pending read or write
//! 4. Wait for the second worker
//! 5. Close both transports, each exactly once
//!
//! Nothing is reported upward as an error. The caller gets [`SessionStats`].

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use futures_util::future::{self, Either};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::RelayConfig;
use crate::identifiers::SessionId;

use super::frame::ClientMessage;
use super::worker::{self, DirectionStats, Ending, Finished};

// ============================================================================
// Constants
// ============================================================================

/// Upper bound for the WebSocket close handshake during teardown.
pub(crate) const CLOSE_GRACE: Duration = Duration::from_secs(5);

// ============================================================================
// Types
// ============================================================================

type ToClient<W, M> = Finished<OwnedReadHalf, SplitSink<W, M>>;
type ToDaemon<W> = Finished<SplitStream<W>, OwnedWriteHalf>;

/// One of the two copy directions of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Daemon output to the client.
    UpstreamToDownstream,
    /// Client messages to the daemon.
    DownstreamToUpstream,
}

/// Summary of a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStats {
    /// Session the summary belongs to.
    pub id: SessionId,
    /// Daemon to client counters.
    pub to_client: DirectionStats,
    /// Client to daemon counters.
    pub to_daemon: DirectionStats,
    /// Direction whose end triggered the teardown.
    pub first_ended: Direction,
}

// ============================================================================
// RelaySession
// ============================================================================

/// A daemon connection and a client connection relayed as one unit.
///
/// `W` is the client WebSocket: an axum `WebSocket` when served by
/// [`Server`](crate::Server), or any stream and sink of [`ClientMessage`]s.
///
/// # Example
///
/// ```ignore
/// let upstream = TcpStream::connect("127.0.0.1:6600").await?;
/// let session = RelaySession::new(upstream, socket, RelayConfig::default());
/// let stats = session.run().await;
/// ```
pub struct RelaySession<W> {
    /// Identifier used in log fields.
    id: SessionId,
    /// Connected daemon socket.
    upstream: TcpStream,
    /// Upgraded client connection.
    downstream: W,
    /// Framing and buffer settings.
    config: RelayConfig,
}

impl<W> RelaySession<W> {
    /// Creates a session over two connected transports.
    #[must_use]
    pub fn new(upstream: TcpStream, downstream: W, config: RelayConfig) -> Self {
        Self::with_id(SessionId::next(), upstream, downstream, config)
    }

    /// Creates a session with an explicit ID.
    #[must_use]
    pub fn with_id(id: SessionId, upstream: TcpStream, downstream: W, config: RelayConfig) -> Self {
        Self {
            id,
            upstream,
            downstream,
            config,
        }
    }

    /// Relays until either side ends, then tears both sides down.
    ///
    /// Returns only after both workers have stopped and both transports
    /// have been closed.
    pub async fn run<M, E>(self) -> SessionStats
    where
        W: Stream<Item = Result<M, E>> + Sink<M, Error = E> + Unpin + Send + 'static,
        M: ClientMessage,
        E: fmt::Display + Send + 'static,
    {
        let id = self.id;
        let (upstream_read, upstream_write) = self.upstream.into_split();
        let (client_sink, client_stream) = self.downstream.split();
        let shutdown = CancellationToken::new();

        let to_client: JoinHandle<ToClient<W, M>> =
            tokio::spawn(worker::upstream_to_downstream(
                upstream_read,
                client_sink,
                self.config.frame_kind,
                self.config.buffer_size,
                shutdown.clone(),
            ));
        let to_daemon: JoinHandle<ToDaemon<W>> = tokio::spawn(
            worker::downstream_to_upstream(client_stream, upstream_write, shutdown.clone()),
        );

        // The first completion closes the session, the second one is awaited
        // so no worker outlives `run`.
        let (first_ended, to_client, to_daemon) = match future::select(to_client, to_daemon).await {
            Either::Left((to_client, to_daemon)) => {
                shutdown.cancel();
                (Direction::UpstreamToDownstream, to_client, to_daemon.await)
            }
            Either::Right((to_daemon, to_client)) => {
                shutdown.cancel();
                (Direction::DownstreamToUpstream, to_client.await, to_daemon)
            }
        };

        debug!(session = %id, ?first_ended, "Relay direction ended, closing session");

        let to_client_stats = stats_of(&to_client);
        let to_daemon_stats = stats_of(&to_daemon);
        close_transports(id, to_client, to_daemon).await;

        SessionStats {
            id,
            to_client: to_client_stats,
            to_daemon: to_daemon_stats,
            first_ended,
        }
    }
}

// ============================================================================
// Teardown
// ============================================================================

/// Extracts direction counters, accounting for a worker that panicked.
fn stats_of<Src, Dst>(finished: &Result<Finished<Src, Dst>, JoinError>) -> DirectionStats {
    match finished {
        Ok(finished) => finished.stats.clone(),
        Err(e) => DirectionStats {
            bytes: 0,
            chunks: 0,
            ending: Ending::Failed(e.to_string()),
        },
    }
}

/// Reassembles both transports from the worker halves and closes them.
///
/// If a worker panicked its halves are already dropped, which closes the
/// remaining half of that transport when it goes out of scope here.
async fn close_transports<W, M, E>(
    id: SessionId,
    to_client: Result<ToClient<W, M>, JoinError>,
    to_daemon: Result<ToDaemon<W>, JoinError>,
) where
    W: Stream<Item = Result<M, E>> + Sink<M, Error = E> + Unpin,
    M: ClientMessage,
    E: fmt::Display,
{
    let (Ok(to_client), Ok(to_daemon)) = (to_client, to_daemon) else {
        debug!(session = %id, "Relay worker aborted, dropping transports");
        return;
    };

    match to_client.source.reunite(to_daemon.sink) {
        Ok(mut upstream) => {
            if let Err(e) = upstream.shutdown().await {
                debug!(session = %id, error = %e, "Daemon socket shutdown failed");
            }
        }
        Err(e) => debug!(session = %id, error = %e, "Daemon socket halves mismatched"),
    }

    match to_daemon.source.reunite(to_client.sink) {
        Ok(mut downstream) => match timeout(CLOSE_GRACE, downstream.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(session = %id, error = %e, "WebSocket close failed"),
            Err(_) => debug!(session = %id, "WebSocket close handshake timed out"),
        },
        Err(_) => debug!(session = %id, "WebSocket halves mismatched"),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use bytes::Bytes;
    use tokio::io::{AsyncReadExt, DuplexStream};
    use tokio::net::TcpListener;
    use tokio_tungstenite::WebSocketStream;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::tungstenite::protocol::Role;

    use crate::relay::FrameKind;

    const TEST_TIMEOUT: Duration = Duration::from_secs(5);

    /// Returns (relay side, daemon side) of a loopback TCP connection.
    async fn tcp_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let (relay_side, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        let (daemon_side, _) = accepted.expect("accept");
        (relay_side.expect("connect"), daemon_side)
    }

    /// Returns (server side, client side) of an in-memory WebSocket.
    async fn ws_pair() -> (WebSocketStream<DuplexStream>, WebSocketStream<DuplexStream>) {
        let (server_io, client_io) = tokio::io::duplex(64 * 1024);
        let server = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
        let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
        (server, client)
    }

    async fn spawn_session(
        config: RelayConfig,
    ) -> (
        JoinHandle<SessionStats>,
        TcpStream,
        WebSocketStream<DuplexStream>,
    ) {
        let (upstream, daemon) = tcp_pair().await;
        let (downstream, client) = ws_pair().await;
        let session = RelaySession::new(upstream, downstream, config);
        (tokio::spawn(session.run()), daemon, client)
    }

    async fn next_data(client: &mut WebSocketStream<DuplexStream>) -> Message {
        loop {
            let message = timeout(TEST_TIMEOUT, client.next())
                .await
                .expect("message in time")
                .expect("stream open")
                .expect("valid message");
            if message.is_binary() || message.is_text() {
                return message;
            }
        }
    }

    #[tokio::test]
    async fn test_client_bytes_reach_daemon() {
        let (_session, mut daemon, mut client) = spawn_session(RelayConfig::default()).await;

        client
            .send(Message::Binary(Bytes::from_static(&[0x01, 0x02, 0x03])))
            .await
            .expect("send");

        let mut received = [0u8; 3];
        timeout(TEST_TIMEOUT, daemon.read_exact(&mut received))
            .await
            .expect("read in time")
            .expect("read");
        assert_eq!(received, [0x01, 0x02, 0x03]);
    }

    #[tokio::test]
    async fn test_daemon_write_is_one_binary_message() {
        let (_session, mut daemon, mut client) = spawn_session(RelayConfig::default()).await;

        daemon.write_all(b"OK\n").await.expect("write");

        let message = next_data(&mut client).await;
        assert_eq!(message, Message::Binary(Bytes::from_static(&[0x4F, 0x4B, 0x0A])));
    }

    #[tokio::test]
    async fn test_text_frame_kind() {
        let config = RelayConfig::default().with_frame_kind(FrameKind::Text);
        let (_session, mut daemon, mut client) = spawn_session(config).await;

        daemon.write_all(b"OK MPD 0.23.5\n").await.expect("write");

        let message = next_data(&mut client).await;
        assert_eq!(message, Message::text("OK MPD 0.23.5\n"));
    }

    #[tokio::test]
    async fn test_each_daemon_read_is_one_message() {
        let (_session, mut daemon, mut client) = spawn_session(RelayConfig::default()).await;

        for reply in [&b"volume: 50\n"[..], b"state: play\n", b"OK\n"] {
            daemon.write_all(reply).await.expect("write");
            let message = next_data(&mut client).await;
            assert_eq!(message.into_data(), Bytes::copy_from_slice(reply));
        }
    }

    #[tokio::test]
    async fn test_large_write_is_split_by_buffer_size() {
        let config = RelayConfig::default().with_buffer_size(4);
        let (_session, mut daemon, mut client) = spawn_session(config).await;

        daemon.write_all(b"0123456789").await.expect("write");

        let mut collected = Vec::new();
        while collected.len() < 10 {
            let data = next_data(&mut client).await.into_data();
            assert!(data.len() <= 4);
            collected.extend_from_slice(&data);
        }
        assert_eq!(collected, b"0123456789");
    }

    #[tokio::test]
    async fn test_empty_client_message_is_skipped() {
        let (_session, mut daemon, mut client) = spawn_session(RelayConfig::default()).await;

        client.send(Message::Binary(Bytes::new())).await.expect("send empty");
        client.send(Message::text("status\n")).await.expect("send");

        let mut received = [0u8; 7];
        timeout(TEST_TIMEOUT, daemon.read_exact(&mut received))
            .await
            .expect("read in time")
            .expect("read");
        assert_eq!(&received, b"status\n");
    }

    #[tokio::test]
    async fn test_daemon_close_closes_client() {
        let (session, daemon, mut client) = spawn_session(RelayConfig::default()).await;

        drop(daemon);

        // The client sees a close frame or the end of the stream, never data.
        loop {
            match timeout(TEST_TIMEOUT, client.next()).await.expect("closed in time") {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                Some(Ok(other)) => panic!("unexpected message after daemon close: {other:?}"),
            }
        }

        let stats = timeout(TEST_TIMEOUT, session)
            .await
            .expect("session ends in time")
            .expect("session task");
        assert_eq!(stats.first_ended, Direction::UpstreamToDownstream);
        assert_eq!(stats.to_client.ending, Ending::EndOfStream);
        assert_eq!(stats.to_daemon.ending, Ending::Shutdown);
    }

    #[tokio::test]
    async fn test_client_close_closes_daemon() {
        let (session, mut daemon, mut client) = spawn_session(RelayConfig::default()).await;

        client.close(None).await.expect("close");

        let mut buffer = [0u8; 16];
        let read = timeout(TEST_TIMEOUT, daemon.read(&mut buffer))
            .await
            .expect("daemon sees close in time");
        assert!(matches!(read, Ok(0) | Err(_)));

        let stats = timeout(TEST_TIMEOUT, session)
            .await
            .expect("session ends in time")
            .expect("session task");
        assert_eq!(stats.first_ended, Direction::DownstreamToUpstream);
        assert_eq!(stats.to_daemon.ending, Ending::EndOfStream);
    }

    #[tokio::test]
    async fn test_client_disconnect_without_close_frame() {
        let (session, mut daemon, client) = spawn_session(RelayConfig::default()).await;

        drop(client);

        let mut buffer = [0u8; 16];
        let read = timeout(TEST_TIMEOUT, daemon.read(&mut buffer))
            .await
            .expect("daemon sees close in time");
        assert!(matches!(read, Ok(0) | Err(_)));

        timeout(TEST_TIMEOUT, session)
            .await
            .expect("session ends in time")
            .expect("session task");
    }

    #[tokio::test]
    async fn test_stats_count_both_directions() {
        let (session, mut daemon, mut client) = spawn_session(RelayConfig::default()).await;

        client.send(Message::text("ping\n")).await.expect("send");
        let mut received = [0u8; 5];
        daemon.read_exact(&mut received).await.expect("read");

        daemon.write_all(b"OK\n").await.expect("write");
        next_data(&mut client).await;

        drop(daemon);
        let stats = timeout(TEST_TIMEOUT, session)
            .await
            .expect("session ends in time")
            .expect("session task");

        assert_eq!(stats.to_daemon.bytes, 5);
        assert_eq!(stats.to_daemon.chunks, 1);
        assert_eq!(stats.to_client.bytes, 3);
        assert_eq!(stats.to_client.chunks, 1);
    }

    #[tokio::test]
    async fn test_panicked_worker_is_reported_as_failed() {
        let join_error = tokio::spawn(async { panic!("worker blew up") })
            .await
            .expect_err("task panics");
        let finished: Result<Finished<(), ()>, JoinError> = Err(join_error);

        let stats = stats_of(&finished);
        assert_eq!(stats.bytes, 0);
        assert!(matches!(stats.ending, Ending::Failed(_)));
    }
}
