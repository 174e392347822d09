//! Connection listener with optional TLS termination.
//!
//! [`RelayListener`] plugs into `axum::serve`. Plain connections are handed
//! out as soon as they are accepted. With TLS configured, handshakes run
//! concurrently on a [`JoinSet`], so one slow client cannot hold up the
//! others, and only completed handshakes are handed out.
//!
//! Accept errors that concern a single connection are skipped. Any other
//! accept error (typically running out of file descriptors) would fail again
//! immediately, so the listener sleeps before retrying, doubling the delay
//! from 5 ms up to 1 s and resetting it on the next successful accept.

// ============================================================================
// Imports
// ============================================================================

use std::io::{self, ErrorKind};
use std::net::SocketAddr;
use std::time::Duration;

use axum::serve::Listener;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tokio_rustls::TlsAcceptor;
use tokio_rustls::server::TlsStream;
use tokio_util::either::Either;
use tracing::{debug, error};

// ============================================================================
// Constants
// ============================================================================

/// First retry delay after a failed accept.
const MIN_ACCEPT_DELAY: Duration = Duration::from_millis(5);

/// Upper bound for the retry delay.
const MAX_ACCEPT_DELAY: Duration = Duration::from_secs(1);

/// Upper bound for a TLS handshake.
const TLS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Backoff
// ============================================================================

/// Retry delay for persistent accept errors.
#[derive(Debug, Default)]
pub(crate) struct AcceptBackoff {
    delay: Option<Duration>,
}

impl AcceptBackoff {
    /// Returns the delay before the next retry and doubles it for the one after.
    pub(crate) fn next_delay(&mut self) -> Duration {
        let delay = match self.delay {
            None => MIN_ACCEPT_DELAY,
            Some(previous) => (previous * 2).min(MAX_ACCEPT_DELAY),
        };
        self.delay = Some(delay);
        delay
    }

    /// Starts over after a successful accept.
    pub(crate) fn reset(&mut self) {
        self.delay = None;
    }
}

/// Returns `true` for errors that only affect the connection being accepted.
fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::ConnectionRefused | ErrorKind::ConnectionAborted | ErrorKind::ConnectionReset
    )
}

/// Accepts the next TCP connection, retrying with backoff on errors.
async fn accept_tcp(tcp: &TcpListener, backoff: &mut AcceptBackoff) -> (TcpStream, SocketAddr) {
    loop {
        match tcp.accept().await {
            Ok(accepted) => {
                backoff.reset();
                return accepted;
            }
            Err(e) if is_connection_error(&e) => {
                debug!(error = %e, "Connection dropped before accept");
            }
            Err(e) => {
                let delay = backoff.next_delay();
                error!(error = %e, retry_in = ?delay, "Accept failed");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

// ============================================================================
// RelayListener
// ============================================================================

type Handshake = Option<(TlsStream<TcpStream>, SocketAddr)>;

/// What woke the TLS accept loop.
enum Event {
    Accepted(TcpStream, SocketAddr),
    Handshake(Handshake),
}

/// TCP listener that terminates TLS when configured.
pub struct RelayListener {
    tcp: TcpListener,
    tls: Option<TlsAcceptor>,
    handshakes: JoinSet<Handshake>,
    backoff: AcceptBackoff,
}

impl RelayListener {
    /// Wraps a bound listener.
    #[must_use]
    pub fn new(tcp: TcpListener, tls: Option<TlsAcceptor>) -> Self {
        Self {
            tcp,
            tls,
            handshakes: JoinSet::new(),
            backoff: AcceptBackoff::default(),
        }
    }

    /// Returns `true` if connections are TLS-terminated.
    #[inline]
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        self.tls.is_some()
    }

    async fn accept_tls(&mut self, tls: TlsAcceptor) -> (TlsStream<TcpStream>, SocketAddr) {
        loop {
            let event = tokio::select! {
                (stream, peer) = accept_tcp(&self.tcp, &mut self.backoff) => {
                    Event::Accepted(stream, peer)
                }
                Some(joined) = self.handshakes.join_next(), if !self.handshakes.is_empty() => {
                    Event::Handshake(joined.unwrap_or_default())
                }
            };

            match event {
                Event::Accepted(stream, peer) => {
                    let tls = tls.clone();
                    self.handshakes.spawn(async move {
                        match timeout(TLS_HANDSHAKE_TIMEOUT, tls.accept(stream)).await {
                            Ok(Ok(stream)) => Some((stream, peer)),
                            Ok(Err(e)) => {
                                debug!(%peer, error = %e, "TLS handshake failed");
                                None
                            }
                            Err(_) => {
                                debug!(%peer, "TLS handshake timed out");
                                None
                            }
                        }
                    });
                }
                Event::Handshake(Some(done)) => return done,
                Event::Handshake(None) => {}
            }
        }
    }
}

impl Listener for RelayListener {
    type Io = Either<TcpStream, TlsStream<TcpStream>>;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        let (io, peer) = match self.tls.clone() {
            Some(tls) => {
                let (stream, peer) = self.accept_tls(tls).await;
                (Either::Right(stream), peer)
            }
            None => {
                let (stream, peer) = accept_tcp(&self.tcp, &mut self.backoff).await;
                (Either::Left(stream), peer)
            }
        };
        debug!(%peer, tls = self.is_tls(), "New connection");
        (io, peer)
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        self.tcp.local_addr()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use rustls::pki_types::ServerName;
    use rustls::{ClientConfig, RootCertStore};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio_rustls::TlsConnector;

    use crate::config::TlsFiles;
    use crate::transport::tls;

    const TEST_TIMEOUT: Duration = Duration::from_secs(5);

    fn fixtures() -> TlsFiles {
        let dir = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");
        TlsFiles {
            cert: format!("{dir}/cert.pem").into(),
            key: format!("{dir}/key.pem").into(),
        }
    }

    fn connector() -> TlsConnector {
        let files = fixtures();
        let mut roots = RootCertStore::empty();
        for cert in tls::load_certs(&files.cert).expect("fixture cert") {
            roots.add(cert).expect("trust fixture cert");
        }
        let config = ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .expect("protocol versions")
        .with_root_certificates(roots)
        .with_no_client_auth();
        TlsConnector::from(Arc::new(config))
    }

    #[test]
    fn test_backoff_doubles_up_to_cap() {
        let mut backoff = AcceptBackoff::default();
        let delays: Vec<_> = (0..10).map(|_| backoff.next_delay()).collect();

        assert_eq!(delays[0], Duration::from_millis(5));
        assert_eq!(delays[1], Duration::from_millis(10));
        assert_eq!(delays[2], Duration::from_millis(20));
        assert_eq!(delays[7], Duration::from_millis(640));
        assert_eq!(delays[8], MAX_ACCEPT_DELAY);
        assert_eq!(delays[9], MAX_ACCEPT_DELAY);
    }

    #[test]
    fn test_backoff_resets_after_success() {
        let mut backoff = AcceptBackoff::default();
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.next_delay(), MIN_ACCEPT_DELAY);
    }

    #[test]
    fn test_connection_errors_are_not_retried_with_delay() {
        assert!(is_connection_error(&io::Error::from(ErrorKind::ConnectionAborted)));
        assert!(is_connection_error(&io::Error::from(ErrorKind::ConnectionReset)));
        // EMFILE and friends surface as `Other` or uncategorized kinds.
        assert!(!is_connection_error(&io::Error::from_raw_os_error(24)));
        assert!(!is_connection_error(&io::Error::from(ErrorKind::OutOfMemory)));
    }

    #[tokio::test]
    async fn test_plain_accept() {
        let tcp = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let mut listener = RelayListener::new(tcp, None);
        let addr = listener.local_addr().expect("local addr");

        let (accepted, client) = tokio::join!(listener.accept(), TcpStream::connect(addr));
        let client = client.expect("connect");
        let (io, peer) = accepted;

        assert!(matches!(io, Either::Left(_)));
        assert_eq!(peer, client.local_addr().expect("client addr"));
    }

    #[tokio::test]
    async fn test_failed_handshake_does_not_block_next_client() {
        let acceptor = tls::load_acceptor(&fixtures()).expect("fixture key pair");
        let tcp = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let mut listener = RelayListener::new(tcp, Some(acceptor));
        let addr = listener.local_addr().expect("local addr");
        assert!(listener.is_tls());

        let accepting = tokio::spawn(async move {
            let (io, _) = listener.accept().await;
            io
        });

        // A client that speaks plain text fails its handshake.
        let mut bogus = TcpStream::connect(addr).await.expect("connect");
        bogus
            .write_all(b"GET / HTTP/1.1\r\n\r\n")
            .await
            .expect("write");

        // A stalled client never finishes its handshake.
        let _stalled = TcpStream::connect(addr).await.expect("connect");

        let tcp = TcpStream::connect(addr).await.expect("connect");
        let server_name = ServerName::try_from("localhost").expect("server name");
        let mut client = timeout(TEST_TIMEOUT, connector().connect(server_name, tcp))
            .await
            .expect("handshake in time")
            .expect("handshake");

        let io = timeout(TEST_TIMEOUT, accepting)
            .await
            .expect("accept in time")
            .expect("accept task");
        let Either::Right(mut server) = io else {
            panic!("TLS listener handed out a plain stream");
        };

        client.write_all(b"ping").await.expect("client write");
        let mut received = [0u8; 4];
        server.read_exact(&mut received).await.expect("server read");
        assert_eq!(&received, b"ping");
    }
}
