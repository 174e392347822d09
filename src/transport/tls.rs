//! TLS termination.
//!
//! Loads a PEM certificate chain and private key and builds the acceptor
//! used to wrap every inbound TCP connection. Any failure here is a startup
//! error.

// ============================================================================
// Imports
// ============================================================================

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls::ServerConfig as RustlsConfig;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::TlsAcceptor;
use tracing::info;

use crate::config::TlsFiles;
use crate::error::{Error, Result};

// ============================================================================
// Acceptor
// ============================================================================

/// Builds a TLS acceptor from the configured PEM files.
///
/// # Errors
///
/// Returns [`Error::Tls`] if either file cannot be read or parsed, or if the
/// key does not match the certificate.
pub fn load_acceptor(files: &TlsFiles) -> Result<TlsAcceptor> {
    let certs = load_certs(&files.cert)?;
    let key = load_private_key(&files.key)?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = RustlsConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::tls(&files.cert, e.to_string()))?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| Error::tls(&files.key, e.to_string()))?;

    info!(cert = %files.cert.display(), "TLS enabled");
    Ok(TlsAcceptor::from(Arc::new(config)))
}

// ============================================================================
// PEM Loading
// ============================================================================

/// Loads a certificate chain from a PEM file.
pub(crate) fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let mut reader = open(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::tls(path, format!("invalid certificate PEM: {e}")))?;

    if certs.is_empty() {
        return Err(Error::tls(path, "no certificates found"));
    }
    Ok(certs)
}

/// Loads the first private key from a PEM file.
fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let mut reader = open(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| Error::tls(path, format!("invalid key PEM: {e}")))?
        .ok_or_else(|| Error::tls(path, "no private key found"))
}

fn open(path: &Path) -> Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| Error::tls(path, e.to_string()))
}

// ============================================================================
// Tests
// ============================================================================
