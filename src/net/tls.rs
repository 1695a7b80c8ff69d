//! TLS configuration, certificate loading and the TLS transport.

use std::fs::File;
use std::future::Future;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;

use axum_server::accept::Accept;
use axum_server::tls_rustls::{RustlsAcceptor, RustlsConfig};
use thiserror::Error;
use tokio::net::TcpStream;

use crate::config::TlsConfig;
use crate::net::transport::Transport;

/// Errors while loading TLS material.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("TLS file not found: {0:?}")]
    NotFound(PathBuf),

    #[error("failed to read {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("no certificates found in {0:?}")]
    NoCertificates(PathBuf),

    #[error("no private key found in {0:?}")]
    NoPrivateKey(PathBuf),

    #[error("invalid certificate or key: {0}")]
    Config(io::Error),
}

fn open(path: &Path) -> Result<BufReader<File>, TlsError> {
    if !path.exists() {
        return Err(TlsError::NotFound(path.to_path_buf()));
    }
    File::open(path).map(BufReader::new).map_err(|source| TlsError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// DER certificate chain from a PEM file.
pub fn read_certificates(path: &Path) -> Result<Vec<Vec<u8>>, TlsError> {
    let mut reader = open(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .map(|cert| cert.map(|c| c.as_ref().to_vec()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificates(path.to_path_buf()));
    }
    Ok(certs)
}

/// DER private key (PKCS#1, PKCS#8 or SEC1) from a PEM file.
pub fn read_private_key(path: &Path) -> Result<Vec<u8>, TlsError> {
    let mut reader = open(path)?;
    match rustls_pemfile::private_key(&mut reader) {
        Ok(Some(key)) => Ok(key.secret_der().to_vec()),
        Ok(None) => Err(TlsError::NoPrivateKey(path.to_path_buf())),
        Err(source) => Err(TlsError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Load TLS configuration from certificate and key files.
pub async fn load_tls_config(config: &TlsConfig) -> Result<RustlsConfig, TlsError> {
    let cert_path = Path::new(&config.cert_path);
    let key_path = Path::new(&config.key_path);

    let certs = read_certificates(cert_path)?;
    let key = read_private_key(key_path)?;

    tracing::info!(
        cert_path = %cert_path.display(),
        chain_len = certs.len(),
        "TLS certificate loaded"
    );

    RustlsConfig::from_der(certs, key).await.map_err(TlsError::Config)
}

/// Server-side TLS over TCP.
#[derive(Clone)]
pub struct Tls {
    acceptor: RustlsAcceptor,
}

impl Tls {
    pub fn new(config: RustlsConfig, handshake_timeout: Duration) -> Self {
        Self {
            acceptor: RustlsAcceptor::new(config).handshake_timeout(handshake_timeout),
        }
    }
}

impl Transport for Tls {
    type Stream = <RustlsAcceptor as Accept<TcpStream, ()>>::Stream;

    fn is_secure(&self) -> bool {
        true
    }

    fn handshake(&self, tcp: TcpStream) -> impl Future<Output = io::Result<Self::Stream>> + Send {
        let accepting = self.acceptor.accept(tcp, ());
        async move {
            let (stream, ()) = accepting.await?;
            Ok(stream)
        }
    }
}
