//! HTTP server: accept loop and connection spawning.
//!
//! # Responsibilities
//! - Pick the transport (plaintext or TLS) from configuration
//! - Accept connections until shutdown
//! - Spawn one task per connection and track it
//! - Drain live connections before returning
//!
//! # Design Decisions
//! - The accept loop is generic over [`Transport`]; TLS costs nothing
//!   when it is not configured
//! - A failed handshake closes the socket without writing anything
//! - Accept errors never stop the server

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpStream;

use crate::config::ServerConfig;
use crate::http::handler::{RequestHandler, RpcRequestHandler};
use crate::lifecycle::ShutdownSignal;
use crate::net::connection::{Connection, ConnectionSettings, ConnectionState, ConnectionTracker};
use crate::net::listener::{ConnectionPermit, Listener};
use crate::net::tls::{self, Tls, TlsError};
use crate::net::transport::{Plaintext, Transport};
use crate::rpc::Registry;

/// Back-off after a failed accept, e.g. when out of file descriptors.
const ACCEPT_ERROR_DELAY: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("TLS setup failed: {0}")]
    Tls(#[from] TlsError),
}

/// JSON-RPC over HTTP/1.x server.
pub struct HttpServer {
    config: ServerConfig,
    handler: Arc<dyn RequestHandler>,
    tracker: ConnectionTracker,
}

impl HttpServer {
    /// Serve the services of `registry`.
    pub fn new(config: ServerConfig, registry: Registry) -> Self {
        Self::with_handler(config, Arc::new(RpcRequestHandler::new(Arc::new(registry))))
    }

    /// Serve with any request handler.
    pub fn with_handler(config: ServerConfig, handler: Arc<dyn RequestHandler>) -> Self {
        Self {
            config,
            handler,
            tracker: ConnectionTracker::new(),
        }
    }

    /// Live connection table; clones share it.
    pub fn tracker(&self) -> ConnectionTracker {
        self.tracker.clone()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Run until `shutdown` fires and every connection has closed.
    pub async fn run(self, listener: Listener, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        match self.config.listener.tls.clone() {
            Some(tls_config) => {
                let rustls = tls::load_tls_config(&tls_config).await?;
                let transport = Tls::new(rustls, self.config.timeouts.handshake());
                self.serve(listener, transport, shutdown).await
            }
            None => self.serve(listener, Plaintext, shutdown).await,
        }
        Ok(())
    }

    async fn serve<T: Transport>(self, listener: Listener, transport: T, mut shutdown: ShutdownSignal) {
        let settings = Arc::new(ConnectionSettings::from(&self.config));

        match listener.local_addr() {
            Ok(addr) => tracing::info!(
                address = %addr,
                secure = transport.is_secure(),
                "HTTP server starting"
            ),
            Err(e) => tracing::warn!(error = %e, "Listener has no local address"),
        }

        loop {
            let accepted = tokio::select! {
                _ = shutdown.recv() => break,
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer, permit)) => self.spawn_connection(
                    stream,
                    peer,
                    permit,
                    transport.clone(),
                    Arc::clone(&settings),
                    shutdown.clone(),
                ),
                Err(e) => {
                    tracing::warn!(error = %e, "Accept failed");
                    tokio::time::sleep(ACCEPT_ERROR_DELAY).await;
                }
            }
        }

        // Stop accepting before waiting on the rest.
        drop(listener);
        tracing::info!(
            active_connections = self.tracker.active_count(),
            "Stopped accepting, draining connections"
        );
        self.tracker.wait_for_shutdown().await;
        tracing::info!("HTTP server stopped");
    }

    fn spawn_connection<T: Transport>(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        permit: ConnectionPermit,
        transport: T,
        settings: Arc<ConnectionSettings>,
        shutdown: ShutdownSignal,
    ) {
        let guard = self.tracker.track(peer, transport.is_secure());
        let handler = Arc::clone(&self.handler);

        tokio::spawn(async move {
            let _permit = permit;
            let connection_id = guard.id();
            tracing::debug!(connection_id = %connection_id, peer_addr = %peer, "Connection opened");

            if transport.is_secure() {
                guard.set_state(ConnectionState::Handshaking);
            }
            let stream = match transport.handshake(stream).await {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::debug!(
                        connection_id = %connection_id,
                        peer_addr = %peer,
                        error = %e,
                        "Handshake failed"
                    );
                    return;
                }
            };

            Connection::new(stream, peer, guard, handler, settings, shutdown)
                .run()
                .await;
        });
    }
}
