//! rpcsrv: JSON-RPC 2.0 over HTTP/1.x.
//!
//! # Architecture Overview
//!
//! ```text
//!   client ──▶ net::listener ──▶ net::transport (plain | TLS)
//!                                   │
//!                                   ▼
//!                          net::connection (one task each)
//!                           read → http::parser
//!                                   │
//!                                   ▼
//!                           http::handler ──▶ rpc::registry ──▶ rpc::dispatch
//!                                   │                              │
//!   client ◀── write ◀── http::reply ◀──────── JSON envelope ◀─────┘
//! ```
//!
//! Configuration comes from an optional TOML file, then command-line flags.

use std::error::Error;
use std::path::PathBuf;

use clap::Parser;

use rpcsrv::config::loader::{read_config, ConfigError};
use rpcsrv::config::validation::validate_config;
use rpcsrv::config::TlsConfig;
use rpcsrv::lifecycle::{signals, startup, Shutdown};
use rpcsrv::net::Listener;
use rpcsrv::observability::{logging, metrics};
use rpcsrv::{HttpServer, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "rpcsrv")]
#[command(about = "HTTP/1.x server for versioned JSON-RPC 2.0 services", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, value_name = "ADDR")]
    listen_addr: Option<String>,

    /// Port to listen on
    #[arg(long, value_name = "PORT")]
    listen_port: Option<u16>,

    /// Worker threads
    #[arg(short, long)]
    threads: Option<usize>,

    /// PEM file holding certificate chain and private key; enables TLS
    #[arg(long, value_name = "FILE")]
    pem: Option<String>,

    /// Log level when RUST_LOG is unset
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Apply command-line flags on top of `config`.
    fn apply(&self, config: &mut ServerConfig) {
        if self.listen_addr.is_some() || self.listen_port.is_some() {
            let (host, port) = split_host_port(&config.listener.bind_address);
            let host = self.listen_addr.as_deref().unwrap_or(host).to_string();
            let port = self.listen_port.map_or_else(|| port.to_string(), |p| p.to_string());
            config.listener.bind_address = join_host_port(&host, &port);
        }
        if let Some(threads) = self.threads {
            config.runtime.worker_threads = threads;
        }
        if let Some(pem) = &self.pem {
            config.listener.tls = Some(TlsConfig::from_pem_file(pem.clone()));
        }
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }
    }
}

fn split_host_port(address: &str) -> (&str, &str) {
    match address.rsplit_once(':') {
        Some((host, port)) => (host, port),
        None => (address, ""),
    }
}

fn join_host_port(host: &str, port: &str) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// Read the file, apply flags, then validate the result once.
fn load(cli: &Cli) -> Result<ServerConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => read_config(path)?,
        None => ServerConfig::default(),
    };
    cli.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = load(&cli)?;

    logging::init(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "rpcsrv starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        tls = config.listener.tls.is_some(),
        worker_threads = config.runtime.worker_threads,
        max_connections = config.listener.max_connections,
        "Configuration loaded"
    );

    let runtime = startup::build_runtime(&config.runtime)?;
    runtime.block_on(serve(config))?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn serve(config: ServerConfig) -> Result<(), Box<dyn Error>> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let registry = startup::default_registry()?;
    let listener = Listener::bind(&config.listener).await?;

    let shutdown = Shutdown::new();
    tokio::spawn(signals::trigger_on_signal(shutdown.clone()));

    HttpServer::new(config, registry)
        .run(listener, shutdown.subscribe())
        .await?;
    Ok(())
}
