//! End-to-end tests against a TLS listener using the fixture certificate.

use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use rpcsrv::config::TlsConfig;

mod common;

use common::{start_server_with, test_config, TestServer};

const FIXTURE_PEM: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/server.pem");

async fn start_tls_server() -> TestServer {
    let mut config = test_config();
    config.listener.tls = Some(TlsConfig::from_pem_file(FIXTURE_PEM));
    config.timeouts.handshake_secs = 1;
    start_server_with(config).await
}

fn https_client() -> reqwest::Client {
    reqwest::Client::builder()
        .use_rustls_tls()
        .danger_accept_invalid_certs(true)
        .http1_only()
        .build()
        .unwrap()
}

/// Read until the peer closes, bounded by a timeout.
async fn read_until_closed(stream: &mut TcpStream) -> Vec<u8> {
    let mut received = Vec::new();
    let _ = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut received)).await;
    received
}

#[tokio::test]
async fn test_ping_over_https() {
    let server = start_tls_server().await;

    let res = https_client()
        .post(format!("https://{}/rpc/1", server.addr))
        .json(&json!({"jsonrpc": "2.0", "method": "ping", "id": 1}))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), reqwest::StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({"jsonrpc": "2.0", "result": "pong", "id": 1}));
}

#[tokio::test]
async fn test_https_keep_alive_and_discovery() {
    let server = start_tls_server().await;
    let client = https_client();

    for id in 1..=3 {
        let body: Value = client
            .post(format!("https://{}/rpc/1", server.addr))
            .json(&json!({"jsonrpc": "2.0", "method": "echo", "params": [id], "id": id}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["result"], json!([id]));
    }

    let discovery: Value = client
        .get(format!("https://{}/", server.addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(discovery[0]["endpoint"], "/rpc/1");
    assert_eq!(server.tracker.active_count(), 1);
}

#[tokio::test]
async fn test_plaintext_request_to_tls_port_gets_no_http_reply() {
    let server = start_tls_server().await;

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    stream.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();

    let received = read_until_closed(&mut stream).await;
    assert!(
        !received.windows(5).any(|w| w == b"HTTP/"),
        "unexpected reply: {:?}",
        String::from_utf8_lossy(&received)
    );

    drop(stream);
    server.wait_for_idle().await;
}

#[tokio::test]
async fn test_silent_client_hits_handshake_timeout() {
    let server = start_tls_server().await;

    let started = Instant::now();
    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    let received = read_until_closed(&mut stream).await;

    assert!(received.is_empty());
    assert!(started.elapsed() >= Duration::from_millis(900));
    assert!(started.elapsed() < Duration::from_secs(5));
    server.wait_for_idle().await;
}
