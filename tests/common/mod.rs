//! Shared utilities for integration tests.

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use rpcsrv::lifecycle::{startup, Shutdown};
use rpcsrv::net::{ConnectionTracker, Listener};
use rpcsrv::{HttpServer, ServerConfig};

/// A server on an ephemeral port, stopped when dropped.
pub struct TestServer {
    pub addr: SocketAddr,
    pub tracker: ConnectionTracker,
    shutdown: Shutdown,
}

impl TestServer {
    /// Wait until every connection has been torn down.
    #[allow(dead_code)]
    pub async fn wait_for_idle(&self) {
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while self.tracker.active_count() > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("connections did not drain");
    }

    #[allow(dead_code)]
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Loopback config with an OS-chosen port and the access log off.
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.observability.access_log = false;
    config
}

/// Start the default service set on 127.0.0.1 with an OS-chosen port.
#[allow(dead_code)]
pub async fn start_server() -> TestServer {
    start_server_with(test_config()).await
}

/// Start the default service set with `config`.
pub async fn start_server_with(config: ServerConfig) -> TestServer {
    let listener = Listener::bind(&config.listener).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = HttpServer::new(config, startup::default_registry().unwrap());
    let tracker = server.tracker();
    let shutdown = Shutdown::new();
    let signal = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, signal).await;
    });

    TestServer {
        addr,
        tracker,
        shutdown,
    }
}

/// A response read off a raw socket.
#[allow(dead_code)]
#[derive(Debug)]
pub struct RawResponse {
    pub status_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

#[allow(dead_code)]
impl RawResponse {
    pub fn status(&self) -> u16 {
        self.status_line
            .split(' ')
            .nth(1)
            .and_then(|s| s.parse().ok())
            .unwrap()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

/// Read one response; the body length comes from `Content-Length`.
#[allow(dead_code)]
pub async fn read_response(stream: &mut TcpStream) -> RawResponse {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        stream.read_exact(&mut byte).await.unwrap();
        head.push(byte[0]);
    }
    let head = String::from_utf8(head).unwrap();
    let mut lines = head.split("\r\n");
    let status_line = lines.next().unwrap().to_string();
    let headers: Vec<(String, String)> = lines
        .filter(|l| !l.is_empty())
        .map(|l| {
            let (name, value) = l.split_once(": ").unwrap();
            (name.to_string(), value.to_string())
        })
        .collect();

    let length: usize = headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case("content-length"))
        .map(|(_, v)| v.parse().unwrap())
        .unwrap();
    let mut body = vec![0u8; length];
    stream.read_exact(&mut body).await.unwrap();

    RawResponse {
        status_line,
        headers,
        body,
    }
}

/// True when the peer has closed: the next read returns end of stream.
#[allow(dead_code)]
pub async fn is_closed(stream: &mut TcpStream) -> bool {
    let mut buf = [0u8; 1];
    matches!(stream.read(&mut buf).await, Ok(0) | Err(_))
}

/// Connect, send `request` verbatim and read one response.
#[allow(dead_code)]
pub async fn send_raw(addr: SocketAddr, request: &[u8]) -> (TcpStream, RawResponse) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request).await.unwrap();
    let response = read_response(&mut stream).await;
    (stream, response)
}

/// `POST` of a JSON body as raw HTTP/1.1 bytes.
#[allow(dead_code)]
pub fn post_request(path: &str, body: &str, extra_headers: &str) -> Vec<u8> {
    format!(
        "POST {path} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\n{extra_headers}Content-Length: {}\r\n\r\n{body}",
        body.len()
    )
    .into_bytes()
}
