//! End-to-end tests against a live server on a loopback port.

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

mod common;

use common::{is_closed, post_request, read_response, send_raw, start_server};

#[tokio::test]
async fn test_ping_over_reqwest() {
    let server = start_server().await;
    let client = reqwest::Client::new();

    let res = client
        .post(server.url("/rpc/1"))
        .json(&json!({"jsonrpc": "2.0", "method": "ping", "id": 1}))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers().get("content-type").unwrap(),
        "application/json"
    );
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({"jsonrpc": "2.0", "result": "pong", "id": 1}));
}

#[tokio::test]
async fn test_echo_returns_params() {
    let server = start_server().await;
    let (_, res) = send_raw(
        server.addr,
        &post_request("/rpc/1", r#"{"jsonrpc":"2.0","method":"echo","params":[1,"two"],"id":"x"}"#, ""),
    )
    .await;

    assert_eq!(res.status(), 200);
    assert_eq!(res.json(), json!({"jsonrpc": "2.0", "result": [1, "two"], "id": "x"}));
    assert_eq!(res.body.last(), Some(&b'\n'));
    assert_eq!(res.header("content-length").unwrap(), res.body.len().to_string());
}

#[tokio::test]
async fn test_rpc_errors_travel_in_200_replies() {
    let server = start_server().await;
    let client = reqwest::Client::new();

    let cases = [
        ("{not json", -32700),
        (r#"{"jsonrpc":"2.0","id":2}"#, -32600),
        (r#"{"jsonrpc":"2.0","method":"nope","id":3}"#, -32601),
    ];
    for (body, code) in cases {
        let res = client
            .post(server.url("/rpc/1"))
            .body(body)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK, "{body}");
        let value: Value = res.json().await.unwrap();
        assert_eq!(value["error"]["code"], code, "{body}");
    }
}

#[tokio::test]
async fn test_batch_preserves_order() {
    let server = start_server().await;
    let client = reqwest::Client::new();

    let res = client
        .post(server.url("/rpc/1"))
        .json(&json!([
            {"jsonrpc": "2.0", "method": "echo", "params": {"n": 1}, "id": 1},
            {"jsonrpc": "2.0", "method": "missing", "id": 2},
            {"jsonrpc": "2.0", "method": "ping", "id": 3}
        ]))
        .send()
        .await
        .unwrap();

    let body: Value = res.json().await.unwrap();
    let items = body.as_array().unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(items[0]["result"], json!({"n": 1}));
    assert_eq!(items[1]["error"]["code"], -32601);
    assert_eq!(items[2]["result"], "pong");
}

#[tokio::test]
async fn test_discovery_and_reflection() {
    let server = start_server().await;
    let client = reqwest::Client::new();

    let discovery: Value = client
        .get(server.url("/"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(discovery[0]["name"], "myapi/1");
    assert_eq!(discovery[0]["endpoint"], "/rpc/1");

    let methods: Value = client
        .get(server.url("/rpc/1"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(methods, json!([{"method": "echo"}, {"method": "ping"}]));
}

#[tokio::test]
async fn test_unknown_paths() {
    let server = start_server().await;
    let client = reqwest::Client::new();

    let res = client.get(server.url("/rpc/9")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(res.headers().get("content-type").unwrap(), "text/html");

    let res = client.post(server.url("/")).body("{}").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let (_, res) = send_raw(server.addr, b"DELETE /rpc/1 HTTP/1.1\r\n\r\n").await;
    assert_eq!(res.status(), 400);
}

#[tokio::test]
async fn test_keep_alive_reuses_socket() {
    let server = start_server().await;
    let mut stream = TcpStream::connect(server.addr).await.unwrap();

    for id in 1..=3 {
        let body = format!(r#"{{"jsonrpc":"2.0","method":"echo","params":[{id}],"id":{id}}}"#);
        stream
            .write_all(&post_request("/rpc/1", &body, ""))
            .await
            .unwrap();
        let res = read_response(&mut stream).await;
        assert_eq!(res.status(), 200);
        assert_eq!(res.header("connection"), None);
        assert_eq!(res.json()["result"], json!([id]));
    }
    assert_eq!(server.tracker.active_count(), 1);

    drop(stream);
    tokio::time::timeout(Duration::from_secs(2), async {
        while server.tracker.active_count() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_connection_close_is_honoured() {
    let server = start_server().await;
    let (mut stream, res) = send_raw(
        server.addr,
        &post_request("/rpc/1", r#"{"method":"ping","id":1}"#, "Connection: close\r\n"),
    )
    .await;
    assert_eq!(res.header("connection"), Some("close"));
    assert!(is_closed(&mut stream).await);
}

#[tokio::test]
async fn test_http_1_0_closes_even_with_keep_alive() {
    let server = start_server().await;
    let (mut stream, res) = send_raw(
        server.addr,
        b"GET /rpc/1 HTTP/1.0\r\nConnection: keep-alive\r\n\r\n",
    )
    .await;
    assert_eq!(res.status(), 200);
    assert_eq!(res.status_line, "HTTP/1.1 200 OK");
    assert_eq!(res.header("connection"), Some("close"));
    assert!(is_closed(&mut stream).await);
}

#[tokio::test]
async fn test_malformed_request_gets_400_and_close() {
    let server = start_server().await;
    let (mut stream, res) = send_raw(
        server.addr,
        b"GET /rpc/1 HTTP/1.1\r\nConnection: keep-alive\r\nBad Header\r\n\r\n",
    )
    .await;
    assert_eq!(res.status(), 400);
    assert_eq!(res.header("connection"), Some("close"));
    assert!(String::from_utf8_lossy(&res.body).contains("400 Bad Request"));
    assert!(is_closed(&mut stream).await);
}

#[tokio::test]
async fn test_request_dribbled_byte_by_byte() {
    let server = start_server().await;
    let request = post_request("/rpc/1", r#"{"jsonrpc":"2.0","method":"ping","id":7}"#, "");

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    for byte in &request {
        stream.write_all(std::slice::from_ref(byte)).await.unwrap();
        stream.flush().await.unwrap();
    }
    let res = read_response(&mut stream).await;
    assert_eq!(res.json(), json!({"jsonrpc": "2.0", "result": "pong", "id": 7}));
}

#[tokio::test]
async fn test_concurrent_clients() {
    let server = start_server().await;
    let client = reqwest::Client::new();

    let tasks: Vec<_> = (0..20)
        .map(|i| {
            let client = client.clone();
            let url = server.url("/rpc/1");
            tokio::spawn(async move {
                let res = client
                    .post(url)
                    .json(&json!({"jsonrpc": "2.0", "method": "echo", "params": [i], "id": i}))
                    .send()
                    .await
                    .unwrap();
                let body: Value = res.json().await.unwrap();
                assert_eq!(body["result"], json!([i]));
                assert_eq!(body["id"], i);
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap();
    }
}
