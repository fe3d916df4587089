mod common;

use std::net::SocketAddr;

use http::Method;
use kiln::{ContentKind, RouteOptions, Router, Server};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

async fn start(origins: &[&str]) -> (SocketAddr, oneshot::Sender<()>, JoinHandle<Result<(), kiln::Error>>) {
    let kernel = common::kernel(ContentKind::Api, origins).build().unwrap();
    let routes = Router::new().route(
        Method::GET,
        "/users/{id}/show-profile",
        "UserController",
        RouteOptions { pipe: Some(vec!["cors".into()]), ..RouteOptions::default() },
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(Server::from_listener(listener).serve_with_shutdown(kernel, routes, async move {
        let _ = stopped.await;
    }));
    (addr, stop, server)
}

/// Sends one raw HTTP/1.1 request and returns the raw response.
async fn send(addr: SocketAddr, head: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(head.as_bytes()).await.unwrap();
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    String::from_utf8(raw).unwrap()
}

fn split(raw: &str) -> (&str, &str) {
    raw.split_once("\r\n\r\n").unwrap()
}

#[tokio::test]
async fn serves_a_controller_route() {
    let (addr, stop, server) = start(&[]).await;

    let raw = send(addr, "GET /users/42/show-profile HTTP/1.1\r\nhost: test\r\nconnection: close\r\n\r\n").await;
    let (head, body) = split(&raw);
    let body: serde_json::Value = serde_json::from_str(body).unwrap();

    assert!(head.starts_with("HTTP/1.1 200"), "{head}");
    assert!(head.to_ascii_lowercase().contains("access-control-allow-origin: *"));
    assert_eq!(body["data"]["id"], "42");

    stop.send(()).unwrap();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn unknown_paths_are_not_implemented() {
    let (addr, stop, server) = start(&[]).await;

    let raw = send(addr, "GET /nowhere HTTP/1.1\r\nhost: test\r\nconnection: close\r\n\r\n").await;
    assert!(raw.starts_with("HTTP/1.1 501"), "{raw}");

    stop.send(()).unwrap();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn preflight_is_routed_as_the_announced_method() {
    let (addr, stop, server) = start(&["https://example.com"]).await;

    let allowed = send(
        addr,
        "OPTIONS /users/42/show-profile HTTP/1.1\r\nhost: test\r\norigin: https://example.com\r\n\
         access-control-request-method: GET\r\nconnection: close\r\n\r\n",
    )
    .await;
    let (head, _) = split(&allowed);
    let head = head.to_ascii_lowercase();
    assert!(head.starts_with("http/1.1 200"), "{head}");
    assert!(head.contains("access-control-allow-origin: https://example.com"));
    assert!(head.contains("access-control-allow-methods: get"));

    let denied = send(
        addr,
        "OPTIONS /users/42/show-profile HTTP/1.1\r\nhost: test\r\norigin: https://evil.com\r\n\
         access-control-request-method: GET\r\nconnection: close\r\n\r\n",
    )
    .await;
    assert!(denied.starts_with("HTTP/1.1 403"), "{denied}");

    stop.send(()).unwrap();
    server.await.unwrap().unwrap();
}
