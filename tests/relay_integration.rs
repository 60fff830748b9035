//! End-to-end tests: client → relay → mock backend over loopback TCP.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

mod common;

use common::{read_http_message, split_message, start_backend, start_relay, STEP_TIMEOUT};

fn request(body: &str) -> Vec<u8> {
    format!(
        "POST /containers/create HTTP/1.1\r\nHost: docker\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    )
    .into_bytes()
}

fn response(body: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    )
    .into_bytes()
}

#[tokio::test]
async fn translates_paths_in_both_directions() {
    let (backend_addr, backend) = start_backend(|mut socket: TcpStream| async move {
        let req = read_http_message(&mut socket, true).await;
        socket
            .write_all(&response(r#"{"Source":"/mnt/c/Users/me/app"}"#))
            .await
            .unwrap();
        req
    })
    .await;
    let relay = start_relay(backend_addr, |_| {}).await;

    let mut client = TcpStream::connect(relay.addr).await.unwrap();
    client
        .write_all(&request(r#"{"Binds":["C:\\Users\\me\\app:/app"]}"#))
        .await
        .unwrap();

    let mut received = Vec::new();
    timeout(STEP_TIMEOUT, client.read_to_end(&mut received))
        .await
        .unwrap()
        .unwrap();

    let seen = timeout(STEP_TIMEOUT, backend).await.unwrap().unwrap();
    assert_eq!(seen, request(r#"{"Binds":["/mnt/c/Users/me/app:/app"]}"#));
    assert_eq!(received, response(r#"{"Source":"C:\\Users\\me\\app"}"#));
}

#[tokio::test]
async fn chunked_response_is_rechunked() {
    let (backend_addr, backend) = start_backend(|mut socket: TcpStream| async move {
        read_http_message(&mut socket, true).await;
        socket
            .write_all(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\nd\r\n\"/mnt/d/data\"\r\n0\r\n\r\n")
            .await
            .unwrap();
    })
    .await;
    let relay = start_relay(backend_addr, |_| {}).await;

    let mut client = TcpStream::connect(relay.addr).await.unwrap();
    client
        .write_all(b"GET /containers/json HTTP/1.1\r\nHost: docker\r\n\r\n")
        .await
        .unwrap();

    let mut received = Vec::new();
    timeout(STEP_TIMEOUT, client.read_to_end(&mut received))
        .await
        .unwrap()
        .unwrap();
    backend.await.unwrap();

    let (head, body) = split_message(&received);
    assert_eq!(head, b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n");
    assert_eq!(body, b"a\r\n\"D:\\\\data\"\r\n0\r\n\r\n");
}

#[tokio::test]
async fn attach_switches_to_passthrough() {
    const UPGRADED: &[u8] = b"HTTP/1.1 101 UPGRADED\r\nContent-Type: application/vnd.docker.raw-stream\r\nConnection: Upgrade\r\nUpgrade: tcp\r\n\r\n";
    const OUTPUT: &[u8] = b"cwd=\"/mnt/c/work\"\n";
    const INPUT: &[u8] = b"cd \"C:\\\\work\"\n";

    let (backend_addr, backend) = start_backend(|mut socket: TcpStream| async move {
        let req = read_http_message(&mut socket, true).await;
        socket.write_all(UPGRADED).await.unwrap();
        socket.write_all(OUTPUT).await.unwrap();
        let mut stdin = vec![0u8; INPUT.len()];
        socket.read_exact(&mut stdin).await.unwrap();
        (req, stdin)
    })
    .await;
    let relay = start_relay(backend_addr, |_| {}).await;

    let attach = b"POST /containers/x/attach?stream=1&stdin=1 HTTP/1.1\r\nHost: docker\r\nConnection: Upgrade\r\nUpgrade: tcp\r\n\r\n";
    let mut client = TcpStream::connect(relay.addr).await.unwrap();
    client.write_all(attach).await.unwrap();

    let mut head_and_output = vec![0u8; UPGRADED.len() + OUTPUT.len()];
    timeout(STEP_TIMEOUT, client.read_exact(&mut head_and_output))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&head_and_output[..UPGRADED.len()], UPGRADED);
    assert_eq!(&head_and_output[UPGRADED.len()..], OUTPUT);

    client.write_all(INPUT).await.unwrap();
    let (req, stdin) = timeout(STEP_TIMEOUT, backend).await.unwrap().unwrap();
    assert_eq!(req, attach.to_vec());
    assert_eq!(stdin, INPUT.to_vec());

    let mut rest = Vec::new();
    timeout(STEP_TIMEOUT, client.read_to_end(&mut rest))
        .await
        .unwrap()
        .unwrap();
    assert!(rest.is_empty());
}

#[tokio::test]
async fn translation_can_be_disabled() {
    let body = r#"{"Binds":["C:\\src:/src"]}"#;
    let (backend_addr, backend) = start_backend(|mut socket: TcpStream| async move {
        let req = read_http_message(&mut socket, true).await;
        socket.write_all(&response("{}")).await.unwrap();
        req
    })
    .await;
    let relay = start_relay(backend_addr, |c| c.rewrite.path_translation = false).await;

    let mut client = TcpStream::connect(relay.addr).await.unwrap();
    client.write_all(&request(body)).await.unwrap();
    let mut received = Vec::new();
    timeout(STEP_TIMEOUT, client.read_to_end(&mut received))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(backend.await.unwrap(), request(body));
    assert_eq!(received, response("{}"));
}

#[tokio::test]
async fn replace_rule_runs_before_translation() {
    let (backend_addr, backend) = start_backend(|mut socket: TcpStream| async move {
        let req = read_http_message(&mut socket, true).await;
        socket.write_all(&response("{}")).await.unwrap();
        req
    })
    .await;
    let relay = start_relay(backend_addr, |c| {
        c.rewrite.replace_pattern = Some(r"E:~D:".to_string());
    })
    .await;

    let mut client = TcpStream::connect(relay.addr).await.unwrap();
    client
        .write_all(&request(r#"{"WorkingDir":"E:\\build"}"#))
        .await
        .unwrap();
    let mut received = Vec::new();
    timeout(STEP_TIMEOUT, client.read_to_end(&mut received))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        backend.await.unwrap(),
        request(r#"{"WorkingDir":"/mnt/d/build"}"#)
    );
}

#[tokio::test]
async fn unreachable_remote_closes_client() {
    let remote = common::closed_port().await;
    let relay = start_relay(remote, |c| c.remote.connect_timeout_secs = 1).await;

    let mut client = TcpStream::connect(relay.addr).await.unwrap();
    let mut received = Vec::new();
    timeout(STEP_TIMEOUT, client.read_to_end(&mut received))
        .await
        .unwrap()
        .unwrap();
    assert!(received.is_empty());
}

#[tokio::test]
async fn shutdown_stops_accepting_and_drains() {
    let remote = common::closed_port().await;
    let relay = start_relay(remote, |_| {}).await;

    // one full session proves the accept loop is running
    let mut client = TcpStream::connect(relay.addr).await.unwrap();
    let mut sink = Vec::new();
    timeout(STEP_TIMEOUT, client.read_to_end(&mut sink))
        .await
        .unwrap()
        .unwrap();

    relay.shutdown.trigger();
    timeout(STEP_TIMEOUT, relay.task).await.unwrap().unwrap();
    assert!(relay.server.drain(Duration::from_secs(2)).await);
    assert!(TcpStream::connect(relay.addr).await.is_err());
}
