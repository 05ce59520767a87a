//! Integration tests for nats-lite.
//!
//! A `tokio::io::duplex` pipe stands in for the server socket; the test plays
//! the server side line by line.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use nats_lite::{Client, ClientBuilder, NatsError};
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, DuplexStream,
    ReadBuf,
};

const INFO_LINE: &[u8] = b"INFO {\"server_id\":\"TEST\",\"version\":\"2.10.0\",\"max_payload\":1048576}\r\n";

struct FakeServer {
    reader: BufReader<tokio::io::ReadHalf<DuplexStream>>,
    writer: tokio::io::WriteHalf<DuplexStream>,
}

impl FakeServer {
    async fn read_line(&mut self) -> String {
        let mut line = String::new();
        self.reader.read_line(&mut line).await.unwrap();
        line
    }

    async fn write(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.unwrap();
    }
}

/// Connect a client to a fake server that greets and then consumes CONNECT.
async fn connect(builder: ClientBuilder) -> (Client, FakeServer) {
    let (client_side, server_side) = tokio::io::duplex(64 * 1024);
    let (reader, writer) = tokio::io::split(server_side);
    let mut server = FakeServer {
        reader: BufReader::new(reader),
        writer,
    };

    server.write(INFO_LINE).await;
    let client = builder.connect_stream(client_side).await.unwrap();

    let connect = server.read_line().await;
    assert!(connect.starts_with("CONNECT {"), "got {connect:?}");
    assert!(connect.ends_with("}\r\n"));

    (client, server)
}

#[tokio::test]
async fn test_handshake_exposes_server_info() {
    let (client, _server) = connect(Client::builder()).await;

    let info = client.server_info();
    assert_eq!(info.server_id, "TEST");
    assert_eq!(info.version, "2.10.0");
    assert_eq!(info.max_payload, 1_048_576);
}

#[tokio::test]
async fn test_connect_carries_client_options() {
    let (client_side, server_side) = tokio::io::duplex(4096);
    let (reader, mut writer) = tokio::io::split(server_side);
    let mut reader = BufReader::new(reader);

    writer.write_all(b"INFO {}\n").await.unwrap();
    let _client = Client::builder()
        .name("it")
        .connect_stream(client_side)
        .await
        .unwrap();

    let mut line = String::new();
    reader.read_line(&mut line).await.unwrap();
    let json: serde_json::Value =
        serde_json::from_str(line.trim_end().strip_prefix("CONNECT ").unwrap()).unwrap();
    assert_eq!(json["name"], "it");
    assert_eq!(json["verbose"], false);
    assert_eq!(json["lang"], "rust");
}

#[tokio::test]
async fn test_ping_round_trip() {
    let (client, mut server) = connect(Client::builder()).await;

    let ping = tokio::spawn(async move {
        let rtt = client.ping().await;
        (client, rtt)
    });

    assert_eq!(server.read_line().await, "PING\r\n");
    server.write(b"PONG\r\n").await;

    let (client, rtt) = ping.await.unwrap();
    assert!(rtt.is_ok());
    assert_eq!(client.pending_pings(), 0);
}

#[tokio::test]
async fn test_server_ping_is_answered() {
    let (_client, mut server) = connect(Client::builder()).await;

    server.write(b"PING\r\n").await;
    assert_eq!(server.read_line().await, "PONG\r\n");
}

#[tokio::test]
async fn test_unknown_lines_do_not_block_pongs() {
    let (client, mut server) = connect(Client::builder()).await;

    let ping = tokio::spawn(async move { client.ping().await });
    assert_eq!(server.read_line().await, "PING\r\n");

    server.write(b"+OK\r\n-ERR 'whatever'\r\nPONG\r\n").await;
    assert!(ping.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_sends_arrive_in_order_and_before_ping() {
    let (client, mut server) = connect(Client::builder().batch_size(64)).await;

    let mut expected = Vec::new();
    for i in 0..100 {
        let payload = format!("msg-{i}");
        expected.extend_from_slice(format!("PUB x {}\r\n{}\r\n", payload.len(), payload).as_bytes());
        client.publish("x", payload.as_bytes()).await.unwrap();
    }
    expected.extend_from_slice(b"PING\r\n");

    let ping = tokio::spawn(async move {
        let rtt = client.ping().await;
        (client, rtt)
    });

    let mut received = vec![0u8; expected.len()];
    server.reader.read_exact(&mut received).await.unwrap();
    assert_eq!(received, expected);

    server.write(b"PONG\r\n").await;
    let (_client, rtt) = ping.await.unwrap();
    assert!(rtt.is_ok());
}

#[tokio::test]
async fn test_flush_waits_for_transport() {
    let (client, mut server) = connect(Client::builder()).await;

    client.send(&b"PUB a 1\r\nx\r\n"[..]).await.unwrap();
    client.flush().await.unwrap();

    assert_eq!(server.read_line().await, "PUB a 1\r\n");
    assert_eq!(server.read_line().await, "x\r\n");
}

#[tokio::test]
async fn test_close_fails_pending_ping() {
    let (client, mut server) = connect(Client::builder()).await;
    let client = std::sync::Arc::new(client);

    let ping = {
        let client = client.clone();
        tokio::spawn(async move { client.ping().await })
    };
    assert_eq!(server.read_line().await, "PING\r\n");

    client.close().await.unwrap();

    let result = tokio::time::timeout(Duration::from_secs(1), ping)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(result, Err(NatsError::NotConnected)));
}

#[tokio::test]
async fn test_operations_after_close_fail() {
    let (client, _server) = connect(Client::builder()).await;

    client.close().await.unwrap();
    client.close().await.unwrap();

    assert!(client.is_closed());
    assert!(matches!(client.send(&b"PING\r\n"[..]).await, Err(NatsError::NotConnected)));
    assert!(matches!(client.ping().await, Err(NatsError::NotConnected)));
    assert!(matches!(client.flush().await, Err(NatsError::NotConnected)));
}

#[tokio::test]
async fn test_server_hangup_fails_pending_ping_and_sends() {
    let (client, mut server) = connect(Client::builder()).await;
    let client = std::sync::Arc::new(client);

    let ping = {
        let client = client.clone();
        tokio::spawn(async move { client.ping().await })
    };
    assert_eq!(server.read_line().await, "PING\r\n");

    drop(server);

    let result = tokio::time::timeout(Duration::from_secs(1), ping)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(result, Err(NatsError::NotConnected)));
    assert!(matches!(
        client.send(&b"PING\r\n"[..]).await,
        Err(NatsError::NotConnected)
    ));
}

/// Reads from the wrapped pipe; every write fails with `BrokenPipe`.
struct BrokenWrites(DuplexStream);

impl AsyncRead for BrokenWrites {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.0).poll_read(cx, buf)
    }
}

impl AsyncWrite for BrokenWrites {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer gone")))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[tokio::test]
async fn test_flush_reports_failed_socket_write() {
    let (client_side, mut server_side) = tokio::io::duplex(4096);
    server_side.write_all(b"INFO {}\r\n").await.unwrap();

    let client = Client::builder()
        .connect_stream(BrokenWrites(client_side))
        .await
        .unwrap();

    client.send(&b"PUB a 1\r\nx\r\n"[..]).await.unwrap();
    let result = client.flush().await;
    assert!(matches!(result, Err(NatsError::TransportWrite(_))), "got {result:?}");

    drop(server_side);
}

#[tokio::test]
async fn test_close_does_not_wait_for_stalled_write() {
    let (client_side, server_side) = tokio::io::duplex(256);
    let (reader, mut writer) = tokio::io::split(server_side);
    let mut reader = BufReader::new(reader);

    writer.write_all(INFO_LINE).await.unwrap();
    let client = Client::builder().connect_stream(client_side).await.unwrap();

    let mut line = String::new();
    reader.read_line(&mut line).await.unwrap();
    assert!(line.starts_with("CONNECT "));

    // The server stops reading; this write fills the pipe and stalls.
    client.send(vec![b'x'; 4096]).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let closed = tokio::time::timeout(Duration::from_secs(2), client.close()).await;
    assert!(matches!(closed, Ok(Ok(()))));
    assert!(matches!(
        client.send(&b"PING\r\n"[..]).await,
        Err(NatsError::NotConnected)
    ));
}
