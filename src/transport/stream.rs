//! Stream-backed transport and TCP connect.
//!
//! # Example
//!
//! ```ignore
//! use nats_lite::transport::connect_tcp;
//!
//! let stream = connect_tcp("127.0.0.1", 4222).await?;
//! ```

use std::io;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use super::Transport;
use crate::error::{NatsError, Result};

/// Type-erased write half used by the client.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// [`Transport`] over any async byte sink (a TCP write half, a duplex pipe).
pub struct StreamTransport<W> {
    writer: W,
}

impl<W> StreamTransport<W>
where
    W: AsyncWrite + Send + Unpin + 'static,
{
    /// Wrap a writer.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W> Transport for StreamTransport<W>
where
    W: AsyncWrite + Send + Unpin + 'static,
{
    async fn write(&mut self, bytes: Bytes) -> io::Result<()> {
        self.writer.write_all(&bytes).await?;
        self.writer.flush().await
    }

    async fn close(&mut self) -> io::Result<()> {
        self.writer.shutdown().await
    }
}

/// Open a TCP connection to `host:port` with Nagle disabled.
///
/// Network failures surface as [`NatsError::ConnectionSetup`].
pub async fn connect_tcp(host: &str, port: u16) -> Result<TcpStream> {
    let stream = TcpStream::connect((host, port))
        .await
        .map_err(NatsError::ConnectionSetup)?;
    stream.set_nodelay(true).map_err(NatsError::ConnectionSetup)?;
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt};

    #[tokio::test]
    async fn test_stream_transport_writes_whole_buffer() {
        let (client, mut server) = duplex(64);
        let mut transport = StreamTransport::new(client);

        transport
            .write(Bytes::from_static(b"PING\r\n"))
            .await
            .unwrap();

        let mut buf = [0u8; 6];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"PING\r\n");
    }

    #[tokio::test]
    async fn test_stream_transport_close_signals_eof() {
        let (client, mut server) = duplex(64);
        let mut transport = StreamTransport::new(client);

        transport.close().await.unwrap();

        let mut buf = Vec::new();
        let n = server.read_to_end(&mut buf).await.unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_stream_transport_write_after_peer_drop_fails() {
        let (client, server) = duplex(64);
        let mut transport = StreamTransport::new(client);
        drop(server);

        let result = transport.write(Bytes::from_static(b"PING\r\n")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_connect_tcp_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = connect_tcp("127.0.0.1", port).await;
        assert!(matches!(result, Err(NatsError::ConnectionSetup(_))));
    }
}
