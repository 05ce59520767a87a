//! Client builder and connection runtime.
//!
//! The [`ClientBuilder`] collects configuration. [`Client`] owns one
//! connection for its whole lifecycle:
//! 1. Open the byte stream (TCP, or any stream for tests)
//! 2. Spawn the read loop: decoder -> dispatcher
//! 3. Wait for the server `INFO` greeting
//! 4. Queue `CONNECT {json}` through the batch buffer
//! 5. Serve `send` / `ping` / `flush` until `close`
//!
//! # Example
//!
//! ```ignore
//! use nats_lite::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::builder()
//!         .name("bench")
//!         .connect("127.0.0.1", 4222)
//!         .await?;
//!
//!     client.publish("greet", b"hello").await?;
//!     let rtt = client.ping().await?;
//!     println!("rtt={:?}", rtt);
//!
//!     client.close().await?;
//!     Ok(())
//! }
//! ```

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::batch::{BatchBuffer, BatchConfig};
use crate::control::{build_connect_line, ConnectOptions, ServerInfo};
use crate::dispatch::ControlDispatcher;
use crate::error::{NatsError, Result};
use crate::protocol::{build_pub, FrameDecoder, PING_LINE};
use crate::rtt::RoundTripTracker;
use crate::transport::{
    connect_tcp, shared, BoxedWriter, SharedTransport, StreamTransport, Transport,
};

/// Default time allowed for the server greeting.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default socket read buffer size (64 KiB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 64 * 1024;

type ClientTransport = StreamTransport<BoxedWriter>;

/// Builder for configuring and connecting a [`Client`].
pub struct ClientBuilder {
    batch_config: BatchConfig,
    connect_options: ConnectOptions,
    connect_timeout: Duration,
    read_buffer_size: usize,
}

impl ClientBuilder {
    /// Create a new client builder.
    pub fn new() -> Self {
        Self {
            batch_config: BatchConfig::default(),
            connect_options: ConnectOptions::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }

    /// Set the batch threshold at which senders start to wait.
    ///
    /// Default: 16 KiB
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_config.batch_size = size;
        self
    }

    /// Set how long to wait for the server greeting.
    ///
    /// Default: 5 seconds
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the socket read buffer size.
    ///
    /// Default: 64 KiB
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Set the client name sent in CONNECT.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.connect_options.name = Some(name.into());
        self
    }

    /// Ask the server to acknowledge every command.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.connect_options.verbose = verbose;
        self
    }

    /// Ask the server for strict protocol checking.
    pub fn pedantic(mut self, pedantic: bool) -> Self {
        self.connect_options.pedantic = pedantic;
        self
    }

    /// Connect over TCP to `host:port`.
    pub async fn connect(self, host: &str, port: u16) -> Result<Client> {
        let stream = connect_tcp(host, port).await?;
        tracing::debug!("TCP connected to {}:{}", host, port);
        self.connect_stream(stream).await
    }

    /// Run the handshake over an already open byte stream.
    pub async fn connect_stream<S>(self, stream: S) -> Result<Client>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let writer: BoxedWriter = Box::new(writer);
        let transport = shared(StreamTransport::new(writer));

        let tracker = Arc::new(RoundTripTracker::new());
        let batch = BatchBuffer::new(transport.clone(), self.batch_config);

        let (setup_tx, setup_rx) = oneshot::channel();
        let dispatcher = ControlDispatcher::new(Some(setup_tx), tracker.clone(), transport.clone());

        let reader_task = tokio::spawn(read_loop(
            reader,
            dispatcher,
            tracker.clone(),
            batch.clone(),
            self.read_buffer_size,
        ));

        let server_info = match await_greeting(setup_rx, self.connect_timeout).await {
            Ok(info) => info,
            Err(e) => {
                reader_task.abort();
                tracker.cancel_all();
                batch.close();
                return Err(e);
            }
        };
        tracing::debug!(
            "Connected to server {} (version {})",
            server_info.server_id,
            server_info.version
        );

        let client = Client {
            batch,
            tracker,
            transport,
            server_info,
            reader_task,
            closed: AtomicBool::new(false),
        };

        let connect_line = build_connect_line(&self.connect_options)?;
        client.batch.write(connect_line).await?;
        Ok(client)
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

async fn await_greeting(
    setup_rx: oneshot::Receiver<Result<ServerInfo>>,
    timeout: Duration,
) -> Result<ServerInfo> {
    match tokio::time::timeout(timeout, setup_rx).await {
        Ok(Ok(result)) => result,
        Ok(Err(_)) => Err(NatsError::ConnectionSetup(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed before INFO",
        ))),
        Err(_) => Err(NatsError::ConnectionSetup(io::Error::new(
            io::ErrorKind::TimedOut,
            "timed out waiting for INFO",
        ))),
    }
}

/// Read the socket until EOF, feeding the decoder and dispatching frames.
///
/// On exit, everything still waiting on this connection is failed.
async fn read_loop<R, T>(
    reader: R,
    dispatcher: ControlDispatcher<T>,
    tracker: Arc<RoundTripTracker>,
    batch: BatchBuffer<T>,
    read_buffer_size: usize,
) where
    R: AsyncRead + Unpin,
    T: Transport,
{
    match read_frames(reader, &dispatcher, read_buffer_size).await {
        Ok(()) => tracing::debug!("Server closed the connection"),
        Err(e) => tracing::error!("Read loop error: {}", e),
    }

    dispatcher.fail_setup(NatsError::ConnectionSetup(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        "connection closed before INFO",
    )));
    tracker.cancel_all();
    batch.close();
}

async fn read_frames<R, T>(
    mut reader: R,
    dispatcher: &ControlDispatcher<T>,
    read_buffer_size: usize,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    T: Transport,
{
    let mut decoder = FrameDecoder::new();
    let mut buf = vec![0u8; read_buffer_size];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) => return Err(NatsError::Io(e)),
        };

        for frame in decoder.push(&buf[..n]) {
            dispatcher.dispatch(frame).await;
        }
    }
}

/// A connected client.
///
/// All methods take `&self`; share the client behind an `Arc` to send from
/// several tasks.
pub struct Client {
    batch: BatchBuffer<ClientTransport>,
    tracker: Arc<RoundTripTracker>,
    transport: SharedTransport<ClientTransport>,
    server_info: ServerInfo,
    reader_task: JoinHandle<()>,
    closed: AtomicBool,
}

impl Client {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Connect to `host:port` with default settings.
    pub async fn connect(host: &str, port: u16) -> Result<Client> {
        ClientBuilder::new().connect(host, port).await
    }

    /// Greeting received from the server.
    pub fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Queue raw protocol bytes for sending.
    ///
    /// Returns once the bytes are buffered. Waits while the batch buffer is
    /// full.
    pub async fn send(&self, bytes: impl Into<Bytes>) -> Result<()> {
        self.ensure_open()?;
        self.batch.write(bytes.into()).await
    }

    /// Queue a `PUB` command for `subject`.
    pub async fn publish(&self, subject: &str, payload: &[u8]) -> Result<()> {
        self.send(build_pub(subject, payload)).await
    }

    /// Send a PING and wait for the matching PONG.
    ///
    /// The PING is queued behind any buffered data, so the measurement
    /// includes the time to drain it. There is no timeout; the call fails with
    /// [`NatsError::NotConnected`] if the connection is closed first.
    pub async fn ping(&self) -> Result<Duration> {
        self.ensure_open()?;

        let (id, rtt) = self.tracker.enqueue();
        if let Err(e) = self.batch.write(Bytes::from_static(PING_LINE)).await {
            self.tracker.cancel(id, NatsError::NotConnected);
            return Err(e);
        }

        rtt.await.unwrap_or(Err(NatsError::NotConnected))
    }

    /// Push out everything buffered and wait until it has been written.
    ///
    /// Fails with [`NatsError::TransportWrite`] if a socket write failed
    /// since the previous flush, including writes of bytes that `send`
    /// already accepted.
    pub async fn flush(&self) -> Result<()> {
        self.ensure_open()?;
        self.batch.flush();
        self.batch.wait_drained().await
    }

    /// Number of pings waiting for a pong.
    pub fn pending_pings(&self) -> usize {
        self.tracker.len()
    }

    /// Check if `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Close the connection.
    ///
    /// Unflushed bytes are discarded and an in-flight write is abandoned.
    /// Queued senders and pending pings fail with
    /// [`NatsError::NotConnected`]. The read loop is stopped and the socket
    /// is shut down. Calling it again is a no-op.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        self.batch.close();
        self.tracker.cancel_all();
        self.reader_task.abort();

        self.transport.lock().await.close().await?;
        tracing::debug!("Connection closed");
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(NatsError::NotConnected);
        }
        Ok(())
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.batch.close();
        self.tracker.cancel_all();
        self.reader_task.abort();
    }
}
