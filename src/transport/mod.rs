//! Transport module - the byte sink the client writes to.
//!
//! The batch buffer and the dispatcher only need two things from the
//! connection: "write these bytes" and "close". [`Transport`] captures that
//! so the write path can be driven by a TCP socket in production and by an
//! in-memory mock in tests.

mod stream;

use std::future::Future;
use std::io;
use std::sync::Arc;

use bytes::Bytes;

pub use stream::{connect_tcp, BoxedWriter, StreamTransport};

/// Outbound half of a connection.
///
/// All writes go through a [`SharedTransport`], so implementations never see
/// two concurrent calls.
pub trait Transport: Send + 'static {
    /// Write the whole buffer and flush it to the peer.
    fn write(&mut self, bytes: Bytes) -> impl Future<Output = io::Result<()>> + Send;

    /// Flush and shut down the outbound direction.
    fn close(&mut self) -> impl Future<Output = io::Result<()>> + Send;
}

/// A transport shared between the flush loop and the pong responder.
pub type SharedTransport<T> = Arc<tokio::sync::Mutex<T>>;

/// Wrap a transport for sharing.
pub fn shared<T: Transport>(transport: T) -> SharedTransport<T> {
    Arc::new(tokio::sync::Mutex::new(transport))
}
