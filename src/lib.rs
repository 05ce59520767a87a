//! # nats-lite
//!
//! Client-side transport for a NATS-style, line-framed publish/subscribe
//! protocol.
//!
//! ## Architecture
//!
//! - **Write path**: every outbound command goes through a [`BatchBuffer`],
//!   which coalesces concurrent sends into one socket write per flush cycle and
//!   parks senders while the buffer is full.
//! - **Read path**: a [`FrameDecoder`](protocol::FrameDecoder) slices the
//!   inbound stream into lines; the [`ControlDispatcher`] completes the
//!   handshake, answers server PINGs and completes our own pings.
//!
//! ## Example
//!
//! ```ignore
//! use nats_lite::Client;
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = Client::connect("127.0.0.1", 4222).await.unwrap();
//!
//!     client.send(&b"PUB x 5\r\nhello\r\n"[..]).await.unwrap();
//!     let rtt = client.ping().await.unwrap();
//!
//!     client.close().await.unwrap();
//! }
//! ```

pub mod batch;
pub mod control;
pub mod dispatch;
pub mod error;
pub mod protocol;
pub mod rtt;
pub mod transport;

mod client;

pub use batch::{BatchBuffer, BatchConfig, DEFAULT_BATCH_SIZE};
pub use client::{Client, ClientBuilder, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_BUFFER_SIZE};
pub use control::ServerInfo;
pub use dispatch::ControlDispatcher;
pub use error::{NatsError, Result};
