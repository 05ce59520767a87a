//! CONNECT line builder.
//!
//! The CONNECT line is the client half of the handshake. It is sent once,
//! right after the server greeting, and carries the client options as JSON:
//!
//! ```
//! use nats_lite::control::{build_connect_line, ConnectOptions};
//!
//! let line = build_connect_line(&ConnectOptions::default()).unwrap();
//! assert!(line.starts_with(b"CONNECT {"));
//! assert!(line.ends_with(b"}\r\n"));
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;

use crate::error::Result;
use crate::protocol::{CONNECT_PREFIX, CRLF};

/// Client language reported to the server.
pub const CLIENT_LANG: &str = "rust";

/// Client version reported to the server.
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Options sent in the CONNECT line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectOptions {
    /// Ask the server to acknowledge every command with `+OK`.
    pub verbose: bool,
    /// Ask the server for strict protocol checking.
    pub pedantic: bool,
    /// Implementation language of the client.
    pub lang: String,
    /// Client version.
    pub version: String,
    /// Optional client name shown in server monitoring.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            verbose: false,
            pedantic: false,
            lang: CLIENT_LANG.to_string(),
            version: CLIENT_VERSION.to_string(),
            name: None,
        }
    }
}

/// Build the `CONNECT {json}\r\n` line.
pub fn build_connect_line(options: &ConnectOptions) -> Result<Bytes> {
    let json = serde_json::to_vec(options)?;

    let mut line = BytesMut::with_capacity(CONNECT_PREFIX.len() + json.len() + CRLF.len());
    line.put_slice(CONNECT_PREFIX);
    line.put_slice(&json);
    line.put_slice(CRLF);
    Ok(line.freeze())
}
