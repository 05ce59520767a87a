//! Wire format constants.
//!
//! Control lines are ASCII, terminated by a single line feed:
//! ```text
//! INFO {"server_id":"..."}\r\n     server -> client, once on connect
//! CONNECT {"verbose":false}\r\n    client -> server, once after INFO
//! PING\r\n / PONG\r\n              either direction
//! PUB <subject> <len>\r\n<payload>\r\n   client -> server
//! ```
//!
//! Inbound lines only need the `\n`; a preceding `\r` is neither required
//! nor stripped.

use bytes::{BufMut, Bytes, BytesMut};

/// Line terminator byte.
pub const LINE_TERMINATOR: u8 = b'\n';

/// Prefix of the server greeting line.
pub const INFO_PREFIX: &[u8] = b"INFO";

/// Prefix of a ping control line.
pub const PING_PREFIX: &[u8] = b"PING";

/// Prefix of a pong control line.
pub const PONG_PREFIX: &[u8] = b"PONG";

/// Prefix of the client handshake line.
pub const CONNECT_PREFIX: &[u8] = b"CONNECT ";

/// Outbound ping line.
pub const PING_LINE: &[u8] = b"PING\r\n";

/// Outbound pong line.
pub const PONG_LINE: &[u8] = b"PONG\r\n";

/// Outbound line ending.
pub const CRLF: &[u8] = b"\r\n";

/// Prefix of a publish command.
pub const PUB_PREFIX: &[u8] = b"PUB ";

/// Find the offset of the first line terminator, if any.
#[inline]
pub fn find_terminator(buf: &[u8]) -> Option<usize> {
    buf.iter().position(|&b| b == LINE_TERMINATOR)
}

/// Build a `PUB <subject> <len>\r\n<payload>\r\n` command.
pub fn build_pub(subject: &str, payload: &[u8]) -> Bytes {
    let len = payload.len().to_string();
    let mut buf = BytesMut::with_capacity(
        PUB_PREFIX.len() + subject.len() + 1 + len.len() + payload.len() + 2 * CRLF.len(),
    );
    buf.put_slice(PUB_PREFIX);
    buf.put_slice(subject.as_bytes());
    buf.put_u8(b' ');
    buf.put_slice(len.as_bytes());
    buf.put_slice(CRLF);
    buf.put_slice(payload);
    buf.put_slice(CRLF);
    buf.freeze()
}
