//! Incremental line decoder for inbound control frames.
//!
//! Uses `bytes::BytesMut` as the accumulation window. Each decode step looks
//! only at the current window contents:
//! - no terminator yet: [`Decoded::NeedMoreData`], nothing consumed
//! - terminator at offset `i`: bytes `[0, i]` are consumed as one line and
//!   classified
//!
//! # Example
//!
//! ```
//! use nats_lite::protocol::{Frame, FrameDecoder};
//!
//! let mut decoder = FrameDecoder::new();
//!
//! assert!(decoder.push(b"INF").is_empty());
//! let frames = decoder.push(b"O {}\nPING\r\n");
//!
//! assert_eq!(frames, vec![Frame::Greeting("INFO {}".into()), Frame::Ping]);
//! ```

use bytes::{Bytes, BytesMut};

use super::frame::Frame;
use super::wire_format::find_terminator;

/// Default initial capacity of the decode window.
pub const DEFAULT_DECODER_CAPACITY: usize = 4 * 1024;

/// Outcome of one decode step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A complete, recognized control line.
    Frame(Frame),
    /// A complete line with an unknown prefix. It has been consumed.
    Unrecognized(Bytes),
    /// No line terminator in the window yet.
    NeedMoreData,
}

/// Try to take one line off the front of `buf`.
///
/// Never consumes past the first terminator and never fails.
pub fn decode_line(buf: &mut BytesMut) -> Decoded {
    let Some(end) = find_terminator(buf) else {
        return Decoded::NeedMoreData;
    };

    let line = buf.split_to(end + 1).freeze();
    match Frame::classify(&line) {
        Some(frame) => Decoded::Frame(frame),
        None => Decoded::Unrecognized(line),
    }
}

/// Accumulates inbound bytes and extracts complete control frames.
pub struct FrameDecoder {
    buffer: BytesMut,
}

impl FrameDecoder {
    /// Create a decoder with the default window capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_DECODER_CAPACITY)
    }

    /// Create a decoder with a custom initial window capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Append a chunk from the socket and return every complete frame it
    /// finished, in arrival order.
    ///
    /// Unrecognized lines are dropped. A trailing partial line stays buffered
    /// for the next push.
    pub fn push(&mut self, data: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        loop {
            match decode_line(&mut self.buffer) {
                Decoded::Frame(frame) => frames.push(frame),
                Decoded::Unrecognized(line) => {
                    tracing::debug!(
                        "Dropping unrecognized line: {:?}",
                        String::from_utf8_lossy(&line)
                    );
                }
                Decoded::NeedMoreData => break,
            }
        }
        frames
    }

    /// Number of bytes waiting for a terminator.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}
