//! Protocol module - line framing and control frame types.
//!
//! This module implements the text framing of the inbound stream:
//! - wire constants for the control lines
//! - incremental decoder for partial reads
//! - frame classification

mod decoder;
mod frame;
mod wire_format;

pub use decoder::{decode_line, Decoded, FrameDecoder, DEFAULT_DECODER_CAPACITY};
pub use frame::Frame;
pub use wire_format::{
    build_pub, find_terminator, CONNECT_PREFIX, CRLF, INFO_PREFIX, LINE_TERMINATOR, PING_LINE,
    PING_PREFIX, PONG_LINE, PONG_PREFIX, PUB_PREFIX,
};
