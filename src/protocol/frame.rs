//! Classified control frames.
//!
//! A [`Frame`] is built from exactly one inbound line and handed straight to
//! the dispatcher; nothing keeps it around afterwards.

use super::wire_format::{INFO_PREFIX, LINE_TERMINATOR, PING_PREFIX, PONG_PREFIX};

/// A recognized inbound control line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Server greeting. Holds the whole line (prefix included) without the
    /// trailing line feed.
    Greeting(String),
    /// Server keep-alive; must be answered with a pong.
    Ping,
    /// Answer to one of our pings.
    Pong,
}

impl Frame {
    /// Classify one complete line (terminator included) by its prefix.
    ///
    /// Returns `None` for anything that is not `INFO`, `PING` or `PONG`.
    /// Matching is case-sensitive.
    pub fn classify(line: &[u8]) -> Option<Frame> {
        if line.starts_with(INFO_PREFIX) {
            let text = line.strip_suffix(&[LINE_TERMINATOR]).unwrap_or(line);
            Some(Frame::Greeting(String::from_utf8_lossy(text).into_owned()))
        } else if line.starts_with(PING_PREFIX) {
            Some(Frame::Ping)
        } else if line.starts_with(PONG_PREFIX) {
            Some(Frame::Pong)
        } else {
            None
        }
    }

    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Greeting(_) => "INFO",
            Frame::Ping => "PING",
            Frame::Pong => "PONG",
        }
    }
}
