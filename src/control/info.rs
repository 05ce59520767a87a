//! Server greeting payload.

use serde::Deserialize;

use crate::error::Result;

/// Fields of the server's `INFO {json}` greeting.
///
/// Every field is optional on the wire; missing ones take their default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerInfo {
    /// Unique server id.
    pub server_id: String,
    /// Human readable server name.
    pub server_name: String,
    /// Server version.
    pub version: String,
    /// Protocol level supported by the server.
    pub proto: i32,
    /// Host the server listens on.
    pub host: String,
    /// Port the server listens on.
    pub port: u16,
    /// Largest payload the server accepts, in bytes.
    pub max_payload: u64,
    /// Whether the server supports message headers.
    pub headers: bool,
}

impl ServerInfo {
    /// Parse the greeting line text (with or without the `INFO` prefix and
    /// trailing whitespace).
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let body = line.strip_prefix("INFO").unwrap_or(line).trim_start();
        Ok(serde_json::from_str(body)?)
    }
}
