//! Control plane module - the INFO/CONNECT handshake payloads.
//!
//! # Workflow
//!
//! 1. Client opens the TCP connection
//! 2. Server sends one `INFO {json}` line ([`ServerInfo`])
//! 3. Client answers with `CONNECT {json}` ([`ConnectOptions`])
//! 4. Application traffic and pings may flow

mod connect;
mod info;

pub use connect::{build_connect_line, ConnectOptions, CLIENT_LANG, CLIENT_VERSION};
pub use info::ServerInfo;
