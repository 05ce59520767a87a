//! Publish benchmark against a local server.
//!
//! This demo:
//! - connects to `127.0.0.1:4222`
//! - measures one round trip
//! - publishes 10 000 messages of 128 bytes through the batch buffer
//! - measures a second round trip, which includes draining the batch
//!
//! # Running
//!
//! ```text
//! nats-server &
//! RUST_LOG=nats_lite=debug cargo run --example bench
//! ```

use std::time::Instant;

use nats_lite::Client;
use tracing_subscriber::EnvFilter;

const MESSAGES: usize = 10_000;
const PAYLOAD: &[u8] =
    b"01234567890123456789012345678901234567890123456789012345678901234567890123456789012345678901234567890123456789012345678901234567";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_line_number(true)
        .init();

    let client = Client::builder().name("bench").connect("127.0.0.1", 4222).await?;
    tracing::info!("Connected to {}", client.server_info().server_id);

    let rtt = client.ping().await?;
    tracing::info!("Handshake done, rtt={:?}", rtt);

    let start = Instant::now();
    for _ in 0..MESSAGES {
        client.publish("x", PAYLOAD).await?;
    }
    let rtt = client.ping().await?;
    let elapsed = start.elapsed();

    tracing::info!(
        "Published {} messages in {:?} ({:.0} msg/s), rtt={:?}",
        MESSAGES,
        elapsed,
        MESSAGES as f64 / elapsed.as_secs_f64(),
        rtt
    );

    client.close().await?;
    Ok(())
}
