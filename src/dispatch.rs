//! Routing of decoded control frames.
//!
//! - `INFO` completes the pending connection setup (once)
//! - `PING` is answered with `PONG` straight on the transport, bypassing the
//!   batch buffer so keep-alives never queue behind application data
//! - `PONG` completes the oldest pending round trip

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::control::ServerInfo;
use crate::error::{NatsError, Result};
use crate::protocol::{Frame, PONG_LINE};
use crate::rtt::RoundTripTracker;
use crate::transport::{SharedTransport, Transport};

/// Sender side of the connection-setup handshake.
pub type SetupSender = oneshot::Sender<Result<ServerInfo>>;

/// Dispatches control frames for one connection.
pub struct ControlDispatcher<T> {
    setup: Mutex<Option<SetupSender>>,
    tracker: Arc<RoundTripTracker>,
    transport: SharedTransport<T>,
}

impl<T: Transport> ControlDispatcher<T> {
    /// Create a dispatcher.
    ///
    /// `setup` is resolved by the first greeting; pass `None` when no connect
    /// call is waiting.
    pub fn new(
        setup: Option<SetupSender>,
        tracker: Arc<RoundTripTracker>,
        transport: SharedTransport<T>,
    ) -> Self {
        Self {
            setup: Mutex::new(setup),
            tracker,
            transport,
        }
    }

    /// Handle one decoded frame.
    pub async fn dispatch(&self, frame: Frame) {
        tracing::debug!("Received {}", frame.kind());
        match frame {
            Frame::Greeting(text) => self.on_greeting(&text),
            Frame::Ping => self.on_ping().await,
            Frame::Pong => self.on_pong(),
        }
    }

    /// Fail a still-pending setup. Called when the stream ends before the
    /// greeting arrived.
    pub fn fail_setup(&self, err: NatsError) {
        if let Some(setup) = self.setup.lock().take() {
            let _ = setup.send(Err(err));
        }
    }

    fn on_greeting(&self, text: &str) {
        let Some(setup) = self.setup.lock().take() else {
            tracing::debug!("Ignoring INFO with no setup pending");
            return;
        };

        let info = match ServerInfo::parse(text) {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!("Unparseable INFO payload ({}), using defaults", e);
                ServerInfo::default()
            }
        };
        let _ = setup.send(Ok(info));
    }

    async fn on_ping(&self) {
        let result = self
            .transport
            .lock()
            .await
            .write(Bytes::from_static(PONG_LINE))
            .await;

        if let Err(e) = result {
            tracing::warn!("Failed to answer PING: {}", e);
        }
    }

    fn on_pong(&self) {
        match self.tracker.dequeue_oldest() {
            Some(request) => {
                let rtt = request.complete();
                tracing::debug!("Round trip completed in {:?}", rtt);
            }
            None => tracing::debug!("Discarding PONG with no ping pending"),
        }
    }
}
