//! Round-trip tracking for PING/PONG.
//!
//! Pending pings sit in a FIFO. The server answers pings in the order it
//! received them, so each PONG completes the oldest entry. The client does not
//! verify that ordering.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::{NatsError, Result};

/// Receiver for a measured round trip.
pub type RoundTripReceiver = oneshot::Receiver<Result<Duration>>;

/// One outstanding ping.
#[derive(Debug)]
pub struct PingRequest {
    id: u64,
    started: Instant,
    done: oneshot::Sender<Result<Duration>>,
}

impl PingRequest {
    /// Id assigned by the tracker at enqueue time.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Complete with the elapsed time since the ping was enqueued.
    pub fn complete(self) -> Duration {
        let rtt = self.started.elapsed();
        // Receiver may be gone if the caller stopped waiting.
        let _ = self.done.send(Ok(rtt));
        rtt
    }

    /// Fail the ping.
    pub fn fail(self, err: NatsError) {
        let _ = self.done.send(Err(err));
    }
}

/// FIFO of pending pings.
#[derive(Debug, Default)]
pub struct RoundTripTracker {
    pending: Mutex<VecDeque<PingRequest>>,
    next_id: AtomicU64,
}

impl RoundTripTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start timing a new ping and append it to the tail.
    ///
    /// Returns the request id (for [`cancel`](Self::cancel)) and the receiver
    /// the duration will be delivered on.
    pub fn enqueue(&self) -> (u64, RoundTripReceiver) {
        let (done, rx) = oneshot::channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.pending.lock().push_back(PingRequest {
            id,
            started: Instant::now(),
            done,
        });
        (id, rx)
    }

    /// Remove and return the oldest pending ping.
    pub fn dequeue_oldest(&self) -> Option<PingRequest> {
        self.pending.lock().pop_front()
    }

    /// Remove one ping by id and fail it.
    pub fn cancel(&self, id: u64, err: NatsError) {
        let request = {
            let mut pending = self.pending.lock();
            let pos = pending.iter().position(|r| r.id == id);
            pos.and_then(|pos| pending.remove(pos))
        };
        if let Some(request) = request {
            request.fail(err);
        }
    }

    /// Fail every pending ping with [`NatsError::NotConnected`].
    pub fn cancel_all(&self) {
        let drained: Vec<_> = self.pending.lock().drain(..).collect();
        if !drained.is_empty() {
            tracing::debug!("Cancelling {} pending ping(s)", drained.len());
        }
        for request in drained {
            request.fail(NatsError::NotConnected);
        }
    }

    /// Number of pings waiting for a pong.
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Check if no ping is outstanding.
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}
