//! Batched, backpressured write buffer.
//!
//! Producers append into one shared `BytesMut`. A flush swaps that buffer out
//! for an empty one and hands the swapped bytes to the transport in a single
//! write, so everything written while a flush is in flight is coalesced into
//! the next one.
//!
//! # Architecture
//!
//! ```text
//! send() ─┐                                 ┌─► transport.write(batch 1)
//! send() ─┼─► BytesMut ──swap──► flush loop ┼─► transport.write(batch 2)
//! send() ─┘   (+ waiters)                   └─► ...until drained
//! ```
//!
//! - **At most one write in flight**: the `flushing` flag is only cleared by
//!   the flush loop once the buffer is empty.
//! - **Backpressure**: a writer that finds the buffer full is parked with its
//!   bytes. When the in-flight write completes, parked writers are appended in
//!   arrival order and released. If the write failed, they are released with
//!   the error and their bytes are dropped.
//! - **No stranded bytes**: the flush loop re-checks the buffer after every
//!   write and keeps going until it finds it empty.
//! - **Failures reach a flusher**: writers accepted straight into the buffer
//!   have already returned, so a failed write is also kept until the next
//!   [`BatchBuffer::wait_drained`] reports it.
//! - **Close never waits on the wire**: closing aborts the flush task, which
//!   releases the transport even when the peer has stopped reading.
//!
//! The state lock is never held across the transport write; producers keep
//! buffering while bytes are on the wire.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;

use crate::error::{NatsError, Result};
use crate::transport::{SharedTransport, Transport};

/// Default batch threshold (16 KiB).
pub const DEFAULT_BATCH_SIZE: usize = 16 * 1024;

/// Configuration for a [`BatchBuffer`].
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Buffered byte count at which writers start to wait.
    pub batch_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// A writer parked until the in-flight flush completes.
struct PendingWriter {
    bytes: Bytes,
    done: oneshot::Sender<Result<()>>,
}

struct State {
    buffer: BytesMut,
    waiters: VecDeque<PendingWriter>,
    flushing: bool,
    closed: bool,
    /// Failed write not yet reported by `wait_drained`.
    unreported_error: Option<Arc<io::Error>>,
    flush_task: Option<JoinHandle<()>>,
}

impl State {
    /// A write is accepted without waiting when nobody is queued ahead of it
    /// and it fits under the threshold. An empty buffer always accepts, so a
    /// single oversized write goes through whole.
    fn accepts(&self, len: usize, batch_size: usize) -> bool {
        self.waiters.is_empty()
            && (self.buffer.is_empty() || self.buffer.len() + len <= batch_size)
    }

    /// Resolve every parked writer against the outcome of the write that
    /// just completed.
    fn release_waiters(&mut self, result: &std::result::Result<(), Arc<io::Error>>) {
        let State {
            buffer, waiters, ..
        } = self;

        match result {
            Ok(()) => {
                for waiter in waiters.drain(..) {
                    buffer.extend_from_slice(&waiter.bytes);
                    let _ = waiter.done.send(Ok(()));
                }
            }
            Err(err) => {
                for waiter in waiters.drain(..) {
                    let _ = waiter.done.send(Err(NatsError::TransportWrite(err.clone())));
                }
            }
        }
    }
}

struct Inner<T> {
    state: Mutex<State>,
    transport: SharedTransport<T>,
    batch_size: usize,
    drained: Notify,
}

/// Handle to a batch buffer.
///
/// Cheaply cloneable; all clones share the same buffer and flush loop.
pub struct BatchBuffer<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for BatchBuffer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Transport> BatchBuffer<T> {
    /// Create a batch buffer writing to `transport`.
    pub fn new(transport: SharedTransport<T>, config: BatchConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    buffer: BytesMut::with_capacity(config.batch_size),
                    waiters: VecDeque::new(),
                    flushing: false,
                    closed: false,
                    unreported_error: None,
                    flush_task: None,
                }),
                transport,
                batch_size: config.batch_size,
                drained: Notify::new(),
            }),
        }
    }

    /// Append `bytes` to the buffer and schedule a flush.
    ///
    /// Returns once the bytes are buffered, not once they are on the wire. If
    /// the buffer is full the call waits for the in-flight flush to finish and
    /// fails with [`NatsError::TransportWrite`] if that flush failed.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn write(&self, bytes: Bytes) -> Result<()> {
        let parked = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return Err(NatsError::NotConnected);
            }

            if state.accepts(bytes.len(), self.inner.batch_size) {
                state.buffer.extend_from_slice(&bytes);
                self.schedule_flush(&mut state);
                return Ok(());
            }

            let (done, parked) = oneshot::channel();
            state.waiters.push_back(PendingWriter { bytes, done });
            self.schedule_flush(&mut state);
            parked
        };

        tracing::trace!("Write parked behind full batch buffer");
        // Sender dropped without an answer only happens on teardown.
        parked.await.unwrap_or(Err(NatsError::NotConnected))
    }

    /// Start a flush cycle unless one is already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn flush(&self) {
        let mut state = self.inner.state.lock();
        self.schedule_flush(&mut state);
    }

    /// Wait until the buffer is empty and no flush is in flight.
    ///
    /// Fails with [`NatsError::TransportWrite`] if a write failed since the
    /// last call reported one, and with [`NatsError::NotConnected`] once the
    /// buffer is closed.
    pub async fn wait_drained(&self) -> Result<()> {
        loop {
            let notified = self.inner.drained.notified();
            {
                let mut state = self.inner.state.lock();
                if state.closed {
                    return Err(NatsError::NotConnected);
                }
                if !state.flushing && state.buffer.is_empty() {
                    return match state.unreported_error.take() {
                        Some(err) => Err(NatsError::TransportWrite(err)),
                        None => Ok(()),
                    };
                }
            }
            notified.await;
        }
    }

    /// Discard buffered, unflushed bytes. Parked writers are left alone.
    pub fn clear(&self) {
        self.inner.state.lock().buffer.clear();
    }

    /// Stop accepting writes, drop unflushed bytes and fail every parked
    /// writer with [`NatsError::NotConnected`].
    ///
    /// An in-flight transport write is aborted, so the transport lock is free
    /// once the flush task has been torn down.
    pub fn close(&self) {
        let waiters = {
            let mut state = self.inner.state.lock();
            state.closed = true;
            state.flushing = false;
            state.buffer.clear();
            if let Some(task) = state.flush_task.take() {
                task.abort();
            }
            std::mem::take(&mut state.waiters)
        };

        if !waiters.is_empty() {
            tracing::debug!("Failing {} parked writer(s) on close", waiters.len());
        }
        for waiter in waiters {
            let _ = waiter.done.send(Err(NatsError::NotConnected));
        }
        self.inner.drained.notify_waiters();
    }

    /// Check if there are no buffered bytes.
    pub fn is_empty(&self) -> bool {
        self.inner.state.lock().buffer.is_empty()
    }

    /// Check if a transport write is in flight.
    pub fn is_flushing(&self) -> bool {
        self.inner.state.lock().flushing
    }

    /// Check if the buffer has been closed.
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Number of buffered, unflushed bytes.
    pub fn buffered_len(&self) -> usize {
        self.inner.state.lock().buffer.len()
    }

    /// Number of writers parked behind the full buffer.
    pub fn pending_writers(&self) -> usize {
        self.inner.state.lock().waiters.len()
    }

    /// Configured batch threshold.
    pub fn batch_size(&self) -> usize {
        self.inner.batch_size
    }

    fn schedule_flush(&self, state: &mut State) {
        if state.flushing || state.closed || state.buffer.is_empty() {
            return;
        }
        state.flushing = true;
        state.flush_task = Some(tokio::spawn(flush_loop(self.inner.clone())));
    }
}

/// Write batches until the buffer is found empty.
async fn flush_loop<T: Transport>(inner: Arc<Inner<T>>) {
    loop {
        let batch = {
            let mut state = inner.state.lock();
            if state.closed || state.buffer.is_empty() {
                state.flushing = false;
                drop(state);
                inner.drained.notify_waiters();
                return;
            }
            state.buffer.split().freeze()
        };

        let len = batch.len();
        let result = {
            let mut transport = inner.transport.lock().await;
            transport.write(batch).await.map_err(Arc::new)
        };

        let mut state = inner.state.lock();
        match &result {
            Ok(()) => tracing::trace!("Flushed {} bytes", len),
            Err(e) => {
                tracing::warn!("Flush of {} bytes failed: {}", len, e);
                state.unreported_error = Some(e.clone());
            }
        }
        state.release_waiters(&result);
    }
}
