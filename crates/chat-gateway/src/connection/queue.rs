//! Bounded outbound queue
//!
//! Producers (room actors, the global registry, the connection's own handlers)
//! never block: a full queue is reported to the caller, who evicts the consumer.
//! Closing the queue drops its only sender, so the write loop drains what is
//! already buffered and then observes the end of the stream.

use chat_core::UserId;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::protocol::{CloseCode, Frame};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique connection identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocate the next identifier
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Non-blocking enqueue failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EnqueueError {
    #[error("outbound queue is full")]
    Full,

    #[error("outbound queue is closed")]
    Closed,
}

enum QueueState {
    Open(mpsc::Sender<Frame>),
    Closed(CloseCode),
}

struct QueueInner {
    connection_id: ConnectionId,
    user_id: UserId,
    state: Mutex<QueueState>,
}

/// Producer side of a connection's outbound queue
///
/// Clones share the same queue; closing through any clone closes it for all.
#[derive(Clone)]
pub struct OutboundQueue {
    inner: Arc<QueueInner>,
}

impl OutboundQueue {
    /// Create a queue and the receiver consumed by the write loop
    pub fn channel(
        connection_id: ConnectionId,
        user_id: UserId,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(capacity);
        let queue = Self {
            inner: Arc::new(QueueInner {
                connection_id,
                user_id,
                state: Mutex::new(QueueState::Open(tx)),
            }),
        };
        (queue, rx)
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.inner.connection_id
    }

    pub fn user_id(&self) -> &UserId {
        &self.inner.user_id
    }

    /// Enqueue a frame without waiting
    pub fn try_enqueue(&self, frame: Frame) -> Result<(), EnqueueError> {
        match &*self.inner.state.lock() {
            QueueState::Open(tx) => tx.try_send(frame).map_err(|e| match e {
                TrySendError::Full(_) => EnqueueError::Full,
                TrySendError::Closed(_) => EnqueueError::Closed,
            }),
            QueueState::Closed(_) => Err(EnqueueError::Closed),
        }
    }

    /// Close the queue, recording why
    ///
    /// Returns `false` if it was already closed; the first reason wins.
    pub fn close(&self, reason: CloseCode) -> bool {
        let mut state = self.inner.state.lock();
        if matches!(*state, QueueState::Closed(_)) {
            return false;
        }
        *state = QueueState::Closed(reason);
        true
    }

    pub fn is_closed(&self) -> bool {
        matches!(*self.inner.state.lock(), QueueState::Closed(_))
    }

    /// Reason recorded by [`close`](Self::close), if closed
    pub fn close_reason(&self) -> Option<CloseCode> {
        match *self.inner.state.lock() {
            QueueState::Open(_) => None,
            QueueState::Closed(reason) => Some(reason),
        }
    }
}

impl fmt::Debug for OutboundQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutboundQueue")
            .field("connection_id", &self.inner.connection_id)
            .field("user_id", &self.inner.user_id)
            .field("closed", &self.is_closed())
            .finish()
    }
}
