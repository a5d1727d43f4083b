//! Socket read and write loops
//!
//! Both loops are generic over the socket halves so they run against
//! `axum`'s split WebSocket in production and in-memory channels in tests.

use axum::extract::ws::{CloseFrame, Message};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, timeout, timeout_at, Instant, MissedTickBehavior};

use super::{ConnectionError, OutboundQueue};
use crate::protocol::{CloseCode, ConnectionLimits, Frame};

/// Normalize an inbound chat line
///
/// Embedded line breaks become spaces and surrounding whitespace is trimmed.
/// Returns `None` for a line with nothing left.
pub fn normalize_line(raw: &str) -> Option<String> {
    let line = raw.replace(['\r', '\n'], " ");
    let line = line.trim();
    if line.is_empty() {
        None
    } else {
        Some(line.to_string())
    }
}

/// Join `first` with up to `max_extra` frames already waiting in the queue
pub fn coalesce(first: Frame, frames: &mut mpsc::Receiver<Frame>, max_extra: usize) -> String {
    let mut text = String::from(&*first);
    for _ in 0..max_extra {
        let Ok(next) = frames.try_recv() else {
            break;
        };
        text.push('\n');
        text.push_str(&next);
    }
    text
}

async fn send_within<S>(sink: &mut S, message: Message, wait: Duration) -> Result<(), ConnectionError>
where
    S: Sink<Message> + Unpin,
    S::Error: fmt::Display,
{
    match timeout(wait, sink.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(ConnectionError::Socket(e.to_string())),
        Err(_) => Err(ConnectionError::WriteTimeout),
    }
}

/// Sole writer for a socket
///
/// Sends queued frames (coalesced) and periodic pings. When the queue is
/// closed, the frames still buffered are flushed and a Close frame carrying
/// the queue's close reason ends the loop.
pub async fn write_loop<S>(
    mut sink: S,
    mut frames: mpsc::Receiver<Frame>,
    queue: OutboundQueue,
    limits: ConnectionLimits,
) -> Result<(), ConnectionError>
where
    S: Sink<Message> + Unpin,
    S::Error: fmt::Display,
{
    let mut ping = interval_at(Instant::now() + limits.ping_period, limits.ping_period);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            frame = frames.recv() => match frame {
                Some(first) => {
                    let text = coalesce(first, &mut frames, limits.queue_capacity);
                    send_within(&mut sink, Message::Text(text), limits.write_wait).await?;
                }
                None => {
                    let code = queue.close_reason().unwrap_or(CloseCode::Normal);
                    let close = CloseFrame {
                        code: code.as_u16(),
                        reason: Cow::Borrowed(code.description()),
                    };
                    send_within(&mut sink, Message::Close(Some(close)), limits.write_wait).await?;
                    let _ = timeout(limits.write_wait, sink.close()).await;

                    tracing::debug!(
                        connection_id = %queue.connection_id(),
                        close_code = code.as_u16(),
                        "Write loop finished"
                    );
                    return Ok(());
                }
            },
            _ = ping.tick() => {
                send_within(&mut sink, Message::Ping(Vec::new()), limits.write_wait).await?;
            }
        }
    }
}

/// Read frames until the peer goes away, returning why the loop stopped
///
/// The read deadline starts at `pong_wait` and is extended only when a Pong
/// arrives. Each non-empty text line is handed to `on_line` in order.
pub async fn read_loop<St, E, F, Fut>(
    mut stream: St,
    limits: ConnectionLimits,
    mut on_line: F,
) -> ConnectionError
where
    St: Stream<Item = Result<Message, E>> + Unpin,
    E: fmt::Display,
    F: FnMut(String) -> Fut,
    Fut: Future<Output = ()>,
{
    let mut deadline = Instant::now() + limits.pong_wait;

    loop {
        let message = match timeout_at(deadline, stream.next()).await {
            Err(_) => return ConnectionError::ReadTimeout,
            Ok(None) => return ConnectionError::ClosedByPeer,
            Ok(Some(Err(e))) => return ConnectionError::Socket(e.to_string()),
            Ok(Some(Ok(message))) => message,
        };

        match message {
            Message::Text(text) => {
                if text.len() > limits.max_frame_bytes {
                    return ConnectionError::FrameTooLarge {
                        len: text.len(),
                        max: limits.max_frame_bytes,
                    };
                }
                if let Some(line) = normalize_line(&text) {
                    on_line(line).await;
                }
            }
            Message::Pong(_) => {
                deadline = Instant::now() + limits.pong_wait;
            }
            Message::Ping(_) => {
                // Pong is handled automatically by axum
            }
            Message::Binary(data) => {
                if data.len() > limits.max_frame_bytes {
                    return ConnectionError::FrameTooLarge {
                        len: data.len(),
                        max: limits.max_frame_bytes,
                    };
                }
                tracing::trace!(len = data.len(), "Ignoring binary frame");
            }
            Message::Close(_) => return ConnectionError::ClosedByPeer,
        }
    }
}
