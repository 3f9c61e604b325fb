// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Live frame streams handed out by [`EventHub::subscribe`](crate::EventHub::subscribe).

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::stream::{self, BoxStream, Stream, StreamExt};
use parley_core::HubEvent;

use crate::hub::SubscriberHandle;
use crate::queue::SubscriberQueue;

/// One item of a subscriber's output stream.
#[derive(Debug, Clone)]
pub enum Frame {
    /// Connection-priming hint: how long a client should wait before reconnecting.
    /// Always the first frame.
    Retry(Duration),
    /// A published event.
    Event(Arc<HubEvent>),
    /// Keep-alive emitted when nothing was published for one keep-alive interval.
    /// Carries no payload.
    Heartbeat,
}

/// A never-ending feed of frames for one subscriber.
///
/// The stream only ends once its subscriber has been unsubscribed (or the hub
/// shut down) and every queued event has been drained. Dropping the stream
/// unsubscribes it.
pub struct FrameStream {
    inner: BoxStream<'static, Frame>,
    handle: SubscriberHandle,
}

struct State {
    queue: Arc<SubscriberQueue>,
    retry: Option<Duration>,
    keepalive: Duration,
}

impl FrameStream {
    pub(crate) fn new(
        handle: SubscriberHandle,
        queue: Arc<SubscriberQueue>,
        retry: Duration,
        keepalive: Duration,
    ) -> Self {
        let state = State {
            queue,
            retry: Some(retry),
            keepalive,
        };
        let inner = stream::unfold(state, |mut state| async move {
            if let Some(retry) = state.retry.take() {
                return Some((Frame::Retry(retry), state));
            }
            loop {
                if let Some(event) = state.queue.pop() {
                    return Some((Frame::Event(event), state));
                }
                if state.queue.is_closed() {
                    return None;
                }
                let woke = tokio::time::timeout(state.keepalive, state.queue.wait())
                    .await
                    .is_ok();
                if !woke {
                    return Some((Frame::Heartbeat, state));
                }
            }
        })
        .boxed();
        Self { inner, handle }
    }

    /// Handle of the subscriber feeding this stream.
    pub fn handle(&self) -> &SubscriberHandle {
        &self.handle
    }
}

impl Stream for FrameStream {
    type Item = Frame;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Frame>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl Drop for FrameStream {
    fn drop(&mut self) {
        self.handle.unsubscribe();
    }
}

impl std::fmt::Debug for FrameStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameStream")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}
