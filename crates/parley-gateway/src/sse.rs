// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Server-Sent Events endpoints.
//!
//! Each connection owns one hub subscriber and drains its frames:
//!
//! ```text
//! retry: 10000
//!
//! event: message
//! data: {"message":{...},"emitted_at":"..."}
//!
//! : ping
//! ```
//!
//! A visitor stream ends right after a `deleted` event. Closing the last
//! stream of a conversation marks the visitor offline.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

use axum::{
    extract::{Path, State},
    http::{HeaderName, HeaderValue, header},
    response::{
        IntoResponse, Response,
        sse::{Event, Sse},
    },
};
use futures::Stream;
use parley_core::{ChannelKey, ConversationId};
use parley_hub::{Frame, FrameStream};
use parley_relay::Coordinator;

use crate::error::ApiError;
use crate::server::GatewayState;

/// Render one hub frame as an SSE event. `None` when the payload cannot be
/// serialized (logged and skipped).
pub fn frame_to_event(frame: &Frame) -> Option<Event> {
    match frame {
        Frame::Retry(interval) => Some(Event::default().retry(*interval)),
        Frame::Heartbeat => Some(Event::default().comment("ping")),
        Frame::Event(event) => match event.data_json() {
            Ok(data) => Some(Event::default().event(event.name()).data(data)),
            Err(err) => {
                tracing::warn!(event = event.name(), error = %err, "dropping unserializable event");
                None
            }
        },
    }
}

/// Spawns `visitor_disconnected` when the visitor's stream is dropped.
struct DisconnectGuard {
    coordinator: Arc<Coordinator>,
    conversation_id: ConversationId,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let coordinator = Arc::clone(&self.coordinator);
        let conversation_id = self.conversation_id.clone();
        runtime.spawn(async move {
            if let Err(err) = coordinator.visitor_disconnected(&conversation_id).await {
                tracing::warn!(%conversation_id, error = %err, "failed to record visitor disconnect");
            }
        });
    }
}

/// SSE body for one subscriber.
pub struct EventFeed {
    // Dropped before `on_close`, so the subscriber is gone when the
    // disconnect hook runs.
    frames: FrameStream,
    finished: bool,
    on_close: Option<DisconnectGuard>,
}

impl EventFeed {
    pub fn new(frames: FrameStream) -> Self {
        Self {
            frames,
            finished: false,
            on_close: None,
        }
    }

    fn with_disconnect(mut self, coordinator: Arc<Coordinator>, conversation_id: ConversationId) -> Self {
        self.on_close = Some(DisconnectGuard {
            coordinator,
            conversation_id,
        });
        self
    }
}

impl Stream for EventFeed {
    type Item = Result<Event, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }
        loop {
            let Some(frame) = ready!(Pin::new(&mut self.frames).poll_next(cx)) else {
                self.finished = true;
                return Poll::Ready(None);
            };
            if let Frame::Event(event) = &frame
                && event.kind.is_terminal()
            {
                self.finished = true;
            }
            if let Some(event) = frame_to_event(&frame) {
                return Poll::Ready(Some(Ok(event)));
            }
            if self.finished {
                return Poll::Ready(None);
            }
        }
    }
}

fn streaming_response(feed: EventFeed) -> Response {
    (
        [
            (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
            (
                HeaderName::from_static("x-accel-buffering"),
                HeaderValue::from_static("no"),
            ),
        ],
        Sse::new(feed),
    )
        .into_response()
}

/// GET /sse/stream/{conversation_id}
pub async fn visitor_stream(
    State(state): State<GatewayState>,
    Path(conversation_id): Path<String>,
) -> Result<Response, ApiError> {
    let conversation_id = ConversationId::parse(&conversation_id)?;
    let (handle, frames) = state
        .coordinator
        .hub()
        .subscribe(ChannelKey::conversation(&conversation_id));
    tracing::debug!(%conversation_id, subscriber_id = %handle.id(), "visitor stream opened");

    // On failure `frames` is dropped here, which unsubscribes it.
    state.coordinator.visitor_connected(&conversation_id).await?;

    let feed = EventFeed::new(frames).with_disconnect(Arc::clone(&state.coordinator), conversation_id);
    Ok(streaming_response(feed))
}

/// GET /sse/admin
pub async fn admin_stream(State(state): State<GatewayState>) -> Response {
    let (handle, frames) = state.coordinator.hub().subscribe(ChannelKey::AgentConsole);
    tracing::debug!(subscriber_id = %handle.id(), "agent console stream opened");
    streaming_response(EventFeed::new(frames))
}
