// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel registry and publish/subscribe entry points.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use parley_core::{ChannelKey, HubEvent};
use tracing::{debug, trace, warn};

use crate::queue::{Pushed, SubscriberQueue};
use crate::stream::FrameStream;

/// Hub tuning, built from `HubConfig` by the binary.
#[derive(Debug, Clone)]
pub struct HubSettings {
    /// Idle time after which a stream emits a heartbeat frame.
    pub keepalive: Duration,
    /// Reconnect hint sent as the first frame of every stream.
    pub retry: Duration,
    /// Maximum queued events per subscriber before the oldest is dropped.
    pub queue_capacity: usize,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            keepalive: Duration::from_secs(15),
            retry: Duration::from_millis(10_000),
            queue_capacity: 256,
        }
    }
}

/// Process-unique subscriber identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

type Members = HashMap<SubscriberId, Arc<SubscriberQueue>>;

struct HubInner {
    settings: HubSettings,
    channels: Mutex<HashMap<ChannelKey, Members>>,
    next_id: AtomicU64,
    shut_down: AtomicBool,
}

impl HubInner {
    fn channels(&self) -> MutexGuard<'_, HashMap<ChannelKey, Members>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, channel: &ChannelKey, id: SubscriberId) -> bool {
        let removed = {
            let mut channels = self.channels();
            let Some(members) = channels.get_mut(channel) else {
                return false;
            };
            let removed = members.remove(&id);
            if members.is_empty() {
                channels.remove(channel);
                trace!(%channel, "channel collected");
            }
            removed
        };
        match removed {
            Some(queue) => {
                queue.close();
                debug!(%channel, subscriber_id = %id, "subscriber removed");
                true
            }
            None => false,
        }
    }
}

/// In-memory publish/subscribe hub.
///
/// Channels are created on first subscribe and collected when their last
/// subscriber leaves. The registry lock only guards membership; publishing
/// snapshots the member set and enqueues outside the lock, and streams wait
/// without holding it. Cloning yields another handle to the same hub.
#[derive(Clone)]
pub struct EventHub {
    inner: Arc<HubInner>,
}

impl EventHub {
    pub fn new(settings: HubSettings) -> Self {
        Self {
            inner: Arc::new(HubInner {
                settings,
                channels: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    pub fn settings(&self) -> &HubSettings {
        &self.inner.settings
    }

    /// Register a new subscriber on `channel` and return its live stream.
    ///
    /// The stream yields a [`Frame::Retry`](crate::Frame::Retry) first, then
    /// every event published to the channel from now on, with heartbeats in
    /// idle periods. Dropping the stream unsubscribes.
    pub fn subscribe(&self, channel: ChannelKey) -> (SubscriberHandle, FrameStream) {
        let id = SubscriberId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let queue = Arc::new(SubscriberQueue::new(self.inner.settings.queue_capacity));

        if self.inner.shut_down.load(Ordering::Acquire) {
            queue.close();
        } else {
            let mut channels = self.inner.channels();
            channels
                .entry(channel.clone())
                .or_default()
                .insert(id, Arc::clone(&queue));
        }
        debug!(%channel, subscriber_id = %id, "subscriber added");

        let handle = SubscriberHandle {
            id,
            channel,
            hub: Arc::downgrade(&self.inner),
        };
        let stream = FrameStream::new(
            handle.clone(),
            queue,
            self.inner.settings.retry,
            self.inner.settings.keepalive,
        );
        (handle, stream)
    }

    /// Remove a subscriber. Idempotent; returns whether it was still registered.
    pub fn unsubscribe(&self, handle: &SubscriberHandle) -> bool {
        self.inner.remove(&handle.channel, handle.id)
    }

    /// Enqueue `event` for every current subscriber of `channel`.
    ///
    /// Never blocks and never fails: a channel without subscribers drops the
    /// event, and a full subscriber queue loses its oldest event. Returns the
    /// number of subscribers the event was queued for.
    pub fn publish(&self, channel: &ChannelKey, event: HubEvent) -> usize {
        let members: Vec<(SubscriberId, Arc<SubscriberQueue>)> = {
            let channels = self.inner.channels();
            match channels.get(channel) {
                Some(members) => members
                    .iter()
                    .map(|(id, queue)| (*id, Arc::clone(queue)))
                    .collect(),
                None => Vec::new(),
            }
        };

        if members.is_empty() {
            trace!(%channel, kind = event.name(), "publish to empty channel dropped");
            return 0;
        }

        let event = Arc::new(event);
        let mut delivered = 0;
        for (id, queue) in members {
            match queue.push(Arc::clone(&event)) {
                Pushed::Queued => delivered += 1,
                Pushed::Evicted => {
                    delivered += 1;
                    warn!(
                        %channel,
                        subscriber_id = %id,
                        dropped_total = queue.dropped(),
                        "subscriber queue full, dropped oldest event"
                    );
                }
                Pushed::Closed => {}
            }
        }
        trace!(%channel, kind = event.name(), delivered, "event published");
        delivered
    }

    /// Number of live subscribers on `channel`.
    pub fn subscriber_count(&self, channel: &ChannelKey) -> usize {
        self.inner
            .channels()
            .get(channel)
            .map(HashMap::len)
            .unwrap_or(0)
    }

    /// Number of channels that currently have at least one subscriber.
    pub fn channel_count(&self) -> usize {
        self.inner.channels().len()
    }

    /// Close every live stream and refuse new subscribers.
    ///
    /// Streams end once they have drained what was already queued.
    pub fn shutdown(&self) {
        self.inner.shut_down.store(true, Ordering::Release);
        let drained: Vec<Members> = self.inner.channels().drain().map(|(_, m)| m).collect();
        let mut closed = 0;
        for members in drained {
            for queue in members.into_values() {
                queue.close();
                closed += 1;
            }
        }
        debug!(closed, "event hub shut down");
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(HubSettings::default())
    }
}

impl fmt::Debug for EventHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHub")
            .field("settings", &self.inner.settings)
            .field("channels", &self.channel_count())
            .finish()
    }
}

/// Identifies one subscriber. Cheap to clone; does not keep the hub alive.
#[derive(Clone)]
pub struct SubscriberHandle {
    id: SubscriberId,
    channel: ChannelKey,
    hub: Weak<HubInner>,
}

impl SubscriberHandle {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn channel(&self) -> &ChannelKey {
        &self.channel
    }

    /// Remove this subscriber from its channel. Idempotent.
    pub fn unsubscribe(&self) -> bool {
        match self.hub.upgrade() {
            Some(hub) => hub.remove(&self.channel, self.id),
            None => false,
        }
    }
}

impl fmt::Debug for SubscriberHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberHandle")
            .field("id", &self.id)
            .field("channel", &self.channel.to_string())
            .finish()
    }
}
