// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded per-subscriber delivery queue with drop-oldest overflow.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use parley_core::HubEvent;
use tokio::sync::Notify;

/// Events waiting to be drained by one subscriber stream.
///
/// Pushing never blocks. When the queue is full the oldest queued event is
/// discarded for this subscriber only.
#[derive(Debug)]
pub(crate) struct SubscriberQueue {
    events: Mutex<VecDeque<Arc<HubEvent>>>,
    capacity: usize,
    notify: Notify,
    closed: AtomicBool,
    dropped: AtomicU64,
}

/// Outcome of a push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pushed {
    Queued,
    /// Queued after evicting the oldest event.
    Evicted,
    /// The subscriber has been closed; the event was discarded.
    Closed,
}

impl SubscriberQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(capacity.min(64))),
            capacity: capacity.max(1),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        }
    }

    pub(crate) fn push(&self, event: Arc<HubEvent>) -> Pushed {
        if self.is_closed() {
            return Pushed::Closed;
        }
        let outcome = {
            let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
            let outcome = if events.len() >= self.capacity {
                events.pop_front();
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Pushed::Evicted
            } else {
                Pushed::Queued
            };
            events.push_back(event);
            outcome
        };
        self.notify.notify_one();
        outcome
    }

    pub(crate) fn pop(&self) -> Option<Arc<HubEvent>> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    /// Wait until something is pushed or the queue is closed.
    ///
    /// A push that lands before this is awaited leaves a stored permit, so the
    /// check-then-wait sequence in the stream cannot miss a wakeup.
    pub(crate) async fn wait(&self) {
        self.notify.notified().await;
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
