// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process event hub for the Parley chat relay.
//!
//! The hub keeps a registry of named channels (`conversation:<id>` and
//! `agent-console`), each holding a set of subscribers. Every subscriber owns a
//! bounded queue and a [`FrameStream`] that drains it, so a stalled consumer
//! never slows down the publisher or its neighbours.
//!
//! The hub is purely transient: it persists nothing, and after a restart
//! clients simply reconnect and resubscribe.

mod hub;
mod queue;
mod stream;

pub use hub::{EventHub, HubSettings, SubscriberHandle, SubscriberId};
pub use stream::{Frame, FrameStream};
