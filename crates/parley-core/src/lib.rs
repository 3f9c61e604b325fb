// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Parley chat relay.
//!
//! Defines the error taxonomy, the conversation and presence data model, the
//! typed hub events, and the traits the relay uses to reach its collaborators
//! (message/presence storage, the automated responder, agent sessions).

pub mod error;
pub mod events;
pub mod traits;
pub mod types;

pub use error::ParleyError;
pub use events::{ChannelKey, HubEvent, HubEventKind};
pub use traits::{MessageStore, PresenceStore, Responder, SessionAuthority};
pub use types::{
    AgentPresence, ClientPresence, ClientTouch, ConversationId, ConversationSummary,
    HealthStatus, Message, MessageId, Party, Role, SessionToken,
};
