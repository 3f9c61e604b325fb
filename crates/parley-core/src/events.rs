// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Events carried by the hub and the channels they travel on.
//!
//! Every event kind has a fixed payload shape. Consumers match on
//! [`HubEventKind`] exhaustively; the wire name of each kind is what
//! appears in the SSE `event:` field.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AgentPresence, ConversationId, Message, MessageId, Party};

/// Key of a broadcast channel in the hub.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChannelKey {
    /// One channel per visitor conversation.
    Conversation(ConversationId),
    /// Shared by every connected agent-console view.
    AgentConsole,
}

impl ChannelKey {
    pub fn conversation(id: &ConversationId) -> Self {
        ChannelKey::Conversation(id.clone())
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKey::Conversation(id) => write!(f, "conversation:{id}"),
            ChannelKey::AgentConsole => f.write_str("agent-console"),
        }
    }
}

/// A published event. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HubEvent {
    #[serde(flatten)]
    pub kind: HubEventKind,
    pub emitted_at: DateTime<Utc>,
}

impl HubEvent {
    /// Stamp `kind` with the current time.
    pub fn now(kind: HubEventKind) -> Self {
        Self {
            kind,
            emitted_at: Utc::now(),
        }
    }

    /// Wire name of the event kind.
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Payload rendered as a JSON object with `emitted_at` added.
    pub fn data_json(&self) -> Result<String, serde_json::Error> {
        let mut value = self.kind.payload_value()?;
        if let serde_json::Value::Object(map) = &mut value {
            map.insert(
                "emitted_at".to_string(),
                serde_json::to_value(self.emitted_at)?,
            );
        }
        serde_json::to_string(&value)
    }
}

/// The closed set of event kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum HubEventKind {
    Message(MessagePayload),
    Typing(TypingPayload),
    Seen(SeenPayload),
    AgentStatus(AgentStatusPayload),
    ClientsListChanged(ConversationRef),
    Deleted(ConversationRef),
}

impl HubEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            HubEventKind::Message(_) => "message",
            HubEventKind::Typing(_) => "typing",
            HubEventKind::Seen(_) => "seen",
            HubEventKind::AgentStatus(_) => "agent_status",
            HubEventKind::ClientsListChanged(_) => "clients_list_changed",
            HubEventKind::Deleted(_) => "deleted",
        }
    }

    /// True for events after which the receiving stream should close.
    pub fn is_terminal(&self) -> bool {
        matches!(self, HubEventKind::Deleted(_))
    }

    fn payload_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            HubEventKind::Message(p) => serde_json::to_value(p),
            HubEventKind::Typing(p) => serde_json::to_value(p),
            HubEventKind::Seen(p) => serde_json::to_value(p),
            HubEventKind::AgentStatus(p) => serde_json::to_value(p),
            HubEventKind::ClientsListChanged(p) | HubEventKind::Deleted(p) => {
                serde_json::to_value(p)
            }
        }
    }
}

/// A new message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub message: Message,
    /// Echo of the sender's optimistic-UI id, if it supplied one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_temp_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingPayload {
    pub conversation_id: ConversationId,
    pub who: Party,
    pub state: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeenPayload {
    pub conversation_id: ConversationId,
    pub by: Party,
    pub message_ids: Vec<MessageId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStatusPayload {
    pub online: bool,
    pub display_name: String,
    pub last_toggled_at: Option<DateTime<Utc>>,
}

impl From<&AgentPresence> for AgentStatusPayload {
    fn from(presence: &AgentPresence) -> Self {
        Self {
            online: presence.online,
            display_name: presence.display_name.clone(),
            last_toggled_at: presence.last_toggled_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationRef {
    pub conversation_id: ConversationId,
}
