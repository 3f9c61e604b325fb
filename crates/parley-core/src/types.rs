// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the stores, the relay, and the gateway.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::ParleyError;

/// Client-generated identifier of one visitor conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    /// Parse a raw identifier, trimming whitespace. Empty ids are rejected.
    pub fn parse(raw: &str) -> Result<Self, ParleyError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ParleyError::invalid("conversation_id must not be empty"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Globally unique, role-prefixed message identifier (`v_…`, `a_…`, `b_…`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    /// Generate a fresh identifier for a message written by `role`.
    pub fn generate(role: Role) -> Self {
        let hex = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("{}_{}", role.id_prefix(), &hex[..12]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Author of a persisted message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    Visitor,
    Agent,
    Bot,
}

impl Role {
    fn id_prefix(self) -> char {
        match self {
            Role::Visitor => 'v',
            Role::Agent => 'a',
            Role::Bot => 'b',
        }
    }
}

/// One side of a conversation: the visitor or the agent console.
///
/// Used for typing indicators and read receipts, where the bot counts as the
/// agent side.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Party {
    Visitor,
    Agent,
}

impl Party {
    pub fn opposite(self) -> Party {
        match self {
            Party::Visitor => Party::Agent,
            Party::Agent => Party::Visitor,
        }
    }

    /// Roles whose messages this party acknowledges when marking them seen.
    pub fn acknowledges(self) -> &'static [Role] {
        match self {
            Party::Agent => &[Role::Visitor],
            Party::Visitor => &[Role::Agent, Role::Bot],
        }
    }
}

/// A persisted chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub role: Role,
    pub text: String,
    pub created_at: DateTime<Utc>,
    /// Meaningful for `visitor` messages only.
    pub seen_by_agent: bool,
    /// Meaningful for `agent` and `bot` messages only.
    pub seen_by_client: bool,
}

impl Message {
    /// Build a new, unseen message stamped at `created_at`.
    pub fn new(
        conversation_id: ConversationId,
        role: Role,
        text: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MessageId::generate(role),
            conversation_id,
            role,
            text: text.into(),
            created_at,
            seen_by_agent: false,
            seen_by_client: false,
        }
    }
}

/// The agent presence singleton.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentPresence {
    pub online: bool,
    pub display_name: String,
    /// `None` until the presence has been toggled for the first time.
    pub last_toggled_at: Option<DateTime<Utc>>,
}

/// Visitor-side presence for one conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientPresence {
    pub conversation_id: ConversationId,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub online: bool,
}

/// Result of recording visitor activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientTouch {
    pub presence: ClientPresence,
    /// True when this activity created the conversation.
    pub created: bool,
}

/// One row of the agent console's conversation list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub conversation_id: ConversationId,
    pub last_seen_at: DateTime<Utc>,
    pub online: bool,
    /// Visitor messages not yet seen by the agent.
    pub unread_count: u64,
}

/// Opaque agent session token. The `Debug` output never contains the secret.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken([redacted])")
    }
}

/// Health status reported by collaborator health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Unhealthy(String),
}
