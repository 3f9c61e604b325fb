// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage collaborator traits.
//!
//! Every mutating call commits before it returns; the relay relies on this to
//! publish events only for data that is already recorded.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ParleyError;
use crate::types::{
    AgentPresence, ClientPresence, ClientTouch, ConversationId, ConversationSummary,
    HealthStatus, Message, MessageId, Party,
};

/// Durable per-conversation message log with read-receipt flags.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Append a message to its conversation.
    async fn append_message(&self, message: &Message) -> Result<(), ParleyError>;

    /// Append a message only while its conversation still exists.
    ///
    /// The existence check and the insert are one atomic step, so a
    /// concurrent delete either removes the message or causes it to be
    /// refused. Returns `false` when the conversation is gone.
    async fn append_if_active(&self, message: &Message) -> Result<bool, ParleyError>;

    /// The newest `limit` messages of a conversation, oldest first.
    async fn recent_messages(
        &self,
        conversation_id: &ConversationId,
        limit: usize,
    ) -> Result<Vec<Message>, ParleyError>;

    /// Ids of messages `by` has not yet seen, in insertion order.
    async fn unseen_message_ids(
        &self,
        conversation_id: &ConversationId,
        by: Party,
    ) -> Result<Vec<MessageId>, ParleyError>;

    /// Set the seen flag for `by` on the given ids.
    ///
    /// Ids that do not belong to the conversation, or were not written by the
    /// opposite side, are ignored. Returns the ids that now carry the flag.
    async fn mark_seen(
        &self,
        conversation_id: &ConversationId,
        by: Party,
        ids: &[MessageId],
    ) -> Result<Vec<MessageId>, ParleyError>;

    /// Delete every message of a conversation. Returns the number removed.
    async fn delete_messages(&self, conversation_id: &ConversationId) -> Result<u64, ParleyError>;

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        Ok(HealthStatus::Healthy)
    }
}

/// Agent and visitor presence records.
#[async_trait]
pub trait PresenceStore: Send + Sync {
    /// Record visitor activity, creating the presence row on first contact.
    async fn touch_client(
        &self,
        conversation_id: &ConversationId,
        online: bool,
        at: DateTime<Utc>,
    ) -> Result<ClientTouch, ParleyError>;

    async fn client_presence(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<ClientPresence>, ParleyError>;

    /// Every known conversation.
    async fn conversation_ids(&self) -> Result<Vec<ConversationId>, ParleyError>;

    /// Conversation list with unread counts, most recently active first.
    async fn conversation_summaries(&self) -> Result<Vec<ConversationSummary>, ParleyError>;

    /// Remove a conversation's presence row. Returns whether it existed.
    async fn remove_client(&self, conversation_id: &ConversationId) -> Result<bool, ParleyError>;

    async fn agent_presence(&self) -> Result<AgentPresence, ParleyError>;

    async fn set_agent_presence(&self, presence: &AgentPresence) -> Result<(), ParleyError>;
}
