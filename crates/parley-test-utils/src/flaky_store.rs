// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Store wrapper whose writes can be switched to fail.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use parley_core::{
    AgentPresence, ClientPresence, ClientTouch, ConversationId, ConversationSummary,
    HealthStatus, Message, MessageId, MessageStore, ParleyError, Party, PresenceStore,
};
use parley_storage::SqliteStore;

/// Delegates to a real [`SqliteStore`]. While [`fail_writes`](Self::fail_writes)
/// is on, every mutating call fails with a storage error and leaves the
/// database untouched. Reads always succeed.
pub struct FlakyStore {
    inner: Arc<SqliteStore>,
    failing: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: Arc<SqliteStore>) -> Self {
        Self {
            inner,
            failing: AtomicBool::new(false),
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.failing.store(fail, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &SqliteStore {
        &self.inner
    }

    fn check_write(&self, operation: &str) -> Result<(), ParleyError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(ParleyError::storage(format!("injected failure: {operation}")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MessageStore for FlakyStore {
    async fn append_message(&self, message: &Message) -> Result<(), ParleyError> {
        self.check_write("append_message")?;
        self.inner.append_message(message).await
    }

    async fn append_if_active(&self, message: &Message) -> Result<bool, ParleyError> {
        self.check_write("append_if_active")?;
        self.inner.append_if_active(message).await
    }

    async fn recent_messages(
        &self,
        conversation_id: &ConversationId,
        limit: usize,
    ) -> Result<Vec<Message>, ParleyError> {
        self.inner.recent_messages(conversation_id, limit).await
    }

    async fn unseen_message_ids(
        &self,
        conversation_id: &ConversationId,
        by: Party,
    ) -> Result<Vec<MessageId>, ParleyError> {
        self.inner.unseen_message_ids(conversation_id, by).await
    }

    async fn mark_seen(
        &self,
        conversation_id: &ConversationId,
        by: Party,
        ids: &[MessageId],
    ) -> Result<Vec<MessageId>, ParleyError> {
        self.check_write("mark_seen")?;
        self.inner.mark_seen(conversation_id, by, ids).await
    }

    async fn delete_messages(&self, conversation_id: &ConversationId) -> Result<u64, ParleyError> {
        self.check_write("delete_messages")?;
        self.inner.delete_messages(conversation_id).await
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Ok(HealthStatus::Unhealthy("writes failing".to_string()));
        }
        MessageStore::health_check(self.inner.as_ref()).await
    }
}

#[async_trait]
impl PresenceStore for FlakyStore {
    async fn touch_client(
        &self,
        conversation_id: &ConversationId,
        online: bool,
        at: DateTime<Utc>,
    ) -> Result<ClientTouch, ParleyError> {
        self.check_write("touch_client")?;
        self.inner.touch_client(conversation_id, online, at).await
    }

    async fn client_presence(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<ClientPresence>, ParleyError> {
        self.inner.client_presence(conversation_id).await
    }

    async fn conversation_ids(&self) -> Result<Vec<ConversationId>, ParleyError> {
        self.inner.conversation_ids().await
    }

    async fn conversation_summaries(&self) -> Result<Vec<ConversationSummary>, ParleyError> {
        self.inner.conversation_summaries().await
    }

    async fn remove_client(&self, conversation_id: &ConversationId) -> Result<bool, ParleyError> {
        self.check_write("remove_client")?;
        self.inner.remove_client(conversation_id).await
    }

    async fn agent_presence(&self) -> Result<AgentPresence, ParleyError> {
        self.inner.agent_presence().await
    }

    async fn set_agent_presence(&self, presence: &AgentPresence) -> Result<(), ParleyError> {
        self.check_write("set_agent_presence")?;
        self.inner.set_agent_presence(presence).await
    }
}
