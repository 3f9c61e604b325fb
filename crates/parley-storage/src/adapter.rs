// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the relay's storage traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;
use tracing::debug;

use parley_config::model::StorageConfig;
use parley_core::{
    AgentPresence, ClientPresence, ClientTouch, ConversationId, ConversationSummary,
    HealthStatus, Message, MessageId, MessageStore, ParleyError, Party, PresenceStore,
};

use crate::database::{Database, map_tr_err};
use crate::queries::{messages, presence};

/// SQLite-backed message and presence store.
///
/// The database is opened by [`initialize`](SqliteStore::initialize); every
/// trait call before that fails with a storage error.
pub struct SqliteStore {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStore {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Open and migrate the configured database. Fails if called twice.
    pub async fn initialize(&self) -> Result<(), ParleyError> {
        let db = Database::open(&self.config.database_path, self.config.wal_mode).await?;
        self.db
            .set(db)
            .map_err(|_| ParleyError::storage("storage already initialized"))?;
        debug!(path = %self.config.database_path, "sqlite store initialized");
        Ok(())
    }

    /// Checkpoint the WAL. The connection itself closes when the store drops.
    pub async fn close(&self) -> Result<(), ParleyError> {
        self.db()?
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    fn db(&self) -> Result<&Database, ParleyError> {
        self.db
            .get()
            .ok_or_else(|| ParleyError::storage("storage not initialized"))
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn append_message(&self, message: &Message) -> Result<(), ParleyError> {
        messages::insert_message(self.db()?, message).await
    }

    async fn append_if_active(&self, message: &Message) -> Result<bool, ParleyError> {
        messages::insert_message_if_active(self.db()?, message).await
    }

    async fn recent_messages(
        &self,
        conversation_id: &ConversationId,
        limit: usize,
    ) -> Result<Vec<Message>, ParleyError> {
        messages::recent_messages(self.db()?, conversation_id, limit).await
    }

    async fn unseen_message_ids(
        &self,
        conversation_id: &ConversationId,
        by: Party,
    ) -> Result<Vec<MessageId>, ParleyError> {
        messages::unseen_message_ids(self.db()?, conversation_id, by).await
    }

    async fn mark_seen(
        &self,
        conversation_id: &ConversationId,
        by: Party,
        ids: &[MessageId],
    ) -> Result<Vec<MessageId>, ParleyError> {
        messages::mark_seen(self.db()?, conversation_id, by, ids).await
    }

    async fn delete_messages(&self, conversation_id: &ConversationId) -> Result<u64, ParleyError> {
        messages::delete_messages(self.db()?, conversation_id).await
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        self.db()?
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> { conn.execute_batch("SELECT 1;") })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl PresenceStore for SqliteStore {
    async fn touch_client(
        &self,
        conversation_id: &ConversationId,
        online: bool,
        at: DateTime<Utc>,
    ) -> Result<ClientTouch, ParleyError> {
        presence::touch_client(self.db()?, conversation_id, online, at).await
    }

    async fn client_presence(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<ClientPresence>, ParleyError> {
        presence::get_client(self.db()?, conversation_id).await
    }

    async fn conversation_ids(&self) -> Result<Vec<ConversationId>, ParleyError> {
        let clients = presence::list_clients(self.db()?).await?;
        Ok(clients.into_iter().map(|c| c.conversation_id).collect())
    }

    async fn conversation_summaries(&self) -> Result<Vec<ConversationSummary>, ParleyError> {
        presence::conversation_summaries(self.db()?).await
    }

    async fn remove_client(&self, conversation_id: &ConversationId) -> Result<bool, ParleyError> {
        presence::delete_client(self.db()?, conversation_id).await
    }

    async fn agent_presence(&self) -> Result<AgentPresence, ParleyError> {
        presence::get_agent(self.db()?).await
    }

    async fn set_agent_presence(&self, presence: &AgentPresence) -> Result<(), ParleyError> {
        presence::put_agent(self.db()?, presence).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::Role;
    use tempfile::tempdir;

    fn config(path: &std::path::Path) -> StorageConfig {
        StorageConfig {
            database_path: path.to_str().unwrap().to_string(),
            wal_mode: true,
        }
    }

    fn cid(raw: &str) -> ConversationId {
        ConversationId::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn calls_fail_before_initialize() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::new(config(&dir.path().join("early.db")));
        assert!(matches!(
            MessageStore::health_check(&store).await,
            Err(ParleyError::Storage { .. })
        ));
        assert!(store.agent_presence().await.is_err());
    }

    #[tokio::test]
    async fn initialize_twice_is_an_error() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::new(config(&dir.path().join("twice.db")));
        store.initialize().await.unwrap();
        assert!(store.initialize().await.is_err());
        assert_eq!(
            MessageStore::health_check(&store).await.unwrap(),
            HealthStatus::Healthy
        );
    }

    #[tokio::test]
    async fn conversation_lifecycle_through_traits() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::new(config(&dir.path().join("lifecycle.db")));
        store.initialize().await.unwrap();

        let now = Utc::now();
        let touch = store.touch_client(&cid("c1"), true, now).await.unwrap();
        assert!(touch.created);
        let message = Message::new(cid("c1"), Role::Visitor, "hello", now);
        store.append_message(&message).await.unwrap();

        assert_eq!(store.conversation_ids().await.unwrap(), vec![cid("c1")]);
        let unseen = store.unseen_message_ids(&cid("c1"), Party::Agent).await.unwrap();
        assert_eq!(unseen, vec![message.id.clone()]);

        assert_eq!(store.delete_messages(&cid("c1")).await.unwrap(), 1);
        assert!(store.remove_client(&cid("c1")).await.unwrap());
        assert!(store.client_presence(&cid("c1")).await.unwrap().is_none());
        store.close().await.unwrap();
    }
}
