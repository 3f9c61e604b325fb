// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Visitor and agent presence queries.

use chrono::{DateTime, Utc};
use parley_core::{
    AgentPresence, ClientPresence, ClientTouch, ConversationId, ConversationSummary, ParleyError,
};
use rusqlite::{OptionalExtension, Row, params};

use crate::database::{Database, conversion_err, decode_ts, encode_ts, map_tr_err};

fn client_from_row(row: &Row<'_>) -> rusqlite::Result<ClientPresence> {
    let conversation_id: String = row.get(0)?;
    let created_at: String = row.get(1)?;
    let last_seen_at: String = row.get(2)?;
    Ok(ClientPresence {
        conversation_id: ConversationId::parse(&conversation_id)
            .map_err(|e| conversion_err(0, e))?,
        created_at: decode_ts(1, &created_at)?,
        last_seen_at: decode_ts(2, &last_seen_at)?,
        online: row.get(3)?,
    })
}

/// Upsert the visitor row: refresh `last_seen_at` and `online`, creating the
/// row (with `created_at = at`) on first contact.
pub async fn touch_client(
    db: &Database,
    conversation_id: &ConversationId,
    online: bool,
    at: DateTime<Utc>,
) -> Result<ClientTouch, ParleyError> {
    let conversation_id = conversation_id.as_str().to_string();
    let at = encode_ts(&at);
    db.connection()
        .call(move |conn| -> rusqlite::Result<ClientTouch> {
            let tx = conn.transaction()?;
            let created = tx.execute(
                "INSERT OR IGNORE INTO clients (conversation_id, created_at, last_seen_at, online)
                 VALUES (?1, ?2, ?2, ?3)",
                params![conversation_id, at, online],
            )? > 0;
            if !created {
                tx.execute(
                    "UPDATE clients SET last_seen_at = ?2, online = ?3 WHERE conversation_id = ?1",
                    params![conversation_id, at, online],
                )?;
            }
            let presence = tx.query_row(
                "SELECT conversation_id, created_at, last_seen_at, online
                 FROM clients WHERE conversation_id = ?1",
                params![conversation_id],
                client_from_row,
            )?;
            tx.commit()?;
            Ok(ClientTouch { presence, created })
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_client(
    db: &Database,
    conversation_id: &ConversationId,
) -> Result<Option<ClientPresence>, ParleyError> {
    let conversation_id = conversation_id.as_str().to_string();
    db.connection()
        .call(move |conn| -> rusqlite::Result<Option<ClientPresence>> {
            conn.query_row(
                "SELECT conversation_id, created_at, last_seen_at, online
                 FROM clients WHERE conversation_id = ?1",
                params![conversation_id],
                client_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// All visitor rows, most recently seen first.
pub async fn list_clients(db: &Database) -> Result<Vec<ClientPresence>, ParleyError> {
    db.connection()
        .call(|conn| -> rusqlite::Result<Vec<ClientPresence>> {
            let mut stmt = conn.prepare(
                "SELECT conversation_id, created_at, last_seen_at, online
                 FROM clients ORDER BY last_seen_at DESC, conversation_id ASC",
            )?;
            let rows = stmt.query_map([], client_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Visitor rows joined with their unread visitor-message counts, most
/// recently seen first.
pub async fn conversation_summaries(db: &Database) -> Result<Vec<ConversationSummary>, ParleyError> {
    db.connection()
        .call(|conn| -> rusqlite::Result<Vec<ConversationSummary>> {
            let mut stmt = conn.prepare(
                "SELECT c.conversation_id, c.created_at, c.last_seen_at, c.online,
                        COUNT(m.id)
                 FROM clients c
                 LEFT JOIN messages m
                   ON m.conversation_id = c.conversation_id
                  AND m.role = 'visitor'
                  AND m.seen_by_agent = 0
                 GROUP BY c.conversation_id
                 ORDER BY c.last_seen_at DESC, c.conversation_id ASC",
            )?;
            let rows = stmt.query_map([], |row| {
                let client = client_from_row(row)?;
                let unread: i64 = row.get(4)?;
                Ok(ConversationSummary {
                    conversation_id: client.conversation_id,
                    last_seen_at: client.last_seen_at,
                    online: client.online,
                    unread_count: u64::try_from(unread).unwrap_or(0),
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn delete_client(
    db: &Database,
    conversation_id: &ConversationId,
) -> Result<bool, ParleyError> {
    let conversation_id = conversation_id.as_str().to_string();
    db.connection()
        .call(move |conn| -> rusqlite::Result<bool> {
            let removed = conn.execute(
                "DELETE FROM clients WHERE conversation_id = ?1",
                params![conversation_id],
            )?;
            Ok(removed > 0)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_agent(db: &Database) -> Result<AgentPresence, ParleyError> {
    db.connection()
        .call(|conn| -> rusqlite::Result<AgentPresence> {
            let row = conn
                .query_row(
                    "SELECT online, display_name, last_toggled_at FROM agent_presence WHERE id = 1",
                    [],
                    |row| {
                        let toggled: Option<String> = row.get(2)?;
                        Ok(AgentPresence {
                            online: row.get(0)?,
                            display_name: row.get(1)?,
                            last_toggled_at: toggled
                                .as_deref()
                                .map(|raw| decode_ts(2, raw))
                                .transpose()?,
                        })
                    },
                )
                .optional()?;
            Ok(row.unwrap_or_else(|| AgentPresence {
                online: false,
                display_name: String::new(),
                last_toggled_at: None,
            }))
        })
        .await
        .map_err(map_tr_err)
}

pub async fn put_agent(db: &Database, presence: &AgentPresence) -> Result<(), ParleyError> {
    let online = presence.online;
    let display_name = presence.display_name.clone();
    let toggled = presence.last_toggled_at.as_ref().map(encode_ts);
    db.connection()
        .call(move |conn| -> rusqlite::Result<()> {
            conn.execute(
                "INSERT INTO agent_presence (id, online, display_name, last_toggled_at)
                 VALUES (1, ?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET
                     online = excluded.online,
                     display_name = excluded.display_name,
                     last_toggled_at = excluded.last_toggled_at",
                params![online, display_name, toggled],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
