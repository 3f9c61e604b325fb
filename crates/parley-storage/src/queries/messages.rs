// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message log and read-receipt queries.

use std::str::FromStr;

use parley_core::{ConversationId, Message, MessageId, ParleyError, Party, Role};
use rusqlite::{Row, params};

use crate::database::{Database, conversion_err, decode_ts, encode_ts, map_tr_err};

const COLUMNS: &str =
    "message_id, conversation_id, role, content, created_at, seen_by_agent, seen_by_client";

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    let conversation_id: String = row.get(1)?;
    let role: String = row.get(2)?;
    let created_at: String = row.get(4)?;
    Ok(Message {
        id: MessageId(row.get(0)?),
        conversation_id: ConversationId::parse(&conversation_id)
            .map_err(|e| conversion_err(1, e))?,
        role: Role::from_str(&role).map_err(|e| conversion_err(2, e))?,
        text: row.get(3)?,
        created_at: decode_ts(4, &created_at)?,
        seen_by_agent: row.get(5)?,
        seen_by_client: row.get(6)?,
    })
}

/// Column holding the receipt flag `by` sets.
fn seen_column(by: Party) -> &'static str {
    match by {
        Party::Agent => "seen_by_agent",
        Party::Visitor => "seen_by_client",
    }
}

/// `role IN (...)` filter for the roles `by` acknowledges.
fn acknowledged_roles(by: Party) -> String {
    let roles: Vec<String> = by
        .acknowledges()
        .iter()
        .map(|role| format!("'{role}'"))
        .collect();
    format!("role IN ({})", roles.join(", "))
}

pub async fn insert_message(db: &Database, msg: &Message) -> Result<(), ParleyError> {
    let msg = msg.clone();
    db.connection()
        .call(move |conn| -> rusqlite::Result<()> {
            conn.execute(
                "INSERT INTO messages
                     (message_id, conversation_id, role, content, created_at,
                      seen_by_agent, seen_by_client)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    msg.id.as_str(),
                    msg.conversation_id.as_str(),
                    msg.role.to_string(),
                    msg.text,
                    encode_ts(&msg.created_at),
                    msg.seen_by_agent,
                    msg.seen_by_client,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Insert `msg` only if its conversation still has a client row. The check
/// and the insert run as a single statement.
pub async fn insert_message_if_active(db: &Database, msg: &Message) -> Result<bool, ParleyError> {
    let msg = msg.clone();
    db.connection()
        .call(move |conn| -> rusqlite::Result<bool> {
            let inserted = conn.execute(
                "INSERT INTO messages
                     (message_id, conversation_id, role, content, created_at,
                      seen_by_agent, seen_by_client)
                 SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7
                 WHERE EXISTS (SELECT 1 FROM clients WHERE conversation_id = ?2)",
                params![
                    msg.id.as_str(),
                    msg.conversation_id.as_str(),
                    msg.role.to_string(),
                    msg.text,
                    encode_ts(&msg.created_at),
                    msg.seen_by_agent,
                    msg.seen_by_client,
                ],
            )?;
            Ok(inserted > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// The newest `limit` messages, returned oldest first.
pub async fn recent_messages(
    db: &Database,
    conversation_id: &ConversationId,
    limit: usize,
) -> Result<Vec<Message>, ParleyError> {
    let conversation_id = conversation_id.as_str().to_string();
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    db.connection()
        .call(move |conn| -> rusqlite::Result<Vec<Message>> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM (
                     SELECT id, {COLUMNS} FROM messages
                     WHERE conversation_id = ?1
                     ORDER BY id DESC LIMIT ?2
                 ) ORDER BY id ASC"
            ))?;
            let rows = stmt.query_map(params![conversation_id, limit], message_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn unseen_message_ids(
    db: &Database,
    conversation_id: &ConversationId,
    by: Party,
) -> Result<Vec<MessageId>, ParleyError> {
    let conversation_id = conversation_id.as_str().to_string();
    let sql = format!(
        "SELECT message_id FROM messages
         WHERE conversation_id = ?1 AND {} = 0 AND {}
         ORDER BY id ASC",
        seen_column(by),
        acknowledged_roles(by),
    );
    db.connection()
        .call(move |conn| -> rusqlite::Result<Vec<MessageId>> {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![conversation_id], |row| row.get(0).map(MessageId))?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Flag `ids` as seen by `by` in one transaction.
///
/// Returns the ids that matched the conversation and role filter, in the
/// order they were given, without duplicates.
pub async fn mark_seen(
    db: &Database,
    conversation_id: &ConversationId,
    by: Party,
    ids: &[MessageId],
) -> Result<Vec<MessageId>, ParleyError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let conversation_id = conversation_id.as_str().to_string();
    let ids = ids.to_vec();
    let sql = format!(
        "UPDATE messages SET {column} = 1
         WHERE conversation_id = ?1 AND message_id = ?2 AND {roles}",
        column = seen_column(by),
        roles = acknowledged_roles(by),
    );
    db.connection()
        .call(move |conn| -> rusqlite::Result<Vec<MessageId>> {
            let tx = conn.transaction()?;
            let mut marked: Vec<MessageId> = Vec::with_capacity(ids.len());
            {
                let mut stmt = tx.prepare(&sql)?;
                for id in ids {
                    if marked.contains(&id) {
                        continue;
                    }
                    if stmt.execute(params![conversation_id, id.as_str()])? > 0 {
                        marked.push(id);
                    }
                }
            }
            tx.commit()?;
            Ok(marked)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn delete_messages(
    db: &Database,
    conversation_id: &ConversationId,
) -> Result<u64, ParleyError> {
    let conversation_id = conversation_id.as_str().to_string();
    db.connection()
        .call(move |conn| -> rusqlite::Result<u64> {
            let removed = conn.execute(
                "DELETE FROM messages WHERE conversation_id = ?1",
                params![conversation_id],
            )?;
            Ok(removed as u64)
        })
        .await
        .map_err(map_tr_err)
}
