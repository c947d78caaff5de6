use crate::Database;
use crate::models::{ConversationRow, MessageRow, UserRow};
use anyhow::Result;
use rusqlite::Connection;

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        username: &str,
        password_hash: &str,
        created_at: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, password, created_at) VALUES (?1, ?2, ?3, ?4)",
                (id, username, password_hash, created_at),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    /// Best-effort mirror of the in-memory presence registry.
    pub fn set_presence(&self, user_id: &str, online: bool, last_seen: Option<&str>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET is_online = ?2, last_seen = COALESCE(?3, last_seen) WHERE id = ?1",
                rusqlite::params![user_id, online, last_seen],
            )?;
            Ok(())
        })
    }

    // -- Conversations --

    /// Insert a conversation and its initial participants in one critical
    /// section. Returns false when `dm_key` already exists: the caller
    /// lost a first-contact race and should re-fetch.
    pub fn insert_conversation(
        &self,
        id: &str,
        kind: &str,
        name: Option<&str>,
        admin_id: Option<&str>,
        dm_key: Option<&str>,
        participants: &[String],
        created_at: &str,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO conversations (id, kind, name, admin_id, dm_key, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id, kind, name, admin_id, dm_key, created_at],
            )?;

            if inserted == 0 {
                return Ok(false);
            }

            for user_id in participants {
                conn.execute(
                    "INSERT INTO conversation_participants (conversation_id, user_id) VALUES (?1, ?2)",
                    (id, user_id.as_str()),
                )?;
            }

            Ok(true)
        })
    }

    pub fn get_conversation(&self, id: &str) -> Result<Option<ConversationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, kind, name, admin_id, created_at FROM conversations WHERE id = ?1",
            )?;
            stmt.query_row([id], conversation_from_row).optional()
        })
    }

    pub fn find_dm_conversation(&self, dm_key: &str) -> Result<Option<ConversationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, kind, name, admin_id, created_at FROM conversations WHERE dm_key = ?1",
            )?;
            stmt.query_row([dm_key], conversation_from_row).optional()
        })
    }

    pub fn get_participants(&self, conversation_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id FROM conversation_participants
                 WHERE conversation_id = ?1 ORDER BY rowid",
            )?;
            let rows = stmt
                .query_map([conversation_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(rows)
        })
    }

    pub fn add_participant(&self, conversation_id: &str, user_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO conversation_participants (conversation_id, user_id) VALUES (?1, ?2)",
                (conversation_id, user_id),
            )?;
            Ok(())
        })
    }

    pub fn remove_participant(&self, conversation_id: &str, user_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM conversation_participants WHERE conversation_id = ?1 AND user_id = ?2",
                (conversation_id, user_id),
            )?;
            Ok(())
        })
    }

    pub fn rename_conversation(&self, id: &str, name: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE conversations SET name = ?2 WHERE id = ?1",
                (id, name),
            )?;
            Ok(())
        })
    }

    // -- Messages --

    #[allow(clippy::too_many_arguments)]
    pub fn insert_message(
        &self,
        id: &str,
        conversation_id: &str,
        sender_id: &str,
        content: &str,
        nonce: Option<&str>,
        signature: Option<&str>,
        reply_to: Option<&str>,
        created_at: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, conversation_id, sender_id, content, nonce, signature, reply_to, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![id, conversation_id, sender_id, content, nonce, signature, reply_to, created_at],
            )?;
            Ok(())
        })
    }

    pub fn get_message(&self, id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{MESSAGE_SELECT} WHERE m.id = ?1"))?;
            stmt.query_row([id], message_from_row).optional()
        })
    }

    /// Replace content and tag the message `Edited`. The WHERE clause
    /// guards the terminal state: returns false when the message is gone
    /// or already deleted.
    pub fn update_message_content(&self, id: &str, content: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE messages SET content = ?2, modification = 'Edited'
                 WHERE id = ?1 AND (modification IS NULL OR modification = 'Edited')",
                (id, content),
            )?;
            Ok(changed > 0)
        })
    }

    /// Apply a delete-style modification tag, retaining content. Same
    /// terminal-state guard as `update_message_content`.
    pub fn mark_message(&self, id: &str, modification: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE messages SET modification = ?2
                 WHERE id = ?1 AND (modification IS NULL OR modification = 'Edited')",
                (id, modification),
            )?;
            Ok(changed > 0)
        })
    }

    pub fn count_messages(&self, conversation_id: &str) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE conversation_id = ?1",
                [conversation_id],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }

    /// One page of a conversation's history, newest first. Callers reverse
    /// the page to present it chronologically.
    pub fn get_messages_page(
        &self,
        conversation_id: &str,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{MESSAGE_SELECT}
                 WHERE m.conversation_id = ?1
                 ORDER BY m.created_at DESC, m.rowid DESC
                 LIMIT ?2 OFFSET ?3"
            ))?;

            let rows = stmt
                .query_map(
                    rusqlite::params![conversation_id, limit, offset as i64],
                    message_from_row,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

// JOIN users to fetch sender_username in a single query (eliminates N+1)
const MESSAGE_SELECT: &str = "SELECT m.id, m.conversation_id, m.sender_id, u.username,
        m.content, m.nonce, m.signature, m.reply_to, m.modification, m.created_at
 FROM messages m
 LEFT JOIN users u ON m.sender_id = u.id";

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, username, password, is_online, last_seen, created_at
         FROM users WHERE {column} = ?1"
    ))?;

    stmt.query_row([value], |row| {
        Ok(UserRow {
            id: row.get(0)?,
            username: row.get(1)?,
            password: row.get(2)?,
            is_online: row.get(3)?,
            last_seen: row.get(4)?,
            created_at: row.get(5)?,
        })
    })
    .optional()
}

fn conversation_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationRow> {
    Ok(ConversationRow {
        id: row.get(0)?,
        kind: row.get(1)?,
        name: row.get(2)?,
        admin_id: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn message_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_id: row.get(2)?,
        sender_username: row
            .get::<_, Option<String>>(3)?
            .unwrap_or_else(|| "unknown".to_string()),
        content: row.get(4)?,
        nonce: row.get(5)?,
        signature: row.get(6)?,
        reply_to: row.get(7)?,
        modification: row.get(8)?,
        created_at: row.get(9)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
