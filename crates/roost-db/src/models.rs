//! Database row types, mapping directly to SQLite rows.
//! Distinct from the roost-types API models to keep the DB layer
//! independent; `into_model` conversions bridge the two.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use roost_types::models::{
    Conversation, ConversationKind, Message, Modification, User,
};

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub is_online: bool,
    pub last_seen: Option<String>,
    pub created_at: String,
}

pub struct ConversationRow {
    pub id: String,
    pub kind: String,
    pub name: Option<String>,
    pub admin_id: Option<String>,
    pub created_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub sender_username: String,
    pub content: String,
    pub nonce: Option<String>,
    pub signature: Option<String>,
    pub reply_to: Option<String>,
    pub modification: Option<String>,
    pub created_at: String,
}

/// Fixed-width UTC timestamp so lexicographic order in SQLite matches
/// chronological order.
pub fn fmt_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("corrupt timestamp '{}'", s))
}

impl UserRow {
    pub fn into_model(self) -> Result<User> {
        Ok(User {
            id: self
                .id
                .parse::<Uuid>()
                .with_context(|| format!("corrupt user id '{}'", self.id))?,
            username: self.username,
            is_online: self.is_online,
            last_seen: self
                .last_seen
                .as_deref()
                .map(parse_timestamp)
                .transpose()?,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

impl ConversationRow {
    pub fn into_model(self, participants: Vec<Uuid>) -> Result<Conversation> {
        Ok(Conversation {
            id: self
                .id
                .parse::<Uuid>()
                .with_context(|| format!("corrupt conversation id '{}'", self.id))?,
            kind: ConversationKind::parse(&self.kind)
                .with_context(|| format!("corrupt conversation kind '{}'", self.kind))?,
            name: self.name,
            admin_id: self
                .admin_id
                .as_deref()
                .map(|s| s.parse::<Uuid>())
                .transpose()
                .context("corrupt admin id")?,
            participants,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

impl MessageRow {
    pub fn into_model(self) -> Result<Message> {
        Ok(Message {
            id: self
                .id
                .parse::<Uuid>()
                .with_context(|| format!("corrupt message id '{}'", self.id))?,
            conversation_id: self
                .conversation_id
                .parse::<Uuid>()
                .context("corrupt conversation id on message")?,
            sender_id: self
                .sender_id
                .parse::<Uuid>()
                .context("corrupt sender id on message")?,
            sender_username: self.sender_username,
            content: self.content,
            nonce: self.nonce,
            signature: self.signature,
            reply_to: self
                .reply_to
                .as_deref()
                .map(|s| s.parse::<Uuid>())
                .transpose()
                .context("corrupt reply reference")?,
            modification: self.modification.as_deref().and_then(Modification::parse),
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}
