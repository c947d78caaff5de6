use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub is_online: bool,
    pub last_seen: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Minimal user projection embedded in events and member lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    Dm,
    Group,
}

impl ConversationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dm => "dm",
            Self::Group => "group",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "dm" => Some(Self::Dm),
            "group" => Some(Self::Group),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub kind: ConversationKind,
    /// Display name, groups only.
    pub name: Option<String>,
    /// Owning admin, groups only.
    pub admin_id: Option<Uuid>,
    pub participants: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.participants.contains(&user_id)
    }
}

/// Audit tag on a message. Deleted content is retained, never erased;
/// a `Deleted*` state is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Modification {
    Edited,
    Deleted,
    #[serde(rename = "Deleted By Admin")]
    DeletedByAdmin,
}

impl Modification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Edited => "Edited",
            Self::Deleted => "Deleted",
            Self::DeletedByAdmin => "Deleted By Admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Edited" => Some(Self::Edited),
            "Deleted" => Some(Self::Deleted),
            "Deleted By Admin" => Some(Self::DeletedByAdmin),
            _ => None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, Self::Deleted | Self::DeletedByAdmin)
    }
}

/// The payload fields are opaque to the server: `content` may be plaintext
/// or ciphertext, with `nonce`/`signature` carried verbatim for clients
/// that encrypt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub sender_username: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modification: Option<Modification>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn is_deleted(&self) -> bool {
        self.modification.is_some_and(|m| m.is_deleted())
    }
}

/// Bounded page of results, chronological within the page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total: u64,
    pub total_pages: u64,
}
