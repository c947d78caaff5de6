use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Conversation, Message, Modification, Page, UserSummary};

/// Events sent over the WebSocket gateway.
///
/// Conversation-scoped events are delivered to the conversation's room;
/// user-scoped events (`*Notice`, `PresenceStatus`, `Error`) go straight to
/// one user's live connections. `PresenceChanged` fans out to every
/// connected client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid, username: String },

    MessageCreated {
        conversation_id: Uuid,
        message: Message,
    },

    MessageUpdated {
        conversation_id: Uuid,
        message: Message,
    },

    MessageDeleted {
        conversation_id: Uuid,
        message_id: Uuid,
        modification: Modification,
    },

    ConversationCreated { conversation: Conversation },

    ConversationRenamed { conversation_id: Uuid, name: String },

    MemberAdded {
        conversation_id: Uuid,
        member: UserSummary,
    },

    MemberRemoved {
        conversation_id: Uuid,
        member_id: Uuid,
    },

    TypingStarted { conversation_id: Uuid, user_id: Uuid },

    TypingStopped { conversation_id: Uuid, user_id: Uuid },

    /// A user came online or went offline
    PresenceChanged {
        user_id: Uuid,
        online: bool,
        last_seen: Option<DateTime<Utc>>,
    },

    /// Reply to a `CheckStatus` command, sent only to the asking connection
    PresenceStatus {
        user_id: Uuid,
        online: bool,
        last_seen: Option<DateTime<Utc>>,
    },

    /// "You have a new private message" badge, independent of room state
    DirectMessageNotice {
        conversation_id: Uuid,
        sender: UserSummary,
    },

    /// "X sent a message in group Y" badge for participants without the
    /// room open
    GroupMessageNotice {
        conversation_id: Uuid,
        name: Option<String>,
        sender: UserSummary,
    },

    /// Reply to a `FetchHistory` command
    History {
        conversation_id: Uuid,
        messages: Page<Message>,
    },

    /// Operation failure, sent only to the acting connection
    Error { message: String },
}

/// Where a message is going: an existing conversation, or a user (the
/// server resolves, or creates, the direct conversation for the pair).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendTarget {
    Conversation { id: Uuid },
    User { id: Uuid },
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },

    SendMessage {
        to: SendTarget,
        content: String,
        #[serde(default)]
        nonce: Option<String>,
        #[serde(default)]
        signature: Option<String>,
        #[serde(default)]
        reply_to: Option<Uuid>,
    },

    EditMessage { message_id: Uuid, content: String },

    DeleteMessage { message_id: Uuid },

    CreateGroup { name: String },

    RenameConversation { conversation_id: Uuid, name: String },

    AddMember {
        conversation_id: Uuid,
        member_id: Uuid,
    },

    RemoveMember {
        conversation_id: Uuid,
        member_id: Uuid,
    },

    /// Subscribe this connection to a conversation's events
    JoinConversation { conversation_id: Uuid },

    FetchHistory {
        conversation_id: Uuid,
        #[serde(default = "default_page")]
        page: u32,
        #[serde(default = "default_size")]
        size: u32,
    },

    StartTyping { conversation_id: Uuid },

    StopTyping { conversation_id: Uuid },

    CheckStatus { user_id: Uuid },
}

fn default_page() -> u32 {
    1
}

fn default_size() -> u32 {
    20
}
