//! Message lifecycle: create, edit, delete with audit state.
//!
//! Per-message state machine: `Created -> {Edited}* -> {Deleted |
//! DeletedByAdmin}`. The delete states are terminal; later edits and
//! deletes fail with `InvalidState`. Content survives deletion; only the
//! modification tag changes.

use chrono::Utc;
use uuid::Uuid;

use roost_db::models::fmt_timestamp;
use roost_types::models::{Conversation, Message, Modification};

use crate::ChatService;
use crate::authority;
use crate::error::{ChatError, ChatResult};

/// Inbound payload for a new message. Opaque to the server.
#[derive(Debug, Clone, Default)]
pub struct MessageDraft {
    pub content: String,
    pub nonce: Option<String>,
    pub signature: Option<String>,
    pub reply_to: Option<Uuid>,
}

impl ChatService {
    fn message(&self, id: Uuid) -> ChatResult<Message> {
        let row = self
            .db()
            .get_message(&id.to_string())?
            .ok_or(ChatError::NotFound("message"))?;
        Ok(row.into_model()?)
    }

    /// Persist a new message in a conversation.
    ///
    /// The reply reference is best-effort context: if it does not resolve
    /// to a message in the same conversation it is dropped, not an error.
    pub fn send(
        &self,
        sender: Uuid,
        conversation_id: Uuid,
        draft: MessageDraft,
    ) -> ChatResult<(Conversation, Message)> {
        if draft.content.trim().is_empty() {
            return Err(ChatError::InvalidArgument("message content cannot be empty"));
        }

        let conversation = self.conversation(conversation_id)?;
        self.user_summary(sender)?;

        let reply_to = draft.reply_to.and_then(|id| {
            match self.db().get_message(&id.to_string()) {
                Ok(Some(row)) if row.conversation_id == conversation_id.to_string() => Some(id),
                _ => None,
            }
        });

        let id = Uuid::new_v4();
        let now = fmt_timestamp(Utc::now());

        self.db().insert_message(
            &id.to_string(),
            &conversation_id.to_string(),
            &sender.to_string(),
            &draft.content,
            draft.nonce.as_deref(),
            draft.signature.as_deref(),
            reply_to.map(|r| r.to_string()).as_deref(),
            &now,
        )?;

        Ok((conversation, self.message(id)?))
    }

    /// Replace a message's content; author only, rejected once deleted.
    pub fn edit(
        &self,
        actor: Uuid,
        message_id: Uuid,
        new_content: &str,
    ) -> ChatResult<(Conversation, Message)> {
        if new_content.trim().is_empty() {
            return Err(ChatError::InvalidArgument("message content cannot be empty"));
        }

        let message = self.message(message_id)?;
        let conversation = self.conversation(message.conversation_id)?;

        if !authority::can_edit(&message, actor) {
            return Err(ChatError::PermissionDenied(
                "only the author can edit a message",
            ));
        }

        // The conditional UPDATE re-checks the terminal state under the
        // store lock, so a delete landing between our read and this write
        // still loses.
        let updated = self
            .db()
            .update_message_content(&message_id.to_string(), new_content)?;
        if !updated {
            return Err(ChatError::InvalidState("message has been deleted"));
        }

        Ok((conversation, self.message(message_id)?))
    }

    /// Tag a message deleted, retaining its content for audit. The tag
    /// records who acted: the author gets `Deleted`, the conversation
    /// admin `Deleted By Admin`.
    pub fn delete(&self, actor: Uuid, message_id: Uuid) -> ChatResult<(Conversation, Message)> {
        let message = self.message(message_id)?;
        let conversation = self.conversation(message.conversation_id)?;

        if !authority::can_delete(&conversation, &message, actor) {
            return Err(ChatError::PermissionDenied(
                "you cannot delete this message",
            ));
        }

        let modification = if message.sender_id == actor {
            Modification::Deleted
        } else {
            Modification::DeletedByAdmin
        };

        let marked = self
            .db()
            .mark_message(&message_id.to_string(), modification.as_str())?;
        if !marked {
            return Err(ChatError::InvalidState("message has already been deleted"));
        }

        Ok((conversation, self.message(message_id)?))
    }
}
