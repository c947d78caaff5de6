//! Membership authority: the single capability-check contract for every
//! conversation and message operation. Call sites never compare ids ad hoc.

use uuid::Uuid;

use roost_types::models::{Conversation, Message};

/// Conversation management (rename, add member): admin only.
pub fn can_manage(conversation: &Conversation, actor: Uuid) -> bool {
    conversation.admin_id == Some(actor)
}

/// Read/write access to a conversation's messages: admin or participant.
pub fn can_post(conversation: &Conversation, actor: Uuid) -> bool {
    can_manage(conversation, actor) || conversation.is_participant(actor)
}

/// Editing is author-only, even for group admins.
pub fn can_edit(message: &Message, actor: Uuid) -> bool {
    message.sender_id == actor
}

/// Deleting is allowed to the author or the conversation admin.
pub fn can_delete(conversation: &Conversation, message: &Message, actor: Uuid) -> bool {
    message.sender_id == actor || can_manage(conversation, actor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use roost_types::models::ConversationKind;

    fn group(admin: Uuid, participants: Vec<Uuid>) -> Conversation {
        Conversation {
            id: Uuid::new_v4(),
            kind: ConversationKind::Group,
            name: Some("team".into()),
            admin_id: Some(admin),
            participants,
            created_at: Utc::now(),
        }
    }

    fn message(sender: Uuid, conversation: &Conversation) -> Message {
        Message {
            id: Uuid::new_v4(),
            conversation_id: conversation.id,
            sender_id: sender,
            sender_username: "sender".into(),
            content: "hi".into(),
            nonce: None,
            signature: None,
            reply_to: None,
            modification: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn only_admin_manages() {
        let admin = Uuid::new_v4();
        let member = Uuid::new_v4();
        let conv = group(admin, vec![admin, member]);

        assert!(can_manage(&conv, admin));
        assert!(!can_manage(&conv, member));
    }

    #[test]
    fn admin_and_participants_post() {
        let admin = Uuid::new_v4();
        let member = Uuid::new_v4();
        let outsider = Uuid::new_v4();
        let conv = group(admin, vec![member]);

        assert!(can_post(&conv, admin));
        assert!(can_post(&conv, member));
        assert!(!can_post(&conv, outsider));
    }

    #[test]
    fn edit_is_author_only_even_for_admin() {
        let admin = Uuid::new_v4();
        let member = Uuid::new_v4();
        let conv = group(admin, vec![admin, member]);
        let msg = message(member, &conv);

        assert!(can_edit(&msg, member));
        assert!(!can_edit(&msg, admin));
    }

    #[test]
    fn delete_is_author_or_admin() {
        let admin = Uuid::new_v4();
        let member = Uuid::new_v4();
        let other = Uuid::new_v4();
        let conv = group(admin, vec![admin, member, other]);
        let msg = message(member, &conv);

        assert!(can_delete(&conv, &msg, member));
        assert!(can_delete(&conv, &msg, admin));
        assert!(!can_delete(&conv, &msg, other));
    }
}
