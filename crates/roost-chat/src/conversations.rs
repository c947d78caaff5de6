//! Conversation resolution and membership operations.

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use roost_db::models::fmt_timestamp;
use roost_types::models::{Conversation, ConversationKind, UserSummary};

use crate::ChatService;
use crate::authority;
use crate::error::{ChatError, ChatResult};

const NAME_MIN: usize = 2;
const NAME_MAX: usize = 50;

/// Canonical key for the unordered participant pair of a dm conversation.
fn dm_key(a: Uuid, b: Uuid) -> String {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    format!("{}:{}", lo, hi)
}

fn validate_group_name(name: &str) -> ChatResult<&str> {
    let name = name.trim();
    if name.len() < NAME_MIN || name.len() > NAME_MAX {
        return Err(ChatError::InvalidArgument(
            "group name must be between 2 and 50 characters",
        ));
    }
    Ok(name)
}

impl ChatService {
    pub fn conversation(&self, id: Uuid) -> ChatResult<Conversation> {
        let row = self
            .db()
            .get_conversation(&id.to_string())?
            .ok_or(ChatError::NotFound("conversation"))?;

        let participants = self
            .db()
            .get_participants(&id.to_string())?
            .iter()
            .filter_map(|s| s.parse::<Uuid>().ok())
            .collect();

        Ok(row.into_model(participants)?)
    }

    pub fn user(&self, id: Uuid) -> ChatResult<roost_types::models::User> {
        let row = self
            .db()
            .get_user_by_id(&id.to_string())?
            .ok_or(ChatError::NotFound("user"))?;
        Ok(row.into_model()?)
    }

    pub fn user_summary(&self, id: Uuid) -> ChatResult<UserSummary> {
        let row = self
            .db()
            .get_user_by_id(&id.to_string())?
            .ok_or(ChatError::NotFound("user"))?;
        Ok(UserSummary {
            id,
            username: row.username,
        })
    }

    /// Find or create the direct conversation for an unordered user pair.
    ///
    /// Idempotent under concurrent first-contact from both sides: the
    /// sorted-pair `dm_key` is unique in the store, so a lost creation
    /// race shows up as `inserted == false` and we re-fetch the winner's
    /// row instead of surfacing a duplicate conversation.
    pub fn resolve_direct(&self, a: Uuid, b: Uuid) -> ChatResult<Conversation> {
        if a == b {
            return Err(ChatError::InvalidArgument(
                "cannot open a conversation with yourself",
            ));
        }

        self.user_summary(b)?;

        let key = dm_key(a, b);
        if let Some(row) = self.db().find_dm_conversation(&key)? {
            let id = row.id.clone();
            let participants = self
                .db()
                .get_participants(&id)?
                .iter()
                .filter_map(|s| s.parse::<Uuid>().ok())
                .collect();
            return Ok(row.into_model(participants)?);
        }

        let id = Uuid::new_v4();
        let now = fmt_timestamp(Utc::now());
        let participants = vec![a.to_string(), b.to_string()];

        let inserted = self.db().insert_conversation(
            &id.to_string(),
            ConversationKind::Dm.as_str(),
            None,
            None,
            Some(&key),
            &participants,
            &now,
        )?;

        if inserted {
            return self.conversation(id);
        }

        // Lost the first-contact race; the winner's row is the canonical one.
        debug!("lost dm creation race for {}, re-fetching", key);
        let winner = self
            .db()
            .find_dm_conversation(&key)?
            .ok_or(ChatError::NotFound("conversation"))?;
        let winner_id = winner.id.parse::<Uuid>().map_err(anyhow::Error::from)?;
        self.conversation(winner_id)
    }

    /// Create a group conversation owned by its creator.
    pub fn create_group(&self, creator: Uuid, name: &str) -> ChatResult<Conversation> {
        let name = validate_group_name(name)?;

        let id = Uuid::new_v4();
        let now = fmt_timestamp(Utc::now());

        self.db().insert_conversation(
            &id.to_string(),
            ConversationKind::Group.as_str(),
            Some(name),
            Some(&creator.to_string()),
            None,
            &[creator.to_string()],
            &now,
        )?;

        self.conversation(id)
    }

    /// Rename a group; admin only.
    pub fn rename(&self, conversation_id: Uuid, actor: Uuid, new_name: &str) -> ChatResult<Conversation> {
        let conversation = self.conversation(conversation_id)?;

        if !authority::can_manage(&conversation, actor) {
            return Err(ChatError::PermissionDenied(
                "only the admin can rename this conversation",
            ));
        }

        let name = validate_group_name(new_name)?;
        self.db()
            .rename_conversation(&conversation_id.to_string(), name)?;

        self.conversation(conversation_id)
    }

    /// Add a user to a group; admin only, no duplicates.
    pub fn add_member(
        &self,
        conversation_id: Uuid,
        actor: Uuid,
        member_id: Uuid,
    ) -> ChatResult<(Conversation, UserSummary)> {
        let conversation = self.conversation(conversation_id)?;
        let member = self.user_summary(member_id)?;

        if !authority::can_manage(&conversation, actor) {
            return Err(ChatError::PermissionDenied(
                "only the admin can add members to this conversation",
            ));
        }

        if conversation.is_participant(member_id) {
            return Err(ChatError::Conflict("user already in group"));
        }

        self.db()
            .add_participant(&conversation_id.to_string(), &member_id.to_string())?;

        Ok((self.conversation(conversation_id)?, member))
    }

    /// Remove a member. The admin may remove anyone but themselves; a
    /// member may always remove themselves (self-leave).
    pub fn remove_member(
        &self,
        conversation_id: Uuid,
        actor: Uuid,
        member_id: Uuid,
    ) -> ChatResult<Conversation> {
        let conversation = self.conversation(conversation_id)?;

        if !conversation.is_participant(member_id) {
            return Err(ChatError::NotFound("member"));
        }

        let is_self = actor == member_id;
        if !authority::can_manage(&conversation, actor) && !is_self {
            return Err(ChatError::PermissionDenied(
                "you are not allowed to remove this member",
            ));
        }

        if conversation.admin_id == Some(member_id) {
            return Err(ChatError::InvalidOperation(
                "the admin cannot be removed from the group",
            ));
        }

        self.db()
            .remove_participant(&conversation_id.to_string(), &member_id.to_string())?;

        self.conversation(conversation_id)
    }
}
