//! Bounded, ordered retrieval of a conversation's message history.

use uuid::Uuid;

use roost_types::models::{Message, Page};

use crate::ChatService;
use crate::authority;
use crate::error::{ChatError, ChatResult};

/// Hard cap on page size, regardless of what the client asks for.
pub const MAX_PAGE_SIZE: u32 = 50;

impl ChatService {
    /// One page of history, oldest-first within the page.
    ///
    /// Storage reads newest-first and each page is reversed before return,
    /// so page 1 is the latest slice and every page reads chronologically.
    /// Clients rely on this when prepending older pages to the top of a
    /// chronological view.
    pub fn history(
        &self,
        actor: Uuid,
        conversation_id: Uuid,
        page: u32,
        size: u32,
    ) -> ChatResult<Page<Message>> {
        let conversation = self.conversation(conversation_id)?;

        if !authority::can_post(&conversation, actor) {
            return Err(ChatError::PermissionDenied(
                "cannot access this conversation's messages",
            ));
        }

        let page = page.max(1);
        let size = size.clamp(1, MAX_PAGE_SIZE);

        let cid = conversation_id.to_string();
        let total = self.db().count_messages(&cid)?;
        let total_pages = total.div_ceil(size as u64);

        let offset = (page as u64 - 1) * size as u64;
        let rows = self.db().get_messages_page(&cid, size, offset)?;

        let mut items = rows
            .into_iter()
            .map(|row| row.into_model())
            .collect::<anyhow::Result<Vec<Message>>>()?;
        items.reverse();

        Ok(Page {
            items,
            page,
            size,
            total,
            total_pages,
        })
    }
}
