//! Domain core: conversation resolution, membership rules, message
//! lifecycle, and history pagination over the durable store. This crate
//! knows nothing about sockets; the gateway drives it and fans the
//! results out.

pub mod authority;
pub mod conversations;
pub mod error;
pub mod history;
pub mod messages;

use std::sync::Arc;

use roost_db::Database;

pub use error::{ChatError, ChatResult};
pub use messages::MessageDraft;

/// Cheaply cloneable handle over the domain operations. All methods are
/// synchronous; async callers wrap them in `spawn_blocking`.
#[derive(Clone)]
pub struct ChatService {
    db: Arc<Database>,
}

impl ChatService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub(crate) fn db(&self) -> &Database {
        &self.db
    }

    /// Mirror a presence transition into the store. Best effort; the
    /// in-memory registry stays authoritative.
    pub fn mirror_presence(
        &self,
        user_id: uuid::Uuid,
        online: bool,
        last_seen: Option<chrono::DateTime<chrono::Utc>>,
    ) -> ChatResult<()> {
        let stamp = last_seen.map(roost_db::models::fmt_timestamp);
        self.db
            .set_presence(&user_id.to_string(), online, stamp.as_deref())?;
        Ok(())
    }
}
