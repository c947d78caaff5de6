//! In-memory presence: user id to live connection handles, plus the
//! last-seen stamp written on the transition to zero handles. The single
//! source of truth for "is this user reachable right now". The store's
//! `is_online`/`last_seen` fields are a best-effort mirror maintained by
//! the connection tasks, never read on the hot path.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use roost_types::events::GatewayEvent;

pub type EventSender = mpsc::UnboundedSender<GatewayEvent>;

#[derive(Debug, Clone, Copy)]
pub struct PresenceSnapshot {
    pub online: bool,
    pub last_seen: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub struct PresenceRegistry {
    inner: RwLock<PresenceTables>,
}

#[derive(Default)]
struct PresenceTables {
    online: HashMap<Uuid, UserHandles>,
    last_seen: HashMap<Uuid, DateTime<Utc>>,
}

struct UserHandles {
    username: String,
    handles: HashMap<Uuid, EventSender>,
}

impl PresenceRegistry {
    /// Register a live handle. A user may hold several simultaneous
    /// connections; returns true only on the offline-to-online transition.
    pub async fn connect(
        &self,
        user_id: Uuid,
        username: &str,
        conn_id: Uuid,
        tx: EventSender,
    ) -> bool {
        let mut tables = self.inner.write().await;
        let entry = tables.online.entry(user_id).or_insert_with(|| UserHandles {
            username: username.to_string(),
            handles: HashMap::new(),
        });
        entry.handles.insert(conn_id, tx);
        entry.handles.len() == 1
    }

    /// Drop a handle. Returns the last-seen stamp when this was the
    /// user's final connection, i.e. the user just went offline.
    pub async fn disconnect(&self, user_id: Uuid, conn_id: Uuid) -> Option<DateTime<Utc>> {
        let mut tables = self.inner.write().await;

        let remaining = match tables.online.get_mut(&user_id) {
            Some(entry) => {
                entry.handles.remove(&conn_id);
                entry.handles.len()
            }
            None => return None,
        };

        if remaining > 0 {
            return None;
        }

        tables.online.remove(&user_id);
        let now = Utc::now();
        tables.last_seen.insert(user_id, now);
        Some(now)
    }

    /// Every live sender for a user. Empty means unreachable; callers
    /// treat that as a no-op, not an error.
    pub async fn lookup(&self, user_id: Uuid) -> Vec<EventSender> {
        let tables = self.inner.read().await;
        tables
            .online
            .get(&user_id)
            .map(|entry| entry.handles.values().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn connection_ids(&self, user_id: Uuid) -> Vec<Uuid> {
        let tables = self.inner.read().await;
        tables
            .online
            .get(&user_id)
            .map(|entry| entry.handles.keys().copied().collect())
            .unwrap_or_default()
    }

    pub async fn status(&self, user_id: Uuid) -> PresenceSnapshot {
        let tables = self.inner.read().await;
        PresenceSnapshot {
            online: tables.online.contains_key(&user_id),
            last_seen: tables.last_seen.get(&user_id).copied(),
        }
    }

    pub async fn online_users(&self) -> Vec<(Uuid, String)> {
        let tables = self.inner.read().await;
        tables
            .online
            .iter()
            .map(|(id, entry)| (*id, entry.username.clone()))
            .collect()
    }

    pub async fn all_senders(&self) -> Vec<EventSender> {
        let tables = self.inner.read().await;
        tables
            .online
            .values()
            .flat_map(|entry| entry.handles.values().cloned())
            .collect()
    }
}
