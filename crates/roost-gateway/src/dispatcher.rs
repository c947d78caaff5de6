//! Composes the presence registry and room tables behind one cloneable
//! handle. Created once in `main`, torn down with the process; connection
//! tasks mutate shared state only through these methods.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

use roost_types::events::GatewayEvent;

use crate::presence::{EventSender, PresenceRegistry, PresenceSnapshot};
use crate::rooms::RoomRegistry;

#[derive(Clone, Default)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

#[derive(Default)]
struct DispatcherInner {
    presence: PresenceRegistry,
    rooms: RoomRegistry,
}

/// One registered connection: its id, the receiving end drained by the
/// connection's send loop, and a sender clone for lazy room joins.
pub struct ConnectionHandle {
    pub conn_id: Uuid,
    pub events: mpsc::UnboundedReceiver<GatewayEvent>,
    pub sender: EventSender,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly authenticated connection. Returns the handle and
    /// whether the user just came online (first handle); the online
    /// transition is announced to every connected client.
    pub async fn connect(&self, user_id: Uuid, username: &str) -> (ConnectionHandle, bool) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();

        let went_online = self
            .inner
            .presence
            .connect(user_id, username, conn_id, tx.clone())
            .await;

        if went_online {
            self.broadcast_all(GatewayEvent::PresenceChanged {
                user_id,
                online: true,
                last_seen: None,
            })
            .await;
        }

        (
            ConnectionHandle {
                conn_id,
                events: rx,
                sender: tx,
            },
            went_online,
        )
    }

    /// Tear down a connection: leave every joined room, drop the presence
    /// handle, and announce the offline transition if this was the user's
    /// last connection. Returns the last-seen stamp on that transition.
    pub async fn disconnect(&self, user_id: Uuid, conn_id: Uuid) -> Option<DateTime<Utc>> {
        self.inner.rooms.leave_all(conn_id).await;

        let went_offline = self.inner.presence.disconnect(user_id, conn_id).await;

        if let Some(last_seen) = went_offline {
            self.broadcast_all(GatewayEvent::PresenceChanged {
                user_id,
                online: false,
                last_seen: Some(last_seen),
            })
            .await;
        }

        went_offline
    }

    pub async fn join(&self, conversation_id: Uuid, conn_id: Uuid, tx: EventSender) {
        self.inner.rooms.join(conversation_id, conn_id, tx).await;
    }

    /// One logical delivery to every connection joined to the conversation.
    pub async fn broadcast(&self, conversation_id: Uuid, event: GatewayEvent) {
        self.inner.rooms.broadcast(conversation_id, event).await;
    }

    /// Direct delivery to every live handle of a user, bypassing rooms.
    /// An unreachable user is a normal no-op.
    pub async fn notify_user(&self, user_id: Uuid, event: GatewayEvent) {
        for tx in self.inner.presence.lookup(user_id).await {
            let _ = tx.send(event.clone());
        }
    }

    /// Deliver to every connected client (presence transitions).
    pub async fn broadcast_all(&self, event: GatewayEvent) {
        for tx in self.inner.presence.all_senders().await {
            let _ = tx.send(event.clone());
        }
    }

    /// Remove a user's live handles from one conversation's room.
    pub async fn evict_user(&self, conversation_id: Uuid, user_id: Uuid) {
        let conn_ids = self.inner.presence.connection_ids(user_id).await;
        if !conn_ids.is_empty() {
            self.inner.rooms.evict(conversation_id, &conn_ids).await;
        }
    }

    pub async fn status(&self, user_id: Uuid) -> PresenceSnapshot {
        self.inner.presence.status(user_id).await
    }

    pub async fn online_users(&self) -> Vec<(Uuid, String)> {
        self.inner.presence.online_users().await
    }
}
