//! Room fan-out tables: conversation id to the connections that currently
//! want its events. Joined lazily on a connection's first interaction with
//! a conversation; a cache of interest, not an authority on persisted
//! membership.

use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;
use uuid::Uuid;

use roost_types::events::GatewayEvent;

use crate::presence::EventSender;

#[derive(Default)]
pub struct RoomRegistry {
    inner: RwLock<RoomTables>,
}

#[derive(Default)]
struct RoomTables {
    rooms: HashMap<Uuid, HashMap<Uuid, EventSender>>,
    // conn -> joined conversations, for disconnect cleanup
    joined: HashMap<Uuid, HashSet<Uuid>>,
}

impl RoomRegistry {
    /// Idempotent: re-joining replaces the stored sender for the handle.
    pub async fn join(&self, conversation_id: Uuid, conn_id: Uuid, tx: EventSender) {
        let mut tables = self.inner.write().await;
        tables
            .rooms
            .entry(conversation_id)
            .or_default()
            .insert(conn_id, tx);
        tables.joined.entry(conn_id).or_default().insert(conversation_id);
    }

    /// Deliver once to every currently-joined connection. Holding the
    /// write guard for the whole loop gives every member the same event
    /// order for this conversation; senders whose connection is gone are
    /// dropped on the way through.
    pub async fn broadcast(&self, conversation_id: Uuid, event: GatewayEvent) {
        let mut tables = self.inner.write().await;
        if let Some(members) = tables.rooms.get_mut(&conversation_id) {
            members.retain(|_, tx| tx.send(event.clone()).is_ok());
        }
    }

    /// Remove specific connections from one room (e.g. a removed member's
    /// live handles).
    pub async fn evict(&self, conversation_id: Uuid, conn_ids: &[Uuid]) {
        let mut tables = self.inner.write().await;
        if let Some(members) = tables.rooms.get_mut(&conversation_id) {
            for conn_id in conn_ids {
                members.remove(conn_id);
            }
        }
        for conn_id in conn_ids {
            if let Some(joined) = tables.joined.get_mut(conn_id) {
                joined.remove(&conversation_id);
            }
        }
    }

    /// Disconnect cleanup: drop the connection from every room it joined.
    pub async fn leave_all(&self, conn_id: Uuid) {
        let mut tables = self.inner.write().await;
        if let Some(joined) = tables.joined.remove(&conn_id) {
            for conversation_id in joined {
                if let Some(members) = tables.rooms.get_mut(&conversation_id) {
                    members.remove(&conn_id);
                    if members.is_empty() {
                        tables.rooms.remove(&conversation_id);
                    }
                }
            }
        }
    }
}
