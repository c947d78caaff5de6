//! Realtime layer: presence registry, room fan-out, and the per-connection
//! WebSocket loop. All shared mutable state lives behind the [`Dispatcher`];
//! connection tasks never touch the maps directly.

pub mod commands;
pub mod connection;
pub mod dispatcher;
pub mod presence;
pub mod rooms;

use roost_chat::ChatService;

use crate::dispatcher::Dispatcher;

/// Everything a connection task needs, created once at process start and
/// cloned per connection.
#[derive(Clone)]
pub struct GatewayState {
    pub chat: ChatService,
    pub dispatcher: Dispatcher,
    pub jwt_secret: String,
}
