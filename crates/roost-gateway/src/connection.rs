use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn};
use uuid::Uuid;

use roost_chat::ChatService;
use roost_types::events::{GatewayCommand, GatewayEvent};

use crate::GatewayState;
use crate::commands;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// How long a fresh socket gets to present a valid Identify command.
const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle a single WebSocket connection: identify, register presence,
/// then pump events out and commands in until either side drops.
pub async fn handle_connection(socket: WebSocket, state: GatewayState) {
    let (mut sender, mut receiver) = socket.split();

    // Step 1: Wait for Identify command with JWT. Failure means no
    // presence registration of any kind.
    let (user_id, username) = match wait_for_identify(&mut receiver, &state.jwt_secret).await {
        Some(id) => id,
        None => {
            warn!("WebSocket client failed to identify, closing");
            return;
        }
    };

    info!("{} ({}) connected to gateway", username, user_id);

    // Step 2: Send Ready event
    let ready = GatewayEvent::Ready {
        user_id,
        username: username.clone(),
    };
    if sender
        .send(Message::Text(serde_json::to_string(&ready).unwrap().into()))
        .await
        .is_err()
    {
        return;
    }

    // Step 3: Presence snapshot: who is already online, before our own
    // transition is announced.
    for (uid, _) in state.dispatcher.online_users().await {
        let event = GatewayEvent::PresenceChanged {
            user_id: uid,
            online: true,
            last_seen: None,
        };
        if sender
            .send(Message::Text(serde_json::to_string(&event).unwrap().into()))
            .await
            .is_err()
        {
            return;
        }
    }

    // Step 4: Register with the dispatcher and mirror the transition.
    let (handle, went_online) = state.dispatcher.connect(user_id, &username).await;
    let conn_id = handle.conn_id;
    let tx = handle.sender.clone();
    let mut events = handle.events;

    if went_online {
        mirror_presence(&state.chat, user_id, true, None).await;
    }

    // Shared flag for heartbeat
    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward dispatcher events -> client, with heartbeat.
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                event = events.recv() => {
                    let event = match event {
                        Some(event) => event,
                        None => break,
                    };
                    let text = serde_json::to_string(&event).unwrap();
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from client
    let recv_state = state.clone();
    let recv_tx = tx.clone();
    let username_recv = username.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => {
                        commands::dispatch(
                            &recv_state,
                            user_id,
                            &username_recv,
                            conn_id,
                            &recv_tx,
                            cmd,
                        )
                        .await;
                    }
                    Err(e) => {
                        warn!(
                            "{} ({}) bad command: {} -- raw: {}",
                            username_recv,
                            user_id,
                            e,
                            &text[..text.len().min(200)]
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    // Connection loss: presence disconnect + room membership cleanup.
    if let Some(last_seen) = state.dispatcher.disconnect(user_id, conn_id).await {
        mirror_presence(&state.chat, user_id, false, Some(last_seen)).await;
    }

    info!("{} ({}) disconnected from gateway", username, user_id);
}

/// Best-effort store mirror of a presence transition. Failures are logged
/// and dropped; the in-memory registry stays authoritative, and a late
/// completion cannot resurrect presence because it never touches the
/// registry. Awaited so the online and offline writes of one connection
/// cannot reorder.
async fn mirror_presence(
    chat: &ChatService,
    user_id: Uuid,
    online: bool,
    last_seen: Option<DateTime<Utc>>,
) {
    let chat = chat.clone();
    let _ = tokio::task::spawn_blocking(move || {
        if let Err(e) = chat.mirror_presence(user_id, online, last_seen) {
            warn!("presence mirror failed for {}: {}", user_id, e);
        }
    })
    .await;
}

async fn wait_for_identify(
    receiver: &mut futures_util::stream::SplitStream<WebSocket>,
    jwt_secret: &str,
) -> Option<(Uuid, String)> {
    use jsonwebtoken::{DecodingKey, Validation, decode};
    use roost_types::api::Claims;

    let timeout = tokio::time::timeout(IDENTIFY_TIMEOUT, async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(GatewayCommand::Identify { token }) =
                    serde_json::from_str::<GatewayCommand>(&text)
                {
                    let token_data = decode::<Claims>(
                        &token,
                        &DecodingKey::from_secret(jwt_secret.as_bytes()),
                        &Validation::default(),
                    )
                    .ok()?;

                    return Some((token_data.claims.sub, token_data.claims.username));
                }
            }
        }
        None
    });

    timeout.await.ok().flatten()
}
