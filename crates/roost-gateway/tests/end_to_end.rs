use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

use roost_chat::ChatService;
use roost_db::Database;
use roost_db::models::fmt_timestamp;
use roost_gateway::GatewayState;
use roost_gateway::commands;
use roost_gateway::dispatcher::{ConnectionHandle, Dispatcher};
use roost_types::events::{GatewayCommand, GatewayEvent, SendTarget};

fn seed_user(db: &Database, username: &str) -> Uuid {
    let id = Uuid::new_v4();
    db.create_user(
        &id.to_string(),
        username,
        "argon2-hash-placeholder",
        &fmt_timestamp(Utc::now()),
    )
    .expect("create user");
    id
}

fn test_state() -> (GatewayState, Arc<Database>) {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let state = GatewayState {
        chat: ChatService::new(db.clone()),
        dispatcher: Dispatcher::new(),
        jwt_secret: "test-secret".into(),
    };
    (state, db)
}

fn drain(rx: &mut UnboundedReceiver<GatewayEvent>) -> Vec<GatewayEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

async fn send(
    state: &GatewayState,
    user_id: Uuid,
    username: &str,
    handle: &ConnectionHandle,
    cmd: GatewayCommand,
) {
    commands::dispatch(state, user_id, username, handle.conn_id, &handle.sender, cmd).await;
}

#[tokio::test]
async fn presence_round_trip_stamps_last_seen() {
    let dispatcher = Dispatcher::new();
    let user = Uuid::new_v4();

    let before = Utc::now();
    let (handle, went_online) = dispatcher.connect(user, "alice").await;
    assert!(went_online);
    assert!(dispatcher.status(user).await.online);

    let stamp = dispatcher.disconnect(user, handle.conn_id).await;
    let snapshot = dispatcher.status(user).await;

    assert!(!snapshot.online);
    assert!(snapshot.last_seen.unwrap() >= before);
    assert_eq!(snapshot.last_seen, stamp);
}

#[tokio::test]
async fn second_handle_keeps_user_online() {
    let dispatcher = Dispatcher::new();
    let user = Uuid::new_v4();

    let (h1, first) = dispatcher.connect(user, "alice").await;
    let (h2, second) = dispatcher.connect(user, "alice").await;
    assert!(first);
    assert!(!second);

    assert!(dispatcher.disconnect(user, h1.conn_id).await.is_none());
    assert!(dispatcher.status(user).await.online);

    assert!(dispatcher.disconnect(user, h2.conn_id).await.is_some());
    assert!(!dispatcher.status(user).await.online);
}

#[tokio::test]
async fn room_broadcast_is_at_most_once_and_join_is_idempotent() {
    let dispatcher = Dispatcher::new();
    let user = Uuid::new_v4();
    let conversation = Uuid::new_v4();

    let (mut handle, _) = dispatcher.connect(user, "alice").await;
    dispatcher
        .join(conversation, handle.conn_id, handle.sender.clone())
        .await;
    dispatcher
        .join(conversation, handle.conn_id, handle.sender.clone())
        .await;

    drain(&mut handle.events);
    dispatcher
        .broadcast(
            conversation,
            GatewayEvent::TypingStarted {
                conversation_id: conversation,
                user_id: user,
            },
        )
        .await;

    let events = drain(&mut handle.events);
    assert_eq!(events.len(), 1, "double join must not duplicate delivery");
}

#[tokio::test]
async fn notify_user_bypasses_room_membership() {
    let dispatcher = Dispatcher::new();
    let user = Uuid::new_v4();
    let conversation = Uuid::new_v4();

    let (mut handle, _) = dispatcher.connect(user, "bob").await;
    drain(&mut handle.events);

    // Never joined the room, still reachable directly.
    dispatcher
        .notify_user(
            user,
            GatewayEvent::MemberRemoved {
                conversation_id: conversation,
                member_id: user,
            },
        )
        .await;

    let events = drain(&mut handle.events);
    assert!(matches!(
        events.as_slice(),
        [GatewayEvent::MemberRemoved { .. }]
    ));

    // Unreachable recipient is a no-op, not an error.
    dispatcher
        .notify_user(
            Uuid::new_v4(),
            GatewayEvent::MemberRemoved {
                conversation_id: conversation,
                member_id: user,
            },
        )
        .await;
}

#[tokio::test]
async fn first_contact_dm_reaches_sender_room_and_recipient_badge() {
    let (state, db) = test_state();
    let a = seed_user(&db, "alice");
    let b = seed_user(&db, "bob");

    let (mut conn_a, _) = state.dispatcher.connect(a, "alice").await;
    let (mut conn_b, _) = state.dispatcher.connect(b, "bob").await;
    drain(&mut conn_a.events);
    drain(&mut conn_b.events);

    send(
        &state,
        a,
        "alice",
        &conn_a,
        GatewayCommand::SendMessage {
            to: SendTarget::User { id: b },
            content: "hi".into(),
            nonce: None,
            signature: None,
            reply_to: None,
        },
    )
    .await;

    // Exactly one dm conversation exists for the pair.
    let resolved = state.chat.resolve_direct(b, a).unwrap();
    assert_eq!(resolved.participants.len(), 2);

    // Sender joined the room lazily and saw the broadcast.
    let a_events = drain(&mut conn_a.events);
    assert!(a_events.iter().any(|e| matches!(
        e,
        GatewayEvent::MessageCreated { conversation_id, .. } if *conversation_id == resolved.id
    )));

    // B never joined the room: no broadcast, but a direct badge.
    let b_events = drain(&mut conn_b.events);
    assert!(
        !b_events
            .iter()
            .any(|e| matches!(e, GatewayEvent::MessageCreated { .. }))
    );
    assert!(b_events.iter().any(|e| matches!(
        e,
        GatewayEvent::DirectMessageNotice { sender, .. } if sender.id == a
    )));
}

#[tokio::test]
async fn group_admin_flow_with_eviction() {
    let (state, db) = test_state();
    let admin = seed_user(&db, "admin");
    let m = seed_user(&db, "mallory");
    let n = seed_user(&db, "nina");

    let (mut conn_admin, _) = state.dispatcher.connect(admin, "admin").await;
    let (mut conn_m, _) = state.dispatcher.connect(m, "mallory").await;
    drain(&mut conn_admin.events);
    drain(&mut conn_m.events);

    send(
        &state,
        admin,
        "admin",
        &conn_admin,
        GatewayCommand::CreateGroup { name: "Team".into() },
    )
    .await;

    let created = drain(&mut conn_admin.events);
    let group_id = match created.as_slice() {
        [GatewayEvent::ConversationCreated { conversation }] => conversation.id,
        other => panic!("expected ConversationCreated, got {:?}", other),
    };

    send(
        &state,
        admin,
        "admin",
        &conn_admin,
        GatewayCommand::AddMember {
            conversation_id: group_id,
            member_id: m,
        },
    )
    .await;

    // Both open the conversation.
    send(
        &state,
        admin,
        "admin",
        &conn_admin,
        GatewayCommand::JoinConversation { conversation_id: group_id },
    )
    .await;
    send(
        &state,
        m,
        "mallory",
        &conn_m,
        GatewayCommand::JoinConversation { conversation_id: group_id },
    )
    .await;
    drain(&mut conn_admin.events);
    drain(&mut conn_m.events);

    // Non-admin cannot add members; only the actor sees the failure.
    send(
        &state,
        m,
        "mallory",
        &conn_m,
        GatewayCommand::AddMember {
            conversation_id: group_id,
            member_id: n,
        },
    )
    .await;
    let m_events = drain(&mut conn_m.events);
    assert!(m_events.iter().any(|e| matches!(
        e,
        GatewayEvent::Error { message } if message.contains("permission denied")
    )));
    assert!(drain(&mut conn_admin.events).is_empty());

    // Admin removes M: remaining room members see it, M is evicted.
    send(
        &state,
        admin,
        "admin",
        &conn_admin,
        GatewayCommand::RemoveMember {
            conversation_id: group_id,
            member_id: m,
        },
    )
    .await;

    let admin_events = drain(&mut conn_admin.events);
    assert!(admin_events.iter().any(|e| matches!(
        e,
        GatewayEvent::MemberRemoved { member_id, .. } if *member_id == m
    )));
    // The removed member still sees their own removal...
    let m_events = drain(&mut conn_m.events);
    assert!(m_events.iter().any(|e| matches!(
        e,
        GatewayEvent::MemberRemoved { member_id, .. } if *member_id == m
    )));

    assert!(!state.chat.conversation(group_id).unwrap().is_participant(m));

    // ...but nothing after it.
    send(
        &state,
        admin,
        "admin",
        &conn_admin,
        GatewayCommand::SendMessage {
            to: SendTarget::Conversation { id: group_id },
            content: "post-removal".into(),
            nonce: None,
            signature: None,
            reply_to: None,
        },
    )
    .await;

    assert!(drain(&mut conn_admin.events).iter().any(|e| matches!(
        e,
        GatewayEvent::MessageCreated { .. }
    )));
    assert!(
        !drain(&mut conn_m.events)
            .iter()
            .any(|e| matches!(e, GatewayEvent::MessageCreated { .. }))
    );
}
