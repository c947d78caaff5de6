use std::sync::Arc;

use uuid::Uuid;

use roost_chat::{ChatError, ChatService, MessageDraft};
use roost_db::Database;
use roost_db::models::fmt_timestamp;
use roost_types::models::{ConversationKind, Modification};

fn seed_user(db: &Database, username: &str) -> Uuid {
    let id = Uuid::new_v4();
    db.create_user(
        &id.to_string(),
        username,
        "argon2-hash-placeholder",
        &fmt_timestamp(chrono::Utc::now()),
    )
    .expect("create user");
    id
}

fn draft(content: &str) -> MessageDraft {
    MessageDraft {
        content: content.to_string(),
        ..Default::default()
    }
}

#[test]
fn direct_resolution_is_idempotent() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let chat = ChatService::new(db.clone());
    let a = seed_user(&db, "alice");
    let b = seed_user(&db, "bob");

    let first = chat.resolve_direct(a, b).unwrap();
    let second = chat.resolve_direct(b, a).unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.kind, ConversationKind::Dm);
    assert_eq!(first.participants.len(), 2);
    assert!(first.is_participant(a) && first.is_participant(b));
}

#[test]
fn concurrent_first_contact_yields_one_conversation() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let chat = ChatService::new(db.clone());
    let a = seed_user(&db, "alice");
    let b = seed_user(&db, "bob");

    let left = {
        let chat = chat.clone();
        std::thread::spawn(move || chat.resolve_direct(a, b).unwrap())
    };
    let right = {
        let chat = chat.clone();
        std::thread::spawn(move || chat.resolve_direct(b, a).unwrap())
    };

    let left = left.join().unwrap();
    let right = right.join().unwrap();

    assert_eq!(left.id, right.id);
}

#[test]
fn self_conversation_is_rejected() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let chat = ChatService::new(db.clone());
    let a = seed_user(&db, "alice");

    let err = chat.resolve_direct(a, a).unwrap_err();
    assert!(matches!(err, ChatError::InvalidArgument(_)));
}

#[test]
fn group_name_length_is_validated() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let chat = ChatService::new(db.clone());
    let admin = seed_user(&db, "admin");

    assert!(matches!(
        chat.create_group(admin, "x").unwrap_err(),
        ChatError::InvalidArgument(_)
    ));
    assert!(matches!(
        chat.create_group(admin, &"x".repeat(51)).unwrap_err(),
        ChatError::InvalidArgument(_)
    ));

    let group = chat.create_group(admin, "Team").unwrap();
    assert_eq!(group.kind, ConversationKind::Group);
    assert_eq!(group.admin_id, Some(admin));
    assert_eq!(group.participants, vec![admin]);
}

#[test]
fn membership_rules() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let chat = ChatService::new(db.clone());
    let admin = seed_user(&db, "admin");
    let m = seed_user(&db, "mallory");
    let n = seed_user(&db, "nina");

    let group = chat.create_group(admin, "Team").unwrap();

    // Admin adds M.
    let (group_after, member) = chat.add_member(group.id, admin, m).unwrap();
    assert_eq!(member.username, "mallory");
    assert!(group_after.is_participant(m));

    // Duplicate add conflicts.
    assert!(matches!(
        chat.add_member(group.id, admin, m).unwrap_err(),
        ChatError::Conflict(_)
    ));

    // Non-admin M cannot add N.
    assert!(matches!(
        chat.add_member(group.id, m, n).unwrap_err(),
        ChatError::PermissionDenied(_)
    ));

    // Unknown target user.
    assert!(matches!(
        chat.add_member(group.id, admin, Uuid::new_v4()).unwrap_err(),
        ChatError::NotFound(_)
    ));

    // Admin cannot be removed, not even by themselves.
    assert!(matches!(
        chat.remove_member(group.id, admin, admin).unwrap_err(),
        ChatError::InvalidOperation(_)
    ));

    // M cannot remove another member, but may leave.
    chat.add_member(group.id, admin, n).unwrap();
    assert!(matches!(
        chat.remove_member(group.id, m, n).unwrap_err(),
        ChatError::PermissionDenied(_)
    ));
    let after_leave = chat.remove_member(group.id, m, m).unwrap();
    assert!(!after_leave.is_participant(m));

    // Admin removes N.
    let after_remove = chat.remove_member(group.id, admin, n).unwrap();
    assert!(!after_remove.is_participant(n));

    // Removing a non-member is NotFound.
    assert!(matches!(
        chat.remove_member(group.id, admin, n).unwrap_err(),
        ChatError::NotFound(_)
    ));
}

#[test]
fn rename_is_admin_only() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let chat = ChatService::new(db.clone());
    let admin = seed_user(&db, "admin");
    let m = seed_user(&db, "member");

    let group = chat.create_group(admin, "Team").unwrap();
    chat.add_member(group.id, admin, m).unwrap();

    assert!(matches!(
        chat.rename(group.id, m, "Renamed").unwrap_err(),
        ChatError::PermissionDenied(_)
    ));

    let renamed = chat.rename(group.id, admin, "Renamed").unwrap();
    assert_eq!(renamed.name.as_deref(), Some("Renamed"));
}

#[test]
fn message_lifecycle_terminal_state() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let chat = ChatService::new(db.clone());
    let a = seed_user(&db, "alice");
    let b = seed_user(&db, "bob");

    let conv = chat.resolve_direct(a, b).unwrap();
    let (_, msg) = chat.send(a, conv.id, draft("hi")).unwrap();
    assert!(msg.modification.is_none());

    // Edit by a non-author is denied.
    assert!(matches!(
        chat.edit(b, msg.id, "changed").unwrap_err(),
        ChatError::PermissionDenied(_)
    ));

    let (_, edited) = chat.edit(a, msg.id, "hi there").unwrap();
    assert_eq!(edited.content, "hi there");
    assert_eq!(edited.modification, Some(Modification::Edited));

    let (_, deleted) = chat.delete(a, msg.id).unwrap();
    assert_eq!(deleted.modification, Some(Modification::Deleted));
    // Content is retained for audit.
    assert_eq!(deleted.content, "hi there");

    // Terminal state: no further transitions.
    assert!(matches!(
        chat.edit(a, msg.id, "again").unwrap_err(),
        ChatError::InvalidState(_)
    ));
    assert!(matches!(
        chat.delete(a, msg.id).unwrap_err(),
        ChatError::InvalidState(_)
    ));
}

#[test]
fn admin_delete_is_tagged_separately() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let chat = ChatService::new(db.clone());
    let admin = seed_user(&db, "admin");
    let m = seed_user(&db, "member");

    let group = chat.create_group(admin, "Team").unwrap();
    chat.add_member(group.id, admin, m).unwrap();

    let (_, msg) = chat.send(m, group.id, draft("hello")).unwrap();
    let (_, deleted) = chat.delete(admin, msg.id).unwrap();
    assert_eq!(deleted.modification, Some(Modification::DeletedByAdmin));
}

#[test]
fn empty_content_is_rejected() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let chat = ChatService::new(db.clone());
    let a = seed_user(&db, "alice");
    let b = seed_user(&db, "bob");

    let conv = chat.resolve_direct(a, b).unwrap();
    assert!(matches!(
        chat.send(a, conv.id, draft("   ")).unwrap_err(),
        ChatError::InvalidArgument(_)
    ));

    let (_, msg) = chat.send(a, conv.id, draft("hi")).unwrap();
    assert!(matches!(
        chat.edit(a, msg.id, "").unwrap_err(),
        ChatError::InvalidArgument(_)
    ));
}

#[test]
fn unresolvable_reply_is_dropped() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let chat = ChatService::new(db.clone());
    let a = seed_user(&db, "alice");
    let b = seed_user(&db, "bob");

    let conv = chat.resolve_direct(a, b).unwrap();

    let mut with_ghost_reply = draft("hi");
    with_ghost_reply.reply_to = Some(Uuid::new_v4());
    let (_, msg) = chat.send(a, conv.id, with_ghost_reply).unwrap();
    assert!(msg.reply_to.is_none());

    // A real reply in the same conversation survives.
    let mut real_reply = draft("re: hi");
    real_reply.reply_to = Some(msg.id);
    let (_, reply) = chat.send(b, conv.id, real_reply).unwrap();
    assert_eq!(reply.reply_to, Some(msg.id));

    // A reply pointing into another conversation is dropped too.
    let c = seed_user(&db, "carol");
    let other = chat.resolve_direct(a, c).unwrap();
    let mut cross_reply = draft("out of thread");
    cross_reply.reply_to = Some(msg.id);
    let (_, crossed) = chat.send(a, other.id, cross_reply).unwrap();
    assert!(crossed.reply_to.is_none());
}

#[test]
fn history_pages_are_clamped_and_chronological() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let chat = ChatService::new(db.clone());
    let admin = seed_user(&db, "admin");
    let m = seed_user(&db, "member");

    let group = chat.create_group(admin, "Team").unwrap();
    chat.add_member(group.id, admin, m).unwrap();

    for i in 0..120 {
        chat.send(admin, group.id, draft(&format!("msg {i}"))).unwrap();
    }

    // Requested size above the cap behaves exactly like the cap.
    let capped = chat.history(admin, group.id, 1, 200).unwrap();
    let max = chat.history(admin, group.id, 1, 50).unwrap();
    assert_eq!(capped.size, 50);
    assert_eq!(capped.total, 120);
    assert_eq!(capped.total_pages, 3);
    assert_eq!(
        capped.items.iter().map(|m| m.id).collect::<Vec<_>>(),
        max.items.iter().map(|m| m.id).collect::<Vec<_>>()
    );

    // Page 1 is the newest slice, chronological within the page.
    assert_eq!(capped.items.first().unwrap().content, "msg 70");
    assert_eq!(capped.items.last().unwrap().content, "msg 119");

    // The last page holds the oldest messages.
    let tail = chat.history(admin, group.id, 3, 50).unwrap();
    assert_eq!(tail.items.len(), 20);
    assert_eq!(tail.items.first().unwrap().content, "msg 0");
    assert_eq!(tail.items.last().unwrap().content, "msg 19");

    // Non-participants cannot read history.
    let outsider = seed_user(&db, "outsider");
    assert!(matches!(
        chat.history(outsider, group.id, 1, 20).unwrap_err(),
        ChatError::PermissionDenied(_)
    ));
}

#[test]
fn empty_conversation_pages_cleanly() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let chat = ChatService::new(db.clone());
    let a = seed_user(&db, "alice");
    let b = seed_user(&db, "bob");

    let conv = chat.resolve_direct(a, b).unwrap();
    let page = chat.history(a, conv.id, 1, 20).unwrap();

    assert!(page.items.is_empty());
    assert_eq!(page.total, 0);
    assert_eq!(page.total_pages, 0);
}
