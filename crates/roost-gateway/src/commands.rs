//! Inbound command handling: domain calls run on the blocking pool, the
//! results fan out through the dispatcher. Domain failures go back to the
//! acting connection as an `Error` event and nowhere else.

use tracing::{debug, error};
use uuid::Uuid;

use roost_chat::{ChatError, ChatResult, ChatService, MessageDraft, authority};
use roost_types::events::{GatewayCommand, GatewayEvent, SendTarget};
use roost_types::models::{ConversationKind, Modification, UserSummary};

use crate::GatewayState;
use crate::presence::EventSender;

/// Run a synchronous domain operation off the async runtime.
async fn run_chat<T, F>(chat: &ChatService, f: F) -> ChatResult<T>
where
    F: FnOnce(ChatService) -> ChatResult<T> + Send + 'static,
    T: Send + 'static,
{
    let chat = chat.clone();
    match tokio::task::spawn_blocking(move || f(chat)).await {
        Ok(result) => result,
        Err(e) => {
            error!("blocking chat task failed to join: {}", e);
            Err(ChatError::Storage(anyhow::anyhow!("blocking task failed")))
        }
    }
}

fn reply_error(tx: &EventSender, err: &ChatError) {
    debug!("command failed: {}", err);
    let _ = tx.send(GatewayEvent::Error {
        message: err.to_string(),
    });
}

pub async fn dispatch(
    state: &GatewayState,
    user_id: Uuid,
    username: &str,
    conn_id: Uuid,
    tx: &EventSender,
    cmd: GatewayCommand,
) {
    match cmd {
        GatewayCommand::Identify { .. } => {} // Already handled at handshake

        GatewayCommand::SendMessage {
            to,
            content,
            nonce,
            signature,
            reply_to,
        } => {
            let draft = MessageDraft {
                content,
                nonce,
                signature,
                reply_to,
            };
            let result = run_chat(&state.chat, move |chat| {
                let conversation_id = match to {
                    SendTarget::Conversation { id } => id,
                    SendTarget::User { id } => chat.resolve_direct(user_id, id)?.id,
                };
                chat.send(user_id, conversation_id, draft)
            })
            .await;

            match result {
                Ok((conversation, message)) => {
                    // First interaction joins the sender's connection to
                    // the conversation's room.
                    state
                        .dispatcher
                        .join(conversation.id, conn_id, tx.clone())
                        .await;

                    state
                        .dispatcher
                        .broadcast(
                            conversation.id,
                            GatewayEvent::MessageCreated {
                                conversation_id: conversation.id,
                                message,
                            },
                        )
                        .await;

                    // Participants without the room open still get a badge.
                    let sender = UserSummary {
                        id: user_id,
                        username: username.to_string(),
                    };
                    for participant in conversation
                        .participants
                        .iter()
                        .copied()
                        .filter(|p| *p != user_id)
                    {
                        let notice = match conversation.kind {
                            ConversationKind::Dm => GatewayEvent::DirectMessageNotice {
                                conversation_id: conversation.id,
                                sender: sender.clone(),
                            },
                            ConversationKind::Group => GatewayEvent::GroupMessageNotice {
                                conversation_id: conversation.id,
                                name: conversation.name.clone(),
                                sender: sender.clone(),
                            },
                        };
                        state.dispatcher.notify_user(participant, notice).await;
                    }
                }
                Err(e) => reply_error(tx, &e),
            }
        }

        GatewayCommand::EditMessage {
            message_id,
            content,
        } => {
            let result =
                run_chat(&state.chat, move |chat| chat.edit(user_id, message_id, &content)).await;

            match result {
                Ok((conversation, message)) => {
                    state
                        .dispatcher
                        .broadcast(
                            conversation.id,
                            GatewayEvent::MessageUpdated {
                                conversation_id: conversation.id,
                                message,
                            },
                        )
                        .await;
                }
                Err(e) => reply_error(tx, &e),
            }
        }

        GatewayCommand::DeleteMessage { message_id } => {
            let result = run_chat(&state.chat, move |chat| chat.delete(user_id, message_id)).await;

            match result {
                Ok((conversation, message)) => {
                    state
                        .dispatcher
                        .broadcast(
                            conversation.id,
                            GatewayEvent::MessageDeleted {
                                conversation_id: conversation.id,
                                message_id: message.id,
                                modification: message
                                    .modification
                                    .unwrap_or(Modification::Deleted),
                            },
                        )
                        .await;
                }
                Err(e) => reply_error(tx, &e),
            }
        }

        GatewayCommand::CreateGroup { name } => {
            let result =
                run_chat(&state.chat, move |chat| chat.create_group(user_id, &name)).await;

            match result {
                Ok(conversation) => {
                    let _ = tx.send(GatewayEvent::ConversationCreated { conversation });
                }
                Err(e) => reply_error(tx, &e),
            }
        }

        GatewayCommand::RenameConversation {
            conversation_id,
            name,
        } => {
            let result = run_chat(&state.chat, move |chat| {
                chat.rename(conversation_id, user_id, &name)
            })
            .await;

            match result {
                Ok(conversation) => {
                    state
                        .dispatcher
                        .broadcast(
                            conversation.id,
                            GatewayEvent::ConversationRenamed {
                                conversation_id: conversation.id,
                                name: conversation.name.unwrap_or_default(),
                            },
                        )
                        .await;
                }
                Err(e) => reply_error(tx, &e),
            }
        }

        GatewayCommand::AddMember {
            conversation_id,
            member_id,
        } => {
            let result = run_chat(&state.chat, move |chat| {
                chat.add_member(conversation_id, user_id, member_id)
            })
            .await;

            match result {
                Ok((conversation, member)) => {
                    state
                        .dispatcher
                        .broadcast(
                            conversation.id,
                            GatewayEvent::MemberAdded {
                                conversation_id: conversation.id,
                                member,
                            },
                        )
                        .await;
                }
                Err(e) => reply_error(tx, &e),
            }
        }

        GatewayCommand::RemoveMember {
            conversation_id,
            member_id,
        } => {
            let result = run_chat(&state.chat, move |chat| {
                chat.remove_member(conversation_id, user_id, member_id)
            })
            .await;

            match result {
                Ok(conversation) => {
                    // Broadcast first so the removed member sees the event,
                    // then drop their handles from the room.
                    state
                        .dispatcher
                        .broadcast(
                            conversation.id,
                            GatewayEvent::MemberRemoved {
                                conversation_id: conversation.id,
                                member_id,
                            },
                        )
                        .await;
                    state.dispatcher.evict_user(conversation.id, member_id).await;
                }
                Err(e) => reply_error(tx, &e),
            }
        }

        GatewayCommand::JoinConversation { conversation_id } => {
            let result = run_chat(&state.chat, move |chat| {
                let conversation = chat.conversation(conversation_id)?;
                if !authority::can_post(&conversation, user_id) {
                    return Err(ChatError::PermissionDenied(
                        "cannot join this conversation",
                    ));
                }
                Ok(conversation)
            })
            .await;

            match result {
                Ok(conversation) => {
                    state
                        .dispatcher
                        .join(conversation.id, conn_id, tx.clone())
                        .await;
                }
                Err(e) => reply_error(tx, &e),
            }
        }

        GatewayCommand::FetchHistory {
            conversation_id,
            page,
            size,
        } => {
            let result = run_chat(&state.chat, move |chat| {
                chat.history(user_id, conversation_id, page, size)
            })
            .await;

            match result {
                Ok(messages) => {
                    // Reading history counts as opening the conversation.
                    state
                        .dispatcher
                        .join(conversation_id, conn_id, tx.clone())
                        .await;
                    let _ = tx.send(GatewayEvent::History {
                        conversation_id,
                        messages,
                    });
                }
                Err(e) => reply_error(tx, &e),
            }
        }

        GatewayCommand::StartTyping { conversation_id } => {
            state
                .dispatcher
                .join(conversation_id, conn_id, tx.clone())
                .await;
            state
                .dispatcher
                .broadcast(
                    conversation_id,
                    GatewayEvent::TypingStarted {
                        conversation_id,
                        user_id,
                    },
                )
                .await;
        }

        GatewayCommand::StopTyping { conversation_id } => {
            state
                .dispatcher
                .join(conversation_id, conn_id, tx.clone())
                .await;
            state
                .dispatcher
                .broadcast(
                    conversation_id,
                    GatewayEvent::TypingStopped {
                        conversation_id,
                        user_id,
                    },
                )
                .await;
        }

        GatewayCommand::CheckStatus { user_id: target } => {
            let snapshot = state.dispatcher.status(target).await;
            if snapshot.online {
                let _ = tx.send(GatewayEvent::PresenceStatus {
                    user_id: target,
                    online: true,
                    last_seen: snapshot.last_seen,
                });
                return;
            }

            // Offline: fall back to the store mirror, which survives
            // process restarts.
            let result = run_chat(&state.chat, move |chat| chat.user(target)).await;
            match result {
                Ok(user) => {
                    let _ = tx.send(GatewayEvent::PresenceStatus {
                        user_id: target,
                        online: false,
                        last_seen: snapshot.last_seen.or(user.last_seen),
                    });
                }
                Err(e) => reply_error(tx, &e),
            }
        }
    }
}
