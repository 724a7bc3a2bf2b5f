//! WebSocket connection handling.
//!
//! Every connection subscribes to the global broadcast stream; a room
//! subscription is toggled by Join/Leave. Room-scoped presence events
//! describe the user's presence in that room (joined = online, left =
//! offline), while the presence table keeps the authoritative snapshot.
//!
//! Closing the socket does NOT mark the user offline: presence only moves
//! on explicit pings, so a client that vanishes stays listed online. Known
//! limitation of the presence model, kept deliberately.

pub mod handlers;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::broadcast::BroadcastEvent;
use crate::error::ServiceError;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use crate::types::{RoomId, User};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// WebSocket upgrade handler. The token is checked before the upgrade so
/// an unknown client never gets a socket.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ServiceError> {
    let token = params.token.ok_or(ServiceError::Unauthorized)?;
    let user = state
        .store
        .user_by_token(&token)
        .await?
        .ok_or(ServiceError::Unauthorized)?;

    tracing::info!(user_id = %user.id, role = user.role.as_str(), "WebSocket connection request");

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, user, state)))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, user: User, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let welcome = ServerMessage::Welcome {
        protocol: "1.0".to_string(),
        role: user.role,
        user_id: user.id.clone(),
        server_now: chrono::Utc::now().to_rfc3339(),
    };
    if send_json(&mut sender, &welcome).await.is_err() {
        tracing::error!("Failed to send welcome message");
        return;
    }

    let mut global_rx = state.hub.subscribe_global();

    // Room subscription, present only between Join and Leave
    let mut room_rx: Option<(RoomId, broadcast::Receiver<ServerMessage>)> = None;

    loop {
        tokio::select! {
            // Global broadcasts (announcements, quiz-status)
            broadcast_msg = global_rx.recv() => {
                if let Ok(msg) = broadcast_msg {
                    if send_json(&mut sender, &msg).await.is_err() {
                        break;
                    }
                }
            }

            // Room-scoped broadcasts (presence, chat messages)
            room_msg = async {
                match &mut room_rx {
                    Some((_, rx)) => rx.recv().await.ok(),
                    None => {
                        // Not in a room: wait forever
                        std::future::pending::<Option<ServerMessage>>().await
                    }
                }
            } => {
                if let Some(msg) = room_msg {
                    if send_json(&mut sender, &msg).await.is_err() {
                        break;
                    }
                }
            }

            // Client messages
            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received message: {}", text);

                        match serde_json::from_str::<ClientMessage>(&text) {
                            // Join/Leave swap this connection's room
                            // receiver, so they are handled here rather
                            // than in the shared dispatch.
                            Ok(ClientMessage::Join { room_id }) => {
                                let reply = match join_room(&state, &user, &room_id).await {
                                    Ok(rx) => {
                                        room_rx = Some((room_id.clone(), rx));
                                        ServerMessage::Joined { room_id }
                                    }
                                    Err(reply) => reply,
                                };
                                if send_json(&mut sender, &reply).await.is_err() {
                                    break;
                                }
                            }
                            Ok(ClientMessage::Leave) => {
                                let reply = match room_rx.take() {
                                    Some((room_id, _)) => {
                                        leave_room(&state, &user, &room_id).await;
                                        ServerMessage::Left { room_id }
                                    }
                                    None => ServerMessage::Error {
                                        code: "NOT_IN_ROOM".to_string(),
                                        msg: "Join a room before leaving one".to_string(),
                                    },
                                };
                                if send_json(&mut sender, &reply).await.is_err() {
                                    break;
                                }
                            }
                            Ok(client_msg) => {
                                if let Some(response) =
                                    handlers::handle_message(client_msg, &user, &state).await
                                {
                                    if send_json(&mut sender, &response).await.is_err() {
                                        break;
                                    }
                                }
                            }
                            Err(e) => {
                                tracing::error!("Failed to parse client message: {}", e);
                                let error = ServerMessage::Error {
                                    code: "PARSE_ERROR".to_string(),
                                    msg: format!("Invalid message format: {}", e),
                                };
                                let _ = send_json(&mut sender, &error).await;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket closed");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    tracing::info!(user_id = %user.id, "WebSocket connection closed");
}

async fn send_json<S>(sender: &mut S, msg: &ServerMessage) -> Result<(), ()>
where
    S: SinkExt<Message> + Unpin,
{
    let json = serde_json::to_string(msg).map_err(|_| ())?;
    sender
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| ())
}

/// Check the room, subscribe, and mark the user present in it
async fn join_room(
    state: &Arc<AppState>,
    user: &User,
    room_id: &str,
) -> Result<broadcast::Receiver<ServerMessage>, ServerMessage> {
    let room = match state.store.room(room_id).await {
        Ok(Some(room)) => room,
        Ok(None) => {
            return Err(ServerMessage::Error {
                code: "ROOM_NOT_FOUND".to_string(),
                msg: format!("No room {room_id}"),
            })
        }
        Err(e) => return Err(storage_error(e)),
    };
    if !room.is_active {
        return Err(ServerMessage::Error {
            code: "ROOM_INACTIVE".to_string(),
            msg: "This room has not opened yet".to_string(),
        });
    }

    let rx = state.hub.subscribe_room(room_id).await;

    if let Err(e) = state
        .store
        .set_presence(&user.id, user.role, true, Some(room_id))
        .await
    {
        return Err(storage_error(e));
    }

    state
        .hub
        .dispatch(BroadcastEvent::Presence {
            user_id: user.id.clone(),
            is_online: true,
            room_id: room_id.to_string(),
        })
        .await;

    Ok(rx)
}

/// Clear the room association and tell the room the user is gone
async fn leave_room(state: &Arc<AppState>, user: &User, room_id: &str) {
    if let Err(e) = state
        .store
        .set_presence(&user.id, user.role, true, None)
        .await
    {
        tracing::error!("failed to clear room presence: {}", e);
    }

    state
        .hub
        .dispatch(BroadcastEvent::Presence {
            user_id: user.id.clone(),
            is_online: false,
            room_id: room_id.to_string(),
        })
        .await;
}

pub(crate) fn storage_error(e: sqlx::Error) -> ServerMessage {
    tracing::error!("storage error: {}", e);
    ServerMessage::Error {
        code: "STORAGE".to_string(),
        msg: "Storage error".to_string(),
    }
}
