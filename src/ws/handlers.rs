//! WebSocket message dispatch
//!
//! Role checks happen here, then each message is serviced against the
//! store and the broadcast hub. Join/Leave never reach this module; they
//! change connection-local state and live in the socket loop.

use crate::broadcast::BroadcastEvent;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use crate::types::*;
use std::sync::Arc;

use super::storage_error;

/// Macro to check staff authorization and return early if forbidden
macro_rules! check_staff {
    ($user:expr, $action:expr) => {
        if !$user.role.is_staff() {
            return Some(ServerMessage::Error {
                code: "FORBIDDEN".to_string(),
                msg: format!("Only teachers can {}", $action),
            });
        }
    };
}

/// Handle client messages and return optional response
pub async fn handle_message(
    msg: ClientMessage,
    user: &User,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    match msg {
        // Connection-scoped; serviced by the socket loop
        ClientMessage::Join { .. } | ClientMessage::Leave => None,

        ClientMessage::PresencePing {
            is_online,
            room_id,
        } => handle_presence_ping(state, user, is_online, room_id).await,

        ClientMessage::SendMessage { room_id, content } => {
            handle_send_message(state, user, room_id, content).await
        }

        ClientMessage::Roster { room_id } => handle_roster(state, room_id).await,

        ClientMessage::Announce {
            message,
            kind,
            quiz_id,
        } => {
            check_staff!(user, "send announcements");
            handle_announce(state, user, message, kind, quiz_id).await
        }
    }
}

/// Presence is a fire-and-forget heartbeat: upsert, fan the change out to
/// the room it names, no acknowledgement.
async fn handle_presence_ping(
    state: &Arc<AppState>,
    user: &User,
    is_online: bool,
    room_id: Option<RoomId>,
) -> Option<ServerMessage> {
    if let Err(e) = state
        .store
        .set_presence(&user.id, user.role, is_online, room_id.as_deref())
        .await
    {
        return Some(storage_error(e));
    }

    if let Some(room_id) = room_id {
        state
            .hub
            .dispatch(BroadcastEvent::Presence {
                user_id: user.id.clone(),
                is_online,
                room_id,
            })
            .await;
    }
    None
}

async fn handle_send_message(
    state: &Arc<AppState>,
    user: &User,
    room_id: RoomId,
    content: String,
) -> Option<ServerMessage> {
    let content = content.trim();
    if content.is_empty() {
        return Some(ServerMessage::Error {
            code: "VALIDATION".to_string(),
            msg: "Message content must not be empty".to_string(),
        });
    }

    let room = match state.store.room(&room_id).await {
        Ok(Some(room)) => room,
        Ok(None) => {
            return Some(ServerMessage::Error {
                code: "ROOM_NOT_FOUND".to_string(),
                msg: format!("No room {room_id}"),
            })
        }
        Err(e) => return Some(storage_error(e)),
    };
    if !room.is_active {
        return Some(ServerMessage::Error {
            code: "ROOM_INACTIVE".to_string(),
            msg: "This room has not opened yet".to_string(),
        });
    }

    let message = match state
        .store
        .insert_message(&room.id, Some(&user.id), content, false)
        .await
    {
        Ok(message) => message,
        Err(e) => return Some(storage_error(e)),
    };

    state
        .hub
        .send_to_room(&room.id, ServerMessage::NewMessage { message })
        .await;
    None
}

async fn handle_roster(state: &Arc<AppState>, room_id: RoomId) -> Option<ServerMessage> {
    let filter = PresenceFilter {
        room_id: Some(room_id.clone()),
        role: None,
    };
    match state.store.list_online(&filter).await {
        Ok(online) => Some(ServerMessage::Roster { room_id, online }),
        Err(e) => Some(storage_error(e)),
    }
}

/// Persist the announcement into the General room, then push it to every
/// connected client. The sender hears it back over the global stream, so
/// there is no direct reply.
async fn handle_announce(
    state: &Arc<AppState>,
    user: &User,
    message: String,
    kind: AnnouncementKind,
    quiz_id: Option<QuizId>,
) -> Option<ServerMessage> {
    let message = message.trim();
    if message.is_empty() {
        return Some(ServerMessage::Error {
            code: "VALIDATION".to_string(),
            msg: "Announcement message must not be empty".to_string(),
        });
    }

    match state.store.general_room().await {
        Ok(Some(room)) => {
            if let Err(e) = state.store.insert_message(&room.id, None, message, true).await {
                return Some(storage_error(e));
            }
        }
        Ok(None) => {}
        Err(e) => return Some(storage_error(e)),
    }

    state
        .hub
        .dispatch(BroadcastEvent::Announcement {
            id: ulid::Ulid::new().to_string(),
            message: message.to_string(),
            kind,
            quiz_id,
            sent_by: user.id.clone(),
            sent_at: chrono::Utc::now().to_rfc3339(),
        })
        .await;
    None
}
