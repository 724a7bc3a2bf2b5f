//! Fan-out of realtime events to connected WebSocket clients.
//!
//! One global channel carries announcements and quiz-status updates to every
//! connection; per-room channels carry room-scoped traffic (presence changes,
//! chat messages). Delivery is strictly best-effort: events are dropped when
//! no subscriber is connected at emission time, and callers cannot tell
//! "delivered" apart from "nobody listening". The hub is built once at
//! startup and handed to components by reference, never stashed in a global.

use crate::protocol::ServerMessage;
use crate::types::*;
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};

const CHANNEL_CAPACITY: usize = 100;

/// A logical event handed to the dispatcher. Transient: it exists only for
/// the duration of the dispatch call and is never persisted.
#[derive(Debug, Clone)]
pub enum BroadcastEvent {
    /// Global scope
    Announcement {
        id: String,
        message: String,
        kind: AnnouncementKind,
        quiz_id: Option<QuizId>,
        sent_by: UserId,
        sent_at: String,
    },
    /// Global scope
    QuizStatus {
        quiz_id: QuizId,
        kind: AnnouncementKind,
        message: String,
        sent_by: UserId,
    },
    /// Scoped to the named room's subscribers
    Presence {
        user_id: UserId,
        is_online: bool,
        room_id: RoomId,
    },
}

pub struct BroadcastHub {
    global: broadcast::Sender<ServerMessage>,
    rooms: RwLock<HashMap<RoomId, broadcast::Sender<ServerMessage>>>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        let (global, _rx) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            global,
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Every connection subscribes to the global stream on connect
    pub fn subscribe_global(&self) -> broadcast::Receiver<ServerMessage> {
        self.global.subscribe()
    }

    /// Subscribe to one room's stream, creating the channel on first use
    pub async fn subscribe_room(&self, room_id: &str) -> broadcast::Receiver<ServerMessage> {
        if let Some(tx) = self.rooms.read().await.get(room_id) {
            return tx.subscribe();
        }

        let mut rooms = self.rooms.write().await;
        rooms
            .entry(room_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Fan an event out to its scope. Never fails and never touches
    /// persisted state; send errors (no receivers) are swallowed.
    pub async fn dispatch(&self, event: BroadcastEvent) {
        match event {
            BroadcastEvent::Announcement {
                id,
                message,
                kind,
                quiz_id,
                sent_by,
                sent_at,
            } => {
                let _ = self.global.send(ServerMessage::NewAnnouncement {
                    id,
                    message,
                    kind,
                    quiz_id,
                    sent_by,
                    sent_at,
                });
            }
            BroadcastEvent::QuizStatus {
                quiz_id,
                kind,
                message,
                sent_by,
            } => {
                let _ = self.global.send(ServerMessage::QuizStatus {
                    quiz_id,
                    kind,
                    message,
                    sent_by,
                });
            }
            BroadcastEvent::Presence {
                user_id,
                is_online,
                room_id,
            } => {
                let msg = ServerMessage::Presence {
                    user_id,
                    is_online,
                    room_id: Some(room_id.clone()),
                };
                self.send_to_room(&room_id, msg).await;
            }
        }
    }

    /// Push a message to one room's subscribers. A room nobody has ever
    /// subscribed to has no channel, which is the same as having no
    /// listeners: the message is dropped.
    pub async fn send_to_room(&self, room_id: &str, msg: ServerMessage) {
        if let Some(tx) = self.rooms.read().await.get(room_id) {
            let _ = tx.send(msg);
        }
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}
