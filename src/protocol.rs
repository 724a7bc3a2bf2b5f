use crate::types::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Associate this connection (and the user's presence) with a room
    Join {
        room_id: RoomId,
    },
    /// Drop the room association; the connection stays up
    Leave,
    /// Presence heartbeat. Last write wins; there is no server-side expiry,
    /// so a client that wants to show as offline must say so explicitly.
    PresencePing {
        is_online: bool,
        room_id: Option<RoomId>,
    },
    SendMessage {
        room_id: RoomId,
        content: String,
    },
    /// Snapshot of who is currently online in a room
    Roster {
        room_id: RoomId,
    },
    // Staff-only messages
    Announce {
        message: String,
        kind: AnnouncementKind,
        quiz_id: Option<QuizId>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        protocol: String,
        role: Role,
        user_id: UserId,
        server_now: String,
    },
    NewAnnouncement {
        id: String,
        message: String,
        kind: AnnouncementKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        quiz_id: Option<QuizId>,
        sent_by: UserId,
        sent_at: String,
    },
    QuizStatus {
        quiz_id: QuizId,
        kind: AnnouncementKind,
        message: String,
        sent_by: UserId,
    },
    Presence {
        user_id: UserId,
        is_online: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        room_id: Option<RoomId>,
    },
    NewMessage {
        message: ChatMessage,
    },
    Roster {
        room_id: RoomId,
        online: Vec<PresenceRecord>,
    },
    Joined {
        room_id: RoomId,
    },
    Left {
        room_id: RoomId,
    },
    Error {
        code: String,
        msg: String,
    },
}
