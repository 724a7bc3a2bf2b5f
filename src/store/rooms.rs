use super::{column_decode, now, Store};
use crate::types::*;

type RoomRow = (String, String, String, Option<String>, bool, String);

const ROOM_COLUMNS: &str = "id, name, room_type, quiz_id, is_active, created_at";

impl Store {
    pub async fn create_room(
        &self,
        name: &str,
        room_type: RoomType,
        quiz_id: Option<&str>,
    ) -> Result<ChatRoom, sqlx::Error> {
        let room = ChatRoom {
            id: ulid::Ulid::new().to_string(),
            name: name.to_string(),
            room_type,
            quiz_id: quiz_id.map(str::to_string),
            is_active: room_type.starts_active(),
            created_at: now(),
        };

        sqlx::query(
            "INSERT INTO chat_rooms (id, name, room_type, quiz_id, is_active, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&room.id)
        .bind(&room.name)
        .bind(room.room_type.as_str())
        .bind(room.quiz_id.as_deref())
        .bind(room.is_active)
        .bind(&room.created_at)
        .execute(self.pool())
        .await?;

        Ok(room)
    }

    pub async fn room(&self, id: &str) -> Result<Option<ChatRoom>, sqlx::Error> {
        let row: Option<RoomRow> = sqlx::query_as(&format!(
            "SELECT {ROOM_COLUMNS} FROM chat_rooms WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        row.map(room_from_row).transpose()
    }

    pub async fn rooms_for_quiz(&self, quiz_id: &str) -> Result<Vec<ChatRoom>, sqlx::Error> {
        let rows: Vec<RoomRow> = sqlx::query_as(&format!(
            "SELECT {ROOM_COLUMNS} FROM chat_rooms WHERE quiz_id = ? ORDER BY created_at"
        ))
        .bind(quiz_id)
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(room_from_row).collect()
    }

    /// The single platform-wide room seeded at migration time
    pub async fn general_room(&self) -> Result<Option<ChatRoom>, sqlx::Error> {
        let row: Option<RoomRow> = sqlx::query_as(&format!(
            "SELECT {ROOM_COLUMNS} FROM chat_rooms WHERE room_type = ? LIMIT 1"
        ))
        .bind(RoomType::General.as_str())
        .fetch_optional(self.pool())
        .await?;

        row.map(room_from_row).transpose()
    }

    /// Flip a quiz's review room to active. The WHERE clause carries the
    /// exactly-once guard: only an inactive review room matches, so of any
    /// number of concurrent callers exactly one sees the flipped row and
    /// owns the activation side effects. Returns None when nothing matched
    /// (already active, or the quiz has no review room).
    pub async fn activate_review_room(
        &self,
        quiz_id: &str,
    ) -> Result<Option<ChatRoom>, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE chat_rooms SET is_active = 1 \
             WHERE quiz_id = ? AND room_type = ? AND is_active = 0",
        )
        .bind(quiz_id)
        .bind(RoomType::PostQuizReview.as_str())
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        let row: Option<RoomRow> = sqlx::query_as(&format!(
            "SELECT {ROOM_COLUMNS} FROM chat_rooms WHERE quiz_id = ? AND room_type = ?"
        ))
        .bind(quiz_id)
        .bind(RoomType::PostQuizReview.as_str())
        .fetch_optional(self.pool())
        .await?;

        row.map(room_from_row).transpose()
    }
}

fn room_from_row(
    (id, name, room_type, quiz_id, is_active, created_at): RoomRow,
) -> Result<ChatRoom, sqlx::Error> {
    let room_type =
        RoomType::parse(&room_type).ok_or_else(|| column_decode("room_type", &room_type))?;
    Ok(ChatRoom {
        id,
        name,
        room_type,
        quiz_id,
        is_active,
        created_at,
    })
}
