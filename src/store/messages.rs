use super::{now, Store};
use crate::types::*;

type MessageRow = (String, String, Option<String>, String, bool, String);

impl Store {
    /// Insert a chat message. `user_id` is None for system messages
    /// synthesized by the platform (room activation, announcements).
    pub async fn insert_message(
        &self,
        room_id: &str,
        user_id: Option<&str>,
        content: &str,
        is_system: bool,
    ) -> Result<ChatMessage, sqlx::Error> {
        let message = ChatMessage {
            id: ulid::Ulid::new().to_string(),
            room_id: room_id.to_string(),
            user_id: user_id.map(str::to_string),
            content: content.to_string(),
            is_system_message: is_system,
            created_at: now(),
        };

        sqlx::query(
            "INSERT INTO chat_messages (id, room_id, user_id, content, is_system_message, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&message.id)
        .bind(&message.room_id)
        .bind(message.user_id.as_deref())
        .bind(&message.content)
        .bind(message.is_system_message)
        .bind(&message.created_at)
        .execute(self.pool())
        .await?;

        Ok(message)
    }

    pub async fn messages_for_room(
        &self,
        room_id: &str,
        limit: u32,
    ) -> Result<Vec<ChatMessage>, sqlx::Error> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT id, room_id, user_id, content, is_system_message, created_at \
             FROM chat_messages WHERE room_id = ? ORDER BY created_at, id LIMIT ?",
        )
        .bind(room_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(id, room_id, user_id, content, is_system_message, created_at)| ChatMessage {
                    id,
                    room_id,
                    user_id,
                    content,
                    is_system_message,
                    created_at,
                },
            )
            .collect())
    }

    pub async fn system_message_count(&self, room_id: &str) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM chat_messages WHERE room_id = ? AND is_system_message = 1",
        )
        .bind(room_id)
        .fetch_one(self.pool())
        .await?;
        Ok(count)
    }
}
