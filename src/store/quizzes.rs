use super::{now, Store};
use crate::types::*;

impl Store {
    /// Insert a quiz together with its companion rooms: pre-quiz and
    /// general discussion open immediately, the post-quiz review room is
    /// created locked and only opens on the first completion.
    pub async fn create_quiz(&self, title: &str) -> Result<Quiz, sqlx::Error> {
        let quiz = Quiz {
            id: ulid::Ulid::new().to_string(),
            title: title.to_string(),
            created_at: now(),
        };

        sqlx::query("INSERT INTO quizzes (id, title, created_at) VALUES (?, ?, ?)")
            .bind(&quiz.id)
            .bind(&quiz.title)
            .bind(&quiz.created_at)
            .execute(self.pool())
            .await?;

        for (suffix, room_type) in [
            ("discussion", RoomType::QuizDiscussion),
            ("before you start", RoomType::PreQuizDiscussion),
            ("review", RoomType::PostQuizReview),
        ] {
            self.create_room(
                &format!("{}: {}", quiz.title, suffix),
                room_type,
                Some(&quiz.id),
            )
            .await?;
        }

        Ok(quiz)
    }

    pub async fn quiz(&self, id: &str) -> Result<Option<Quiz>, sqlx::Error> {
        let row: Option<(String, String, String)> =
            sqlx::query_as("SELECT id, title, created_at FROM quizzes WHERE id = ?")
                .bind(id)
                .fetch_optional(self.pool())
                .await?;

        Ok(row.map(|(id, title, created_at)| Quiz {
            id,
            title,
            created_at,
        }))
    }
}
