use super::{now, Store};
use crate::types::*;

type AttemptRow = (String, String, String, String, Option<String>);

impl Store {
    pub async fn start_attempt(
        &self,
        quiz_id: &str,
        user_id: &str,
    ) -> Result<QuizAttempt, sqlx::Error> {
        let attempt = QuizAttempt {
            id: ulid::Ulid::new().to_string(),
            quiz_id: quiz_id.to_string(),
            user_id: user_id.to_string(),
            started_at: now(),
            completed_at: None,
        };

        sqlx::query(
            "INSERT INTO quiz_attempts (id, quiz_id, user_id, started_at, completed_at) \
             VALUES (?, ?, ?, ?, NULL)",
        )
        .bind(&attempt.id)
        .bind(&attempt.quiz_id)
        .bind(&attempt.user_id)
        .bind(&attempt.started_at)
        .execute(self.pool())
        .await?;

        Ok(attempt)
    }

    pub async fn attempt(&self, id: &str) -> Result<Option<QuizAttempt>, sqlx::Error> {
        let row: Option<AttemptRow> = sqlx::query_as(
            "SELECT id, quiz_id, user_id, started_at, completed_at \
             FROM quiz_attempts WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(attempt_from_row))
    }

    /// Stamp completed_at if it is still unset. Returns the stored attempt
    /// plus whether this call did the stamping; a repeat call is a no-op
    /// that leaves the original timestamp untouched.
    pub async fn complete_attempt(
        &self,
        id: &str,
    ) -> Result<Option<(QuizAttempt, bool)>, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE quiz_attempts SET completed_at = ? WHERE id = ? AND completed_at IS NULL",
        )
        .bind(now())
        .bind(id)
        .execute(self.pool())
        .await?;

        let stamped_now = result.rows_affected() > 0;
        Ok(self.attempt(id).await?.map(|a| (a, stamped_now)))
    }
}

fn attempt_from_row(
    (id, quiz_id, user_id, started_at, completed_at): AttemptRow,
) -> QuizAttempt {
    QuizAttempt {
        id,
        quiz_id,
        user_id,
        started_at,
        completed_at,
    }
}
