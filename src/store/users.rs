use super::{column_decode, now, Store};
use crate::types::*;

impl Store {
    /// Provision a user. The generated token is the client credential for
    /// both HTTP and WebSocket access.
    pub async fn create_user(
        &self,
        role: Role,
        display_name: &str,
    ) -> Result<User, sqlx::Error> {
        let user = User {
            id: ulid::Ulid::new().to_string(),
            token: ulid::Ulid::new().to_string(),
            display_name: display_name.to_string(),
            role,
            created_at: now(),
        };

        sqlx::query(
            "INSERT INTO users (id, token, display_name, role, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.token)
        .bind(&user.display_name)
        .bind(user.role.as_str())
        .bind(&user.created_at)
        .execute(self.pool())
        .await?;

        Ok(user)
    }

    pub async fn user_by_token(&self, token: &str) -> Result<Option<User>, sqlx::Error> {
        let row: Option<(String, String, String, String, String)> = sqlx::query_as(
            "SELECT id, token, display_name, role, created_at FROM users WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(self.pool())
        .await?;

        row.map(user_from_row).transpose()
    }

    pub async fn list_users(&self) -> Result<Vec<User>, sqlx::Error> {
        let rows: Vec<(String, String, String, String, String)> = sqlx::query_as(
            "SELECT id, token, display_name, role, created_at FROM users ORDER BY created_at",
        )
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(user_from_row).collect()
    }
}

fn user_from_row(
    (id, token, display_name, role, created_at): (String, String, String, String, String),
) -> Result<User, sqlx::Error> {
    let role = Role::parse(&role).ok_or_else(|| column_decode("role", &role))?;
    Ok(User {
        id,
        token,
        display_name,
        role,
        created_at,
    })
}
