mod attempts;
mod messages;
mod presence;
mod quizzes;
mod rooms;
mod users;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

/// SQLite-backed persistence. All realtime state that must survive a
/// reconnect (rooms, messages, presence, attempts) lives here; everything
/// transient rides on the broadcast hub instead.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        token TEXT NOT NULL UNIQUE,
        display_name TEXT NOT NULL,
        role TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS quizzes (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS chat_rooms (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        room_type TEXT NOT NULL,
        quiz_id TEXT,
        is_active INTEGER NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS chat_messages (
        id TEXT PRIMARY KEY,
        room_id TEXT NOT NULL,
        user_id TEXT,
        content TEXT NOT NULL,
        is_system_message INTEGER NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_chat_messages_room ON chat_messages (room_id, created_at)",
    "CREATE TABLE IF NOT EXISTS presence (
        user_id TEXT PRIMARY KEY,
        role TEXT NOT NULL,
        is_online INTEGER NOT NULL,
        last_seen TEXT NOT NULL,
        current_room TEXT
    )",
    "CREATE TABLE IF NOT EXISTS quiz_attempts (
        id TEXT PRIMARY KEY,
        quiz_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        started_at TEXT NOT NULL,
        completed_at TEXT
    )",
];

impl Store {
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    /// Create the schema (idempotent) and make sure the one General room
    /// every deployment carries exists.
    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        for stmt in SCHEMA {
            sqlx::query(stmt).execute(&self.pool).await?;
        }

        if self.general_room().await?.is_none() {
            self.create_room("General", crate::types::RoomType::General, None)
                .await?;
        }
        Ok(())
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Wall-clock timestamp in the wire format used everywhere
pub(crate) fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Map an unknown enum string coming out of a row to a decode error
pub(crate) fn column_decode(column: &str, value: &str) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: format!("unexpected value {value:?}").into(),
    }
}
