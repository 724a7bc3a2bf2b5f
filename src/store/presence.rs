use super::{column_decode, now, Store};
use crate::types::*;

impl Store {
    /// Idempotent upsert keyed on user_id; the newest ping wins outright.
    /// No expiry runs against this table, so "online" means "said so in
    /// their last ping", not "reachable right now".
    pub async fn set_presence(
        &self,
        user_id: &str,
        role: Role,
        is_online: bool,
        room_id: Option<&str>,
    ) -> Result<PresenceRecord, sqlx::Error> {
        let record = PresenceRecord {
            user_id: user_id.to_string(),
            role,
            is_online,
            last_seen: now(),
            current_room: room_id.map(str::to_string),
        };

        sqlx::query(
            "INSERT INTO presence (user_id, role, is_online, last_seen, current_room) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(user_id) DO UPDATE SET \
                 role = excluded.role, \
                 is_online = excluded.is_online, \
                 last_seen = excluded.last_seen, \
                 current_room = excluded.current_room",
        )
        .bind(&record.user_id)
        .bind(record.role.as_str())
        .bind(record.is_online)
        .bind(&record.last_seen)
        .bind(record.current_room.as_deref())
        .execute(self.pool())
        .await?;

        Ok(record)
    }

    /// Snapshot of everyone currently marked online, optionally narrowed to
    /// one room and/or one role. Only as fresh as the last ping.
    pub async fn list_online(
        &self,
        filter: &PresenceFilter,
    ) -> Result<Vec<PresenceRecord>, sqlx::Error> {
        let rows: Vec<(String, String, bool, String, Option<String>)> = sqlx::query_as(
            "SELECT user_id, role, is_online, last_seen, current_room \
             FROM presence WHERE is_online = 1 ORDER BY user_id",
        )
        .fetch_all(self.pool())
        .await?;

        let mut online = Vec::new();
        for (user_id, role, is_online, last_seen, current_room) in rows {
            let role = Role::parse(&role).ok_or_else(|| column_decode("role", &role))?;
            if let Some(want) = filter.role {
                if role != want {
                    continue;
                }
            }
            if let Some(ref want) = filter.room_id {
                if current_room.as_deref() != Some(want.as_str()) {
                    continue;
                }
            }
            online.push(PresenceRecord {
                user_id,
                role,
                is_online,
                last_seen,
                current_room,
            });
        }
        Ok(online)
    }
}
