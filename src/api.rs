//! HTTP endpoints: staff provisioning, quiz/attempt actions, announcements,
//! presence pings and rosters, room history.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::activation;
use crate::auth::bearer_user;
use crate::broadcast::BroadcastEvent;
use crate::error::ServiceError;
use crate::state::AppState;
use crate::types::*;

pub async fn health() -> &'static str {
    "ok"
}

// ---------- staff provisioning (behind Basic auth middleware) ----------

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub role: Role,
    pub display_name: String,
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<User>, ServiceError> {
    if req.display_name.trim().is_empty() {
        return Err(ServiceError::Validation(
            "display_name must not be empty".to_string(),
        ));
    }

    let user = state
        .store
        .create_user(req.role, req.display_name.trim())
        .await?;
    tracing::info!(user_id = %user.id, role = %user.role.as_str(), "user provisioned");
    Ok(Json(user))
}

pub async fn list_users(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<User>>, ServiceError> {
    Ok(Json(state.store.list_users().await?))
}

// ---------- quizzes ----------

#[derive(Debug, Deserialize)]
pub struct CreateQuizRequest {
    pub title: String,
}

#[derive(Debug, Serialize)]
pub struct CreateQuizResponse {
    pub quiz: Quiz,
    pub rooms: Vec<ChatRoom>,
}

pub async fn create_quiz(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateQuizRequest>,
) -> Result<Json<CreateQuizResponse>, ServiceError> {
    let user = bearer_user(&state.store, &headers).await?;
    if !user.role.is_staff() {
        return Err(ServiceError::Forbidden("teachers"));
    }
    if req.title.trim().is_empty() {
        return Err(ServiceError::Validation("title must not be empty".to_string()));
    }

    let quiz = state.store.create_quiz(req.title.trim()).await?;
    let rooms = state.store.rooms_for_quiz(&quiz.id).await?;
    Ok(Json(CreateQuizResponse { quiz, rooms }))
}

pub async fn quiz_rooms(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(quiz_id): Path<String>,
) -> Result<Json<Vec<ChatRoom>>, ServiceError> {
    bearer_user(&state.store, &headers).await?;

    if state.store.quiz(&quiz_id).await?.is_none() {
        return Err(ServiceError::NotFound("quiz"));
    }
    Ok(Json(state.store.rooms_for_quiz(&quiz_id).await?))
}

// ---------- attempts ----------

#[derive(Debug, Deserialize)]
pub struct StartAttemptRequest {
    pub quiz_id: QuizId,
}

pub async fn start_attempt(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<StartAttemptRequest>,
) -> Result<Json<QuizAttempt>, ServiceError> {
    let user = bearer_user(&state.store, &headers).await?;

    if state.store.quiz(&req.quiz_id).await?.is_none() {
        return Err(ServiceError::NotFound("quiz"));
    }
    Ok(Json(state.store.start_attempt(&req.quiz_id, &user.id).await?))
}

/// Stamp an attempt complete, then let the Room Activator decide whether
/// this was the first completion for the quiz. Activation side effects
/// (system message, quiz-status broadcast) are not reflected in the
/// response body.
pub async fn complete_attempt(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(attempt_id): Path<String>,
) -> Result<Json<QuizAttempt>, ServiceError> {
    let user = bearer_user(&state.store, &headers).await?;

    let Some(attempt) = state.store.attempt(&attempt_id).await? else {
        return Err(ServiceError::NotFound("attempt"));
    };
    if attempt.user_id != user.id && !user.role.is_staff() {
        return Err(ServiceError::Forbidden("the attempt owner"));
    }

    let Some((attempt, _stamped_now)) = state.store.complete_attempt(&attempt_id).await? else {
        return Err(ServiceError::NotFound("attempt"));
    };

    if let Some(quiz) = state.store.quiz(&attempt.quiz_id).await? {
        activation::activate_on_completion(&state.store, &state.hub, &quiz).await?;
    }

    Ok(Json(attempt))
}

// ---------- announcements ----------

#[derive(Debug, Deserialize)]
pub struct AnnouncementRequest {
    pub message: String,
    pub kind: AnnouncementKind,
    pub quiz_id: Option<QuizId>,
}

#[derive(Debug, Serialize)]
pub struct AnnouncementResponse {
    pub id: String,
    pub message: String,
    pub kind: AnnouncementKind,
    pub quiz_id: Option<QuizId>,
    pub sent_by: UserId,
    pub sent_at: String,
}

/// Broadcast an announcement to every connected client and keep a system
/// message in the General room so offline users see it in history.
pub async fn create_announcement(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<AnnouncementRequest>,
) -> Result<Json<AnnouncementResponse>, ServiceError> {
    let user = bearer_user(&state.store, &headers).await?;
    if !user.role.is_staff() {
        return Err(ServiceError::Forbidden("teachers"));
    }
    let message = req.message.trim();
    if message.is_empty() {
        return Err(ServiceError::Validation(
            "message must not be empty".to_string(),
        ));
    }

    if let Some(room) = state.store.general_room().await? {
        state
            .store
            .insert_message(&room.id, None, message, true)
            .await?;
    }

    let announcement = AnnouncementResponse {
        id: ulid::Ulid::new().to_string(),
        message: message.to_string(),
        kind: req.kind,
        quiz_id: req.quiz_id,
        sent_by: user.id,
        sent_at: chrono::Utc::now().to_rfc3339(),
    };

    state
        .hub
        .dispatch(BroadcastEvent::Announcement {
            id: announcement.id.clone(),
            message: announcement.message.clone(),
            kind: announcement.kind,
            quiz_id: announcement.quiz_id.clone(),
            sent_by: announcement.sent_by.clone(),
            sent_at: announcement.sent_at.clone(),
        })
        .await;

    Ok(Json(announcement))
}

// ---------- presence ----------

#[derive(Debug, Deserialize)]
pub struct PresencePingRequest {
    pub is_online: bool,
    pub room_id: Option<RoomId>,
}

pub async fn presence_ping(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<PresencePingRequest>,
) -> Result<Json<PresenceRecord>, ServiceError> {
    let user = bearer_user(&state.store, &headers).await?;

    let record = state
        .store
        .set_presence(&user.id, user.role, req.is_online, req.room_id.as_deref())
        .await?;

    // Presence events fan out to the room's subscribers only; a ping with
    // no room has nobody to scope to and stays quiet.
    if let Some(room_id) = req.room_id {
        state
            .hub
            .dispatch(BroadcastEvent::Presence {
                user_id: user.id,
                is_online: req.is_online,
                room_id,
            })
            .await;
    }

    Ok(Json(record))
}

pub async fn presence_roster(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(filter): Query<PresenceFilter>,
) -> Result<Json<Vec<PresenceRecord>>, ServiceError> {
    bearer_user(&state.store, &headers).await?;
    Ok(Json(state.store.list_online(&filter).await?))
}

// ---------- room history ----------

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    pub limit: Option<u32>,
}

pub async fn room_messages(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(room_id): Path<String>,
    Query(query): Query<MessagesQuery>,
) -> Result<Json<Vec<ChatMessage>>, ServiceError> {
    bearer_user(&state.store, &headers).await?;

    if state.store.room(&room_id).await?.is_none() {
        return Err(ServiceError::NotFound("room"));
    }
    let limit = query.limit.unwrap_or(50).min(500);
    Ok(Json(state.store.messages_for_room(&room_id, limit).await?))
}
