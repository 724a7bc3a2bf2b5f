use serde::{Deserialize, Serialize};

/// Opaque ID types for type safety
pub type UserId = String;
pub type RoomId = String;
pub type MessageId = String;
pub type QuizId = String;
pub type AttemptId = String;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "admin" => Some(Role::Admin),
            "teacher" => Some(Role::Teacher),
            "student" => Some(Role::Student),
            _ => None,
        }
    }

    /// Teachers and admins may broadcast announcements and manage quizzes
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Admin | Role::Teacher)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomType {
    General,
    QuizDiscussion,
    PreQuizDiscussion,
    PostQuizReview,
    StudyGroup,
}

impl RoomType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomType::General => "GENERAL",
            RoomType::QuizDiscussion => "QUIZ_DISCUSSION",
            RoomType::PreQuizDiscussion => "PRE_QUIZ_DISCUSSION",
            RoomType::PostQuizReview => "POST_QUIZ_REVIEW",
            RoomType::StudyGroup => "STUDY_GROUP",
        }
    }

    pub fn parse(s: &str) -> Option<RoomType> {
        match s {
            "GENERAL" => Some(RoomType::General),
            "QUIZ_DISCUSSION" => Some(RoomType::QuizDiscussion),
            "PRE_QUIZ_DISCUSSION" => Some(RoomType::PreQuizDiscussion),
            "POST_QUIZ_REVIEW" => Some(RoomType::PostQuizReview),
            "STUDY_GROUP" => Some(RoomType::StudyGroup),
            _ => None,
        }
    }

    /// Review rooms stay locked until their quiz sees a first completion.
    /// Every other room type is open from the moment it is created.
    pub fn starts_active(&self) -> bool {
        !matches!(self, RoomType::PostQuizReview)
    }
}

/// Category tag carried by announcement and quiz-status events
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnnouncementKind {
    Info,
    QuizOpen,
    QuizClosed,
    Reminder,
}

impl AnnouncementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnnouncementKind::Info => "info",
            AnnouncementKind::QuizOpen => "quiz_open",
            AnnouncementKind::QuizClosed => "quiz_closed",
            AnnouncementKind::Reminder => "reminder",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub token: String,
    pub display_name: String,
    pub role: Role,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    pub id: QuizId,
    pub title: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRoom {
    pub id: RoomId,
    pub name: String,
    pub room_type: RoomType,
    /// Set for the discussion/review rooms created alongside a quiz
    pub quiz_id: Option<QuizId>,
    pub is_active: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub room_id: RoomId,
    /// None for messages authored by the platform itself
    pub user_id: Option<UserId>,
    pub content: String,
    pub is_system_message: bool,
    pub created_at: String,
}

/// Current online/offline snapshot for one user. Upserted on every ping,
/// never deleted, no history kept. There is no heartbeat timeout: a client
/// that disappears without a final offline ping stays listed as online.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceRecord {
    pub user_id: UserId,
    pub role: Role,
    pub is_online: bool,
    pub last_seen: String,
    pub current_room: Option<RoomId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub id: AttemptId,
    pub quiz_id: QuizId,
    pub user_id: UserId,
    pub started_at: String,
    pub completed_at: Option<String>,
}

/// Filter for presence roster queries; both fields compose with AND
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PresenceFilter {
    pub room_id: Option<RoomId>,
    pub role: Option<Role>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_type_round_trips_through_db_strings() {
        for ty in [
            RoomType::General,
            RoomType::QuizDiscussion,
            RoomType::PreQuizDiscussion,
            RoomType::PostQuizReview,
            RoomType::StudyGroup,
        ] {
            assert_eq!(RoomType::parse(ty.as_str()), Some(ty));
        }
        assert_eq!(RoomType::parse("LOBBY"), None);
    }

    #[test]
    fn only_review_rooms_start_inactive() {
        assert!(!RoomType::PostQuizReview.starts_active());
        assert!(RoomType::General.starts_active());
        assert!(RoomType::StudyGroup.starts_active());
    }

    #[test]
    fn staff_roles() {
        assert!(Role::Admin.is_staff());
        assert!(Role::Teacher.is_staff());
        assert!(!Role::Student.is_staff());
    }
}
