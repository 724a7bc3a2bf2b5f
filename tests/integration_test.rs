use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap};
use axum::Json;
use std::sync::Arc;

use studyhall::api;
use studyhall::error::ServiceError;
use studyhall::protocol::{ClientMessage, ServerMessage};
use studyhall::state::AppState;
use studyhall::store::Store;
use studyhall::types::*;
use studyhall::ws::handlers::handle_message;

async fn test_state() -> (Arc<AppState>, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());
    let store = Store::connect(&url).await.expect("connect");
    store.migrate().await.expect("migrate");
    (Arc::new(AppState::new(store)), dir)
}

fn bearer(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::AUTHORIZATION,
        format!("Bearer {token}").parse().unwrap(),
    );
    headers
}

/// End-to-end flow: provision users, create a quiz, complete attempts,
/// watch the review room unlock exactly once and the broadcasts go out.
#[tokio::test]
async fn test_full_completion_flow() {
    let (state, _dir) = test_state().await;

    // 1. Provision a teacher and two students
    let Json(teacher) = api::create_user(
        State(state.clone()),
        Json(api::CreateUserRequest {
            role: Role::Teacher,
            display_name: "Ms Patel".to_string(),
        }),
    )
    .await
    .expect("create teacher");

    let Json(alice) = api::create_user(
        State(state.clone()),
        Json(api::CreateUserRequest {
            role: Role::Student,
            display_name: "Alice".to_string(),
        }),
    )
    .await
    .expect("create alice");

    let Json(bob) = api::create_user(
        State(state.clone()),
        Json(api::CreateUserRequest {
            role: Role::Student,
            display_name: "Bob".to_string(),
        }),
    )
    .await
    .expect("create bob");

    // 2. Teacher creates a quiz; companion rooms come with it
    let Json(created) = api::create_quiz(
        State(state.clone()),
        bearer(&teacher.token),
        Json(api::CreateQuizRequest {
            title: "Unit 5 checkpoint".to_string(),
        }),
    )
    .await
    .expect("create quiz");

    assert_eq!(created.rooms.len(), 3);
    let review = created
        .rooms
        .iter()
        .find(|r| r.room_type == RoomType::PostQuizReview)
        .expect("review room");
    assert!(!review.is_active, "review room starts locked");

    // A student cannot create quizzes
    let err = api::create_quiz(
        State(state.clone()),
        bearer(&alice.token),
        Json(api::CreateQuizRequest {
            title: "Shadow quiz".to_string(),
        }),
    )
    .await
    .err()
    .expect("students must not create quizzes");
    assert!(matches!(err, ServiceError::Forbidden(_)));

    // 3. Both students start attempts
    let Json(alice_attempt) = api::start_attempt(
        State(state.clone()),
        bearer(&alice.token),
        Json(api::StartAttemptRequest {
            quiz_id: created.quiz.id.clone(),
        }),
    )
    .await
    .expect("alice attempt");

    let Json(bob_attempt) = api::start_attempt(
        State(state.clone()),
        bearer(&bob.token),
        Json(api::StartAttemptRequest {
            quiz_id: created.quiz.id.clone(),
        }),
    )
    .await
    .expect("bob attempt");

    // Listen on the global stream before the first completion
    let mut global_rx = state.hub.subscribe_global();

    // 4. Alice finishes first: room flips, one system message, one broadcast
    let Json(done) = api::complete_attempt(
        State(state.clone()),
        bearer(&alice.token),
        Path(alice_attempt.id.clone()),
    )
    .await
    .expect("complete alice");
    assert!(done.completed_at.is_some());

    let room = state.store.room(&review.id).await.unwrap().unwrap();
    assert!(room.is_active);
    assert_eq!(state.store.system_message_count(&review.id).await.unwrap(), 1);

    match global_rx.try_recv().expect("quiz-status broadcast") {
        ServerMessage::QuizStatus { quiz_id, kind, .. } => {
            assert_eq!(quiz_id, created.quiz.id);
            assert_eq!(kind, AnnouncementKind::QuizOpen);
        }
        other => panic!("expected QuizStatus, got {:?}", other),
    }

    // 5. Bob finishes second: no second activation, no second broadcast
    let Json(done) = api::complete_attempt(
        State(state.clone()),
        bearer(&bob.token),
        Path(bob_attempt.id.clone()),
    )
    .await
    .expect("complete bob");
    assert!(done.completed_at.is_some());

    assert_eq!(state.store.system_message_count(&review.id).await.unwrap(), 1);
    assert!(global_rx.try_recv().is_err(), "no duplicate broadcast");

    // 6. The unlocked room now accepts chat
    let mut review_rx = state.hub.subscribe_room(&review.id).await;
    let reply = handle_message(
        ClientMessage::SendMessage {
            room_id: review.id.clone(),
            content: "that last question was brutal".to_string(),
        },
        &alice,
        &state,
    )
    .await;
    assert!(reply.is_none());

    match review_rx.try_recv().expect("chat fan-out") {
        ServerMessage::NewMessage { message } => {
            assert_eq!(message.user_id.as_deref(), Some(alice.id.as_str()));
        }
        other => panic!("expected NewMessage, got {:?}", other),
    }
}

#[tokio::test]
async fn test_presence_roster_over_http() {
    let (state, _dir) = test_state().await;

    let Json(alice) = api::create_user(
        State(state.clone()),
        Json(api::CreateUserRequest {
            role: Role::Student,
            display_name: "Alice".to_string(),
        }),
    )
    .await
    .unwrap();
    let Json(tutor) = api::create_user(
        State(state.clone()),
        Json(api::CreateUserRequest {
            role: Role::Teacher,
            display_name: "Tutor".to_string(),
        }),
    )
    .await
    .unwrap();

    for (user, room) in [(&alice, "study-1"), (&tutor, "study-1")] {
        api::presence_ping(
            State(state.clone()),
            bearer(&user.token),
            Json(api::PresencePingRequest {
                is_online: true,
                room_id: Some(room.to_string()),
            }),
        )
        .await
        .unwrap();
    }

    // Alice moves rooms; last write wins
    api::presence_ping(
        State(state.clone()),
        bearer(&alice.token),
        Json(api::PresencePingRequest {
            is_online: true,
            room_id: Some("study-2".to_string()),
        }),
    )
    .await
    .unwrap();

    let Json(roster) = api::presence_roster(
        State(state.clone()),
        bearer(&tutor.token),
        Query(PresenceFilter {
            room_id: Some("study-1".to_string()),
            role: None,
        }),
    )
    .await
    .unwrap();
    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0].user_id, tutor.id);

    let Json(students) = api::presence_roster(
        State(state.clone()),
        bearer(&tutor.token),
        Query(PresenceFilter {
            room_id: None,
            role: Some(Role::Student),
        }),
    )
    .await
    .unwrap();
    assert_eq!(students.len(), 1);
    assert_eq!(students[0].user_id, alice.id);
    assert_eq!(students[0].current_room.as_deref(), Some("study-2"));
}

#[tokio::test]
async fn test_requests_without_credentials_are_rejected() {
    let (state, _dir) = test_state().await;

    let err = api::start_attempt(
        State(state.clone()),
        HeaderMap::new(),
        Json(api::StartAttemptRequest {
            quiz_id: "whatever".to_string(),
        }),
    )
    .await
    .err()
    .expect("no token, no attempt");
    assert!(matches!(err, ServiceError::Unauthorized));

    let err = api::presence_roster(
        State(state.clone()),
        bearer("not-a-real-token"),
        Query(PresenceFilter::default()),
    )
    .await
    .err()
    .expect("unknown token is refused");
    assert!(matches!(err, ServiceError::Unauthorized));
}

#[tokio::test]
async fn test_completing_a_strangers_attempt_is_forbidden() {
    let (state, _dir) = test_state().await;

    let Json(teacher) = api::create_user(
        State(state.clone()),
        Json(api::CreateUserRequest {
            role: Role::Teacher,
            display_name: "Ms Patel".to_string(),
        }),
    )
    .await
    .unwrap();
    let Json(alice) = api::create_user(
        State(state.clone()),
        Json(api::CreateUserRequest {
            role: Role::Student,
            display_name: "Alice".to_string(),
        }),
    )
    .await
    .unwrap();
    let Json(mallory) = api::create_user(
        State(state.clone()),
        Json(api::CreateUserRequest {
            role: Role::Student,
            display_name: "Mallory".to_string(),
        }),
    )
    .await
    .unwrap();

    let Json(created) = api::create_quiz(
        State(state.clone()),
        bearer(&teacher.token),
        Json(api::CreateQuizRequest {
            title: "Geometry".to_string(),
        }),
    )
    .await
    .unwrap();

    let Json(attempt) = api::start_attempt(
        State(state.clone()),
        bearer(&alice.token),
        Json(api::StartAttemptRequest {
            quiz_id: created.quiz.id.clone(),
        }),
    )
    .await
    .unwrap();

    let err = api::complete_attempt(
        State(state.clone()),
        bearer(&mallory.token),
        Path(attempt.id.clone()),
    )
    .await
    .err()
    .expect("mallory cannot complete alice's attempt");
    assert!(matches!(err, ServiceError::Forbidden(_)));

    // The quiz's review room must still be locked
    let review = state
        .store
        .rooms_for_quiz(&created.quiz.id)
        .await
        .unwrap()
        .into_iter()
        .find(|r| r.room_type == RoomType::PostQuizReview)
        .unwrap();
    assert!(!review.is_active);
}
