//! Opens a quiz's post-quiz review room on the first completion.
//!
//! Review rooms are created locked so answers cannot be discussed before
//! anyone has finished. The first completed attempt for the quiz unlocks
//! the room, posts one system message into it, and pushes one quiz-status
//! broadcast. The flip is a single conditional UPDATE, so concurrent
//! completions race only at the database and the side effects run once.

use crate::broadcast::{BroadcastEvent, BroadcastHub};
use crate::store::Store;
use crate::types::*;

/// Author recorded on activation broadcasts
const SYSTEM_SENDER: &str = "system";

/// Run the activation state machine for a freshly completed attempt.
/// Returns the review room when this call performed the Inactive -> Active
/// transition; None when the room was already open or the quiz has none.
/// Active is terminal, nothing ever flips a room back.
pub async fn activate_on_completion(
    store: &Store,
    hub: &BroadcastHub,
    quiz: &Quiz,
) -> Result<Option<ChatRoom>, sqlx::Error> {
    let Some(room) = store.activate_review_room(&quiz.id).await? else {
        return Ok(None);
    };

    tracing::info!(quiz_id = %quiz.id, room_id = %room.id, "review room activated");

    let text = format!(
        "The review room for \"{}\" is now open. Compare answers away!",
        quiz.title
    );
    store.insert_message(&room.id, None, &text, true).await?;

    hub.dispatch(BroadcastEvent::QuizStatus {
        quiz_id: quiz.id.clone(),
        kind: AnnouncementKind::QuizOpen,
        message: text,
        sent_by: SYSTEM_SENDER.to_string(),
    })
    .await;

    Ok(Some(room))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ServerMessage;
    use crate::store::test_support::store;
    use std::sync::Arc;

    #[tokio::test]
    async fn first_completion_opens_room_once() {
        let (store, _dir) = store().await;
        let hub = BroadcastHub::new();
        let mut rx = hub.subscribe_global();

        let quiz = store.create_quiz("Fractions").await.unwrap();

        let room = activate_on_completion(&store, &hub, &quiz)
            .await
            .unwrap()
            .expect("first completion flips the room");
        assert!(room.is_active);

        // Exactly one system message landed in the review room
        assert_eq!(store.system_message_count(&room.id).await.unwrap(), 1);

        // Exactly one quiz-status broadcast went out
        match rx.try_recv().unwrap() {
            ServerMessage::QuizStatus { quiz_id, kind, .. } => {
                assert_eq!(quiz_id, quiz.id);
                assert_eq!(kind, AnnouncementKind::QuizOpen);
            }
            other => panic!("expected QuizStatus, got {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn second_completion_is_silent() {
        let (store, _dir) = store().await;
        let hub = BroadcastHub::new();
        let quiz = store.create_quiz("Fractions").await.unwrap();

        let room = activate_on_completion(&store, &hub, &quiz)
            .await
            .unwrap()
            .unwrap();

        let mut rx = hub.subscribe_global();
        let again = activate_on_completion(&store, &hub, &quiz).await.unwrap();
        assert!(again.is_none());
        assert_eq!(store.system_message_count(&room.id).await.unwrap(), 1);
        assert!(rx.try_recv().is_err(), "no second broadcast");
    }

    #[tokio::test]
    async fn quiz_without_review_room_is_a_noop() {
        let (store, _dir) = store().await;
        let hub = BroadcastHub::new();
        let quiz = Quiz {
            id: "imported-quiz".to_string(),
            title: "No rooms".to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        assert!(activate_on_completion(&store, &hub, &quiz)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn concurrent_completions_activate_exactly_once() {
        let (store, _dir) = store().await;
        let hub = Arc::new(BroadcastHub::new());
        let quiz = Arc::new(store.create_quiz("Simultaneity").await.unwrap());

        let mut handles = Vec::new();
        for _ in 0..2 {
            let store = store.clone();
            let hub = hub.clone();
            let quiz = quiz.clone();
            handles.push(tokio::spawn(async move {
                activate_on_completion(&store, &hub, &quiz).await.unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1, "exactly one task owns the transition");

        let room = store
            .rooms_for_quiz(&quiz.id)
            .await
            .unwrap()
            .into_iter()
            .find(|r| r.room_type == RoomType::PostQuizReview)
            .unwrap();
        assert!(room.is_active);
        assert_eq!(store.system_message_count(&room.id).await.unwrap(), 1);
    }
}
