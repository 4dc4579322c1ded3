//! Integration tests for scripted companion replies

mod common;

use common::{Fixture, PASSWORD};
use murmur_app::{CompanionResponder, DEFAULT_TYPING_DELAY};
use murmur_core::{ConversationKind, User, UserId};
use std::time::Duration;

async fn companion_conversation(fx: &Fixture) -> (murmur_core::ConversationId, UserId) {
    let nova = UserId::new();
    fx.backend.seed_user(
        User::new(nova, "Nova", "nova@example.com", "http://a/nova.svg", 0),
        PASSWORD,
    );
    let id = fx
        .store
        .start_conversation(ConversationKind::Companion, nova, "hey")
        .await
        .expect("start companion conversation");
    (id, nova)
}

#[tokio::test(start_paused = true)]
async fn companion_replies_once_from_the_fixed_set() {
    let fx = Fixture::new().signed_in().await;
    let (id, nova) = companion_conversation(&fx).await;

    fx.store.send_message(id, "hello").await.unwrap();

    // while "typing": the user message is written, the reply is not
    assert_eq!(fx.store.companion_typing(), Some(id));
    assert_eq!(fx.backend.messages_for(id).len(), 2);

    tokio::time::sleep(DEFAULT_TYPING_DELAY + Duration::from_millis(50)).await;
    tokio::task::yield_now().await;

    let messages = fx.backend.messages_for(id);
    assert_eq!(messages.len(), 3, "exactly one reply");
    let reply = &messages[2];
    assert_eq!(reply.sender, nova);
    assert!(CompanionResponder::new().knows(&reply.body));
    assert_eq!(fx.store.companion_typing(), None);
}

#[tokio::test(start_paused = true)]
async fn switching_away_cancels_the_pending_reply() {
    let fx = Fixture::new().signed_in().await;
    let (id, _nova) = companion_conversation(&fx).await;

    fx.store.send_message(id, "hello").await.unwrap();
    assert_eq!(fx.store.companion_typing(), Some(id));

    // switching tears the reply down before the delay elapses
    fx.store.set_active_conversation(None).await.unwrap();
    assert_eq!(fx.store.companion_typing(), None);

    tokio::time::sleep(DEFAULT_TYPING_DELAY * 2).await;
    tokio::task::yield_now().await;
    assert_eq!(fx.backend.messages_for(id).len(), 2, "no stale reply landed");
}

#[tokio::test(start_paused = true)]
async fn replies_cycle_deterministically_across_sends() {
    let fx = Fixture::new().signed_in().await;
    let (id, nova) = companion_conversation(&fx).await;
    let expected = CompanionResponder::new();

    fx.store.send_message(id, "first").await.unwrap();
    tokio::time::sleep(DEFAULT_TYPING_DELAY + Duration::from_millis(50)).await;
    tokio::task::yield_now().await;

    fx.store.send_message(id, "second").await.unwrap();
    tokio::time::sleep(DEFAULT_TYPING_DELAY + Duration::from_millis(50)).await;
    tokio::task::yield_now().await;

    let replies: Vec<String> = fx
        .backend
        .messages_for(id)
        .into_iter()
        .filter(|m| m.sender == nova)
        .map(|m| m.body)
        .collect();
    assert_eq!(replies, vec![expected.next_reply(), expected.next_reply()]);
}

#[tokio::test(start_paused = true)]
async fn friend_conversations_never_get_scripted_replies() {
    let fx = Fixture::new().signed_in().await;
    let id = fx.friend_conversation("Hi").await;

    fx.store.send_message(id, "anyone there?").await.unwrap();
    assert_eq!(fx.store.companion_typing(), None);

    tokio::time::sleep(DEFAULT_TYPING_DELAY * 2).await;
    tokio::task::yield_now().await;
    assert_eq!(fx.backend.messages_for(id).len(), 2);
}
