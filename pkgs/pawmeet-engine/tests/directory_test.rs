//! Conversation directory tests

mod common;

use common::{conversation, FakeBackend};
use pawmeet_engine::{ConversationDirectory, DirectoryBuilder, RefreshOutcome};
use std::sync::Arc;
use std::time::Duration;

fn builder(backend: &Arc<FakeBackend>) -> DirectoryBuilder {
    DirectoryBuilder::new(backend.clone(), 4)
}

#[tokio::test]
async fn test_counterpart_dog_is_resolved() {
    let backend = Arc::new(FakeBackend::new());
    backend.add_dog("d2", "Rex", "u2", "Sam");

    let convs = vec![conversation("c1", ["d1", "d2"], ["u1", "u2"], "2024-01-01T00:00:00Z", None)];
    let cards = builder(&backend).build(convs, "d1").await;

    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].dog.id, "d2");
    assert_eq!(cards[0].dog.name, "Rex");
    assert_eq!(cards[0].owner.display_name, "Sam");
}

#[tokio::test]
async fn test_failed_dog_lookup_drops_only_that_card() {
    let backend = Arc::new(FakeBackend::new());
    backend.add_dog("d2", "Rex", "u2", "Sam");
    backend.add_dog("d3", "Luna", "u3", "Kim");
    backend.fail_dog("d2");

    let convs = vec![
        conversation("c1", ["d1", "d2"], ["u1", "u2"], "2024-01-01T00:00:00Z", None),
        conversation("c2", ["d3", "d1"], ["u3", "u1"], "2024-01-02T00:00:00Z", None),
    ];
    let cards = builder(&backend).build(convs, "d1").await;

    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].id(), "c2");
}

#[tokio::test]
async fn test_failed_owner_lookup_drops_card() {
    let backend = Arc::new(FakeBackend::new());
    backend.add_dog("d2", "Rex", "u2", "Sam");
    backend.fail_owner("u2");

    let convs = vec![conversation("c1", ["d1", "d2"], ["u1", "u2"], "2024-01-01T00:00:00Z", None)];
    let cards = builder(&backend).build(convs, "d1").await;

    assert!(cards.is_empty());
}

#[tokio::test]
async fn test_conversation_without_counterpart_is_skipped() {
    let backend = Arc::new(FakeBackend::new());
    backend.add_dog("d2", "Rex", "u2", "Sam");

    let convs = vec![
        conversation("self", ["d1", "d1"], ["u1", "u2"], "2024-01-01T00:00:00Z", None),
        conversation("stranger", ["d7", "d8"], ["u7", "u8"], "2024-01-01T00:00:00Z", None),
        conversation("ok", ["d1", "d2"], ["u1", "u2"], "2024-01-01T00:00:00Z", None),
    ];
    let cards = builder(&backend).build(convs, "d1").await;

    let ids: Vec<&str> = cards.iter().map(|c| c.id()).collect();
    assert_eq!(ids, vec!["ok"]);
    assert_eq!(backend.dog_fetch_count("d7"), 0);
}

#[tokio::test]
async fn test_cards_are_newest_first() {
    let backend = Arc::new(FakeBackend::new());
    backend.add_dog("d2", "Rex", "u2", "Sam");
    backend.add_dog("d3", "Luna", "u3", "Kim");
    backend.add_dog("d4", "Max", "u4", "Lee");

    let convs = vec![
        conversation("old", ["d1", "d2"], ["u1", "u2"], "2024-01-01T00:00:00Z", Some("2024-03-01T00:00:00Z")),
        conversation("new", ["d1", "d3"], ["u1", "u3"], "2024-01-01T00:00:00Z", Some("2024-03-05T00:00:00Z")),
        conversation("broken", ["d1", "d4"], ["u1", "u4"], "garbage", None),
    ];
    let cards = builder(&backend).build(convs, "d1").await;

    let ids: Vec<&str> = cards.iter().map(|c| c.id()).collect();
    assert_eq!(ids, vec!["new", "old", "broken"]);
}

#[tokio::test]
async fn test_shared_counterpart_is_fetched_once_per_pass() {
    let backend = Arc::new(FakeBackend::new());
    backend.add_dog("d2", "Rex", "u2", "Sam");

    let convs: Vec<_> = (0..6)
        .map(|i| conversation(&format!("c{i}"), ["d1", "d2"], ["u1", "u2"], "2024-01-01T00:00:00Z", None))
        .collect();

    let builder = builder(&backend);
    let cards = builder.build(convs.clone(), "d1").await;

    assert_eq!(cards.len(), 6);
    assert_eq!(backend.dog_fetch_count("d2"), 1);
    assert_eq!(backend.owner_fetch_count("u2"), 1);

    // Caches do not outlive the pass
    builder.build(convs, "d1").await;
    assert_eq!(backend.dog_fetch_count("d2"), 2);
}

#[tokio::test]
async fn test_new_refresh_supersedes_pass_in_flight() {
    let backend = Arc::new(FakeBackend::new());
    backend.add_dog("slow", "Slowpoke", "u2", "Sam");
    backend.add_dog("fast", "Zoom", "u3", "Kim");
    backend.delay_dog("slow", Duration::from_millis(300));

    let directory = Arc::new(ConversationDirectory::new(builder(&backend)));

    let first = {
        let directory = directory.clone();
        tokio::spawn(async move {
            let convs = vec![conversation("c-slow", ["d1", "slow"], ["u1", "u2"], "2024-01-01T00:00:00Z", None)];
            directory.refresh(convs, "d1").await
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;

    let convs = vec![conversation("c-fast", ["d1", "fast"], ["u1", "u3"], "2024-01-01T00:00:00Z", None)];
    let second = directory.refresh(convs, "d1").await;

    assert_eq!(second, RefreshOutcome::Published(1));
    assert_eq!(first.await.unwrap(), RefreshOutcome::Superseded);

    let ids: Vec<String> = directory.cards().iter().map(|c| c.id().to_string()).collect();
    assert_eq!(ids, vec!["c-fast".to_string()]);
}

#[tokio::test]
async fn test_reload_fetches_conversations_and_notifies() {
    let backend = Arc::new(FakeBackend::new());
    backend.add_dog("d2", "Rex", "u2", "Sam");
    backend
        .conversations
        .lock()
        .push(conversation("c1", ["d1", "d2"], ["u1", "u2"], "2024-01-01T00:00:00Z", None));

    let directory = ConversationDirectory::new(builder(&backend));
    let mut rx = directory.subscribe();

    let outcome = directory.reload(backend.as_ref(), "d1").await.unwrap();
    assert_eq!(outcome, RefreshOutcome::Published(1));

    rx.changed().await.unwrap();
    assert_eq!(rx.borrow().len(), 1);
}
