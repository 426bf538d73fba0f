//! End-to-end recall pipeline tests against the embedded store.

use std::sync::Arc;

use chrono::{Duration, Utc};
use smriti_memory::{
    EmbeddedStore, Episode, EpisodeId, MemoryStore, RecallEngine, RecallRequest, RetrievalSource,
    SortBy, Statement, StatementId, TimeWindow,
};

fn engine_over(store: &Arc<EmbeddedStore>) -> RecallEngine {
    RecallEngine::new(Arc::clone(store) as Arc<dyn MemoryStore>)
}

fn add_episode(store: &EmbeddedStore, content: &str, owner: &str) -> EpisodeId {
    store
        .add_episode(Episode::new(content, "chat", owner))
        .unwrap()
}

fn add_fact(
    store: &EmbeddedStore,
    ep: EpisodeId,
    fact: &str,
    subject: &str,
    object: &str,
    owner: &str,
) -> StatementId {
    let mut stmt = Statement::new(fact, subject, ep, owner);
    stmt.object = object.to_string();
    store.add_statement(stmt).unwrap()
}

#[tokio::test]
async fn recall_returns_provenance_and_stats() {
    let store = Arc::new(EmbeddedStore::in_memory().unwrap());
    let ep = add_episode(&store, "migration planning session", "owner");
    add_fact(
        &store,
        ep,
        "the billing service migrates to postgres in october",
        "billing service",
        "postgres",
        "owner",
    );

    let engine = engine_over(&store);
    let response = engine
        .recall(RecallRequest::new("billing service postgres migration", "owner"))
        .await
        .unwrap();

    assert_eq!(response.episodes.len(), 1);
    let recalled = &response.episodes[0];
    assert_eq!(recalled.episode.id, ep);
    assert!(recalled.score > 0.0);
    assert!(
        recalled.source_scores.graph_keyword.is_some()
            || recalled.source_scores.keyword_rank.is_some()
    );
    assert!(response.stats.keyword_hits + response.stats.bfs_hits > 0);
    assert!(response.stats.degraded_sources.is_empty());
}

#[tokio::test]
async fn recall_is_deterministic() {
    let store = Arc::new(EmbeddedStore::in_memory().unwrap());
    for i in 0..5 {
        let ep = add_episode(&store, &format!("deployment log {i}"), "owner");
        add_fact(
            &store,
            ep,
            &format!("deployment {i} finished on cluster west"),
            "deployment",
            "cluster west",
            "owner",
        );
    }

    let engine = engine_over(&store);
    let first = engine
        .recall(RecallRequest::new("deployment cluster west", "owner"))
        .await
        .unwrap();
    let second = engine
        .recall(RecallRequest::new("deployment cluster west", "owner"))
        .await
        .unwrap();

    let ids = |r: &smriti_memory::RecallResponse| -> Vec<EpisodeId> {
        r.episodes.iter().map(|e| e.episode.id).collect()
    };
    assert_eq!(ids(&first), ids(&second));
    assert_eq!(first.confidence, second.confidence);
}

#[tokio::test]
async fn superseded_fact_is_invisible_now_but_visible_in_its_window() {
    let store = Arc::new(EmbeddedStore::in_memory().unwrap());
    let ep = add_episode(&store, "alice talks about her editor", "owner");

    let past = Utc::now() - Duration::days(30);
    let mut stmt = Statement::new("alice uses emacs daily", "alice", ep, "owner");
    stmt.valid_at = past;
    let stmt_id = store.add_statement(stmt).unwrap();
    store
        .supersede_statement(&stmt_id, Utc::now() - Duration::days(5))
        .unwrap();

    let engine = engine_over(&store);

    // Present-time recall: the fact is superseded, nothing comes back.
    let now_response = engine
        .recall(RecallRequest::new("alice emacs editor", "owner"))
        .await
        .unwrap();
    assert!(now_response.episodes.is_empty());

    // Historical recall scoped to when the fact was true.
    let mut historical = RecallRequest::new("alice emacs editor", "owner");
    historical.time_window = Some(TimeWindow {
        start: past - Duration::days(1),
        end: past + Duration::days(10),
    });
    let then_response = engine.recall(historical).await.unwrap();
    assert_eq!(then_response.episodes.len(), 1);

    // include_invalidated admits the superseded fact at present time too.
    let mut with_invalidated = RecallRequest::new("alice emacs editor", "owner");
    with_invalidated.include_invalidated = true;
    let response = engine.recall(with_invalidated).await.unwrap();
    assert_eq!(response.episodes.len(), 1);
}

#[tokio::test]
async fn token_budget_truncates_but_never_empties() {
    let store = Arc::new(EmbeddedStore::in_memory().unwrap());
    let ep = add_episode(&store, &"flux capacitor maintenance notes ".repeat(200), "owner");
    add_fact(
        &store,
        ep,
        "the flux capacitor needs weekly maintenance",
        "flux capacitor",
        "maintenance",
        "owner",
    );

    let engine = engine_over(&store);
    let mut request = RecallRequest::new("flux capacitor maintenance", "owner");
    request.token_budget = Some(50);

    let response = engine.recall(request).await.unwrap();
    assert_eq!(response.episodes.len(), 1, "top episode survives any budget");
    assert!(response.truncated);
    assert!(response.episodes[0].episode.content.len() <= 50 * 4);
}

#[tokio::test]
async fn vector_only_recall_with_query_embedding() {
    let store = Arc::new(EmbeddedStore::in_memory().unwrap());

    let mut episode = Episode::new("thoughts on gardening", "chat", "owner");
    episode.embedding = Some(vec![1.0, 0.0, 0.0]);
    let ep = store.add_episode(episode).unwrap();
    let mut stmt = Statement::new("tomatoes need full sun", "tomatoes", ep, "owner");
    stmt.embedding = Some(vec![0.9, 0.1, 0.0]);
    store.add_statement(stmt).unwrap();

    let engine = engine_over(&store);
    // Query text shares no tokens with the stored fact; only the vectors
    // can find it, and fused similarity must clear the vector floor.
    let mut request = RecallRequest::new("horticulture advice", "owner");
    request.query_embedding = Some(vec![1.0, 0.0, 0.0]);

    let response = engine.recall(request).await.unwrap();
    assert_eq!(response.episodes.len(), 1);
    assert_eq!(response.episodes[0].primary_source, RetrievalSource::Vector);
}

#[tokio::test]
async fn recency_sort_prefers_fresh_episodes() {
    let store = Arc::new(EmbeddedStore::in_memory().unwrap());

    let mut old_episode = Episode::new("standup notes from last year", "chat", "owner");
    old_episode.valid_at = Utc::now() - Duration::days(400);
    let old_ep = store.add_episode(old_episode).unwrap();
    add_fact(&store, old_ep, "standup moved to nine", "standup", "nine", "owner");

    let fresh_ep = add_episode(&store, "standup notes from today", "owner");
    add_fact(&store, fresh_ep, "standup moved to ten", "standup", "ten", "owner");

    let engine = engine_over(&store);
    let mut request = RecallRequest::new("when is standup", "owner");
    request.sort_by = SortBy::Recency;

    let response = engine.recall(request).await.unwrap();
    assert!(response.episodes.len() >= 2);
    assert_eq!(response.episodes[0].episode.id, fresh_ep);
}

#[tokio::test]
async fn owners_never_see_each_other() {
    let store = Arc::new(EmbeddedStore::in_memory().unwrap());
    let ep = add_episode(&store, "private note", "owner-a");
    add_fact(&store, ep, "secret launch date is june", "launch", "june", "owner-a");

    let engine = engine_over(&store);
    let response = engine
        .recall(RecallRequest::new("secret launch date", "owner-b"))
        .await
        .unwrap();
    assert!(response.episodes.is_empty());
    assert_eq!(response.confidence, 0.0);
}
