//! Ingestion pipeline integration tests

mod common;

use serde_json::json;
use std::sync::Arc;

use cortex_core::Error;
use cortex_core::config::VectorConfig;
use cortex_core::domain::{KnowledgeIngestionPipeline, Message, MessageKind, queries};
use cortex_core::graph::{DriverError, MockGraphDriver, Record};
use cortex_core::vector::{InMemoryVectorStore, MetadataFilter, VectorQuery, VectorStore};

use common::{UnavailableVectorStore, manager};

fn pipeline(driver: &MockGraphDriver, vectors: Arc<dyn VectorStore>) -> KnowledgeIngestionPipeline {
    KnowledgeIngestionPipeline::new(manager(driver), vectors, &VectorConfig::default())
}

#[tokio::test]
async fn test_concepts_and_vector_record() {
    let driver = MockGraphDriver::new();
    let vectors = Arc::new(InMemoryVectorStore::new());
    let pipeline = pipeline(&driver, vectors.clone());

    let message = Message::new("atlas", "architecture", "We use pgvector and Neo4j").with_id("m-1");
    let outcome = pipeline.process_message(&message).await.expect("ingest");

    assert!(outcome.concepts.contains(&"pgvector".to_string()));
    assert!(outcome.concepts.contains(&"neo4j".to_string()));
    assert!(outcome.vector_stored());
    assert!(outcome.is_complete());

    let hits = vectors
        .search(&VectorQuery::text("neural_chat", "pgvector", 10).with_filter(MetadataFilter::eq("type", "message")))
        .await
        .expect("search");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "m-1");
    assert_eq!(hits[0].metadata["from"], "atlas");
    assert_eq!(hits[0].metadata["channel"], "architecture");
    assert_eq!(hits[0].metadata["concepts"], json!(outcome.concepts));
}

#[tokio::test]
async fn test_vector_failure_keeps_graph_results() {
    let driver = MockGraphDriver::new();
    let pipeline = pipeline(&driver, Arc::new(UnavailableVectorStore));

    let message = Message::new("atlas", "general", "@nova We use pgvector and Neo4j in AuthService");
    let outcome = pipeline.process_message(&message).await.expect("ingest succeeds");

    assert!(!outcome.vector_stored());
    assert_eq!(outcome.entities, vec!["nova", "AuthService"]);
    assert!(outcome.concepts.contains(&"pgvector".to_string()));
    assert!(outcome.concepts.contains(&"neo4j".to_string()));
    assert!(matches!(outcome.vector, Err(Error::VectorStore(_))));
    assert_eq!(driver.calls_matching(queries::LINK_CONCEPT).len(), outcome.concepts.len());
}

#[tokio::test]
async fn test_message_written_with_structural_edges() {
    let driver = MockGraphDriver::new();
    let pipeline = pipeline(&driver, Arc::new(InMemoryVectorStore::new()));

    let message = Message::new("atlas", "ops", "deploy finished")
        .with_id("m-7")
        .with_kind(MessageKind::Decision);
    pipeline.process_message(&message).await.expect("ingest");

    let writes = driver.calls_matching(queries::MERGE_MESSAGE);
    assert_eq!(writes.len(), 1);
    let params = &writes[0].params;
    assert_eq!(params["id"], "m-7");
    assert_eq!(params["from"], "atlas");
    assert_eq!(params["channel"], "ops");
    assert_eq!(params["kind"], "decision");
    assert!(writes[0].query.contains("[:SENT]"));
    assert!(writes[0].query.contains("[:IN_CHANNEL]"));
}

#[tokio::test]
async fn test_reingest_keeps_stored_author_and_channel() {
    let driver = MockGraphDriver::new();
    driver.respond(
        queries::MERGE_MESSAGE,
        vec![
            Record::new()
                .with("id", "m-7")
                .with("from_agent", "atlas")
                .with("channel", "ops"),
        ],
    );
    let vectors = Arc::new(InMemoryVectorStore::new());
    let pipeline = pipeline(&driver, vectors.clone());

    let resent = Message::new("nova", "general", "deploy finished").with_id("m-7");
    pipeline.process_message(&resent).await.expect("ingest");

    let writes = driver.calls_matching(queries::MERGE_MESSAGE);
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].params["from"], "nova");
    assert_eq!(writes[0].params["channel"], "general");

    let query = &writes[0].query;
    assert!(query.contains("ON CREATE SET"));
    assert!(query.contains("MERGE (a:Agent {name: m.from_agent})"));
    assert!(query.contains("MERGE (c:Channel {name: m.channel})"));
    assert!(!query.contains("{name: $from}"));
    assert!(!query.contains("{name: $channel}"));

    let hits = vectors
        .search(&VectorQuery::text("neural_chat", "deploy", 10))
        .await
        .expect("search");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].metadata["from"], "atlas");
    assert_eq!(hits[0].metadata["channel"], "ops");
}

#[tokio::test]
async fn test_message_write_failure_propagates() {
    let driver = MockGraphDriver::new();
    driver.fail(queries::MERGE_MESSAGE, DriverError::Query("constraint violation".to_string()));
    let vectors = Arc::new(InMemoryVectorStore::new());
    let pipeline = pipeline(&driver, vectors.clone());

    let err = pipeline
        .process_message(&Message::new("atlas", "general", "security review"))
        .await
        .expect_err("message write fails");
    assert!(matches!(err, Error::QueryExecution(_)));

    assert!(vectors.is_empty());
    assert!(driver.calls_matching(queries::LINK_CONCEPT).is_empty());
}

#[tokio::test]
async fn test_entity_links_are_best_effort() {
    let driver = MockGraphDriver::new();
    driver.on(queries::LINK_ENTITY, |_, params| match params["entity"].as_str() {
        Some("AuthService") => Ok(vec![Record::new().with("linked", "AuthService")]),
        Some("auth.ts") => Err(DriverError::Query("lock timeout".to_string())),
        _ => Ok(Vec::new()),
    });
    let pipeline = pipeline(&driver, Arc::new(InMemoryVectorStore::new()));

    let message = Message::new("atlas", "general", "AuthService lives in auth.ts, ask @nova");
    let outcome = pipeline.process_message(&message).await.expect("ingest");

    assert_eq!(outcome.linked_nodes(), vec!["AuthService"]);
    let failures = outcome.partial_failures();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].contains("auth.ts"));

    let err = outcome.ensure_complete().expect_err("partial");
    assert!(matches!(err, Error::PartialIngestion(_)));
}

#[tokio::test]
async fn test_concept_link_failure_is_recorded() {
    let driver = MockGraphDriver::new();
    driver.fail(queries::LINK_CONCEPT, DriverError::Query("deadlock".to_string()));
    let pipeline = pipeline(&driver, Arc::new(InMemoryVectorStore::new()));

    let outcome = pipeline
        .process_message(&Message::new("atlas", "general", "security and performance"))
        .await
        .expect("ingest");

    assert_eq!(outcome.concepts, vec!["security", "performance"]);
    assert!(outcome.concept_links.iter().all(|link| link.result.is_err()));
    assert!(outcome.vector_stored());

    let summary = outcome.summary();
    assert_eq!(summary.failures.len(), 2);
}

#[tokio::test]
async fn test_batch_skips_failed_messages() {
    let driver = MockGraphDriver::new();
    driver.on(queries::MERGE_MESSAGE, |_, params| {
        if params["id"] == "bad" {
            Err(DriverError::Query("rejected".to_string()))
        } else {
            Ok(vec![Record::new().with("id", params["id"].as_str().unwrap_or_default())])
        }
    });
    let pipeline = pipeline(&driver, Arc::new(InMemoryVectorStore::new()));

    let messages = vec![
        Message::new("atlas", "general", "first").with_id("good-1"),
        Message::new("atlas", "general", "second").with_id("bad"),
        Message::new("atlas", "general", "third").with_id("good-2"),
    ];
    let outcomes = pipeline.process_messages(&messages).await;

    let ids: Vec<&str> = outcomes.iter().map(|o| o.message_id.as_str()).collect();
    assert_eq!(ids, vec!["good-1", "good-2"]);
}
