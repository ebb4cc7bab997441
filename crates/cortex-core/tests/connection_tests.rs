//! Connection manager integration tests

mod common;

use serde_json::json;
use std::time::Duration;

use cortex_core::Error;
use cortex_core::config::Config;
use cortex_core::graph::{
    AccessMode, Direction, DriverError, MockGraphDriver, NodeValue, Params, QueryOptions, Record, params,
};

use common::{manager, manager_with};

#[tokio::test]
async fn test_session_released_on_success_and_error() {
    let driver = MockGraphDriver::new();
    driver.respond("RETURN 1", vec![Record::new().with("ok", 1i64)]);
    driver.fail("BROKEN", DriverError::Query("syntax error".to_string()));
    let connection = manager(&driver);

    let rows = connection.read_query("RETURN 1 AS ok", Params::new()).await.expect("query");
    assert_eq!(rows[0]["ok"], 1);

    let err = connection
        .write_query("BROKEN QUERY", Params::new())
        .await
        .expect_err("should fail");
    assert!(matches!(err, Error::QueryExecution(_)));

    assert_eq!(driver.sessions_opened(), 2);
    assert_eq!(driver.sessions_closed(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_session_released_on_timeout() {
    let driver = MockGraphDriver::new();
    driver.set_query_delay(Some(Duration::from_secs(10)));
    let connection = manager(&driver);

    let err = connection
        .execute_query(
            "MATCH (n) RETURN n",
            Params::new(),
            QueryOptions::read().with_timeout(Duration::from_secs(1)),
        )
        .await
        .expect_err("should time out");

    assert!(matches!(err, Error::QueryTimeout(1000)));
    assert_eq!(driver.sessions_opened(), 1);
    assert_eq!(driver.sessions_closed(), 1);
    assert_eq!(connection.breaker().failure_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_breaker_opens_after_five_failures() {
    let driver = MockGraphDriver::new();
    driver.fail("MATCH", DriverError::Query("database unavailable".to_string()));
    let connection = manager(&driver);

    for _ in 0..5 {
        let err = connection
            .read_query("MATCH (n) RETURN n", Params::new())
            .await
            .expect_err("should fail");
        assert!(matches!(err, Error::QueryExecution(_)));
    }

    let err = connection
        .read_query("MATCH (n) RETURN n", Params::new())
        .await
        .expect_err("should be rejected");
    assert!(matches!(err, Error::CircuitOpen { retry_after_secs: 60 }));
    assert!(err.to_string().contains("circuit OPEN"));

    assert_eq!(driver.query_count(), 5);
    assert_eq!(driver.sessions_opened(), 5);
    assert!(!connection.is_healthy());
}

#[tokio::test(start_paused = true)]
async fn test_breaker_probes_after_reset_timeout() {
    let driver = MockGraphDriver::new();
    driver.fail("MATCH", DriverError::Query("database unavailable".to_string()));
    let connection = manager(&driver);

    for _ in 0..5 {
        let _ = connection.read_query("MATCH (n) RETURN n", Params::new()).await;
    }
    assert_eq!(driver.connect_attempts(), 1);

    tokio::time::advance(Duration::from_secs(30)).await;
    let err = connection
        .read_query("MATCH (n) RETURN n", Params::new())
        .await
        .expect_err("still open");
    assert!(matches!(err, Error::CircuitOpen { retry_after_secs: 30 }));

    tokio::time::advance(Duration::from_secs(30)).await;
    driver.respond("MATCH", vec![Record::new().with("n", 1i64)]);

    let rows = connection
        .read_query("MATCH (n) RETURN n", Params::new())
        .await
        .expect("probe succeeds");
    assert_eq!(rows.len(), 1);
    assert_eq!(driver.connect_attempts(), 2);
    assert_eq!(connection.breaker().failure_count(), 0);
    assert!(connection.is_healthy());
}

#[tokio::test(start_paused = true)]
async fn test_connection_failures_trip_breaker() {
    let driver = MockGraphDriver::new();
    driver.set_connect_failure(Some(DriverError::Connection("refused".to_string())));
    let connection = manager(&driver);

    for _ in 0..5 {
        let err = connection
            .read_query("RETURN 1", Params::new())
            .await
            .expect_err("unreachable");
        assert!(matches!(err, Error::ConnectionFailure(_)));
    }
    assert_eq!(driver.connect_attempts(), 5);
    assert_eq!(driver.sessions_opened(), 0);

    let err = connection
        .read_query("RETURN 1", Params::new())
        .await
        .expect_err("open");
    assert!(err.is_unavailable());
    assert_eq!(driver.connect_attempts(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_queries_trip_breaker_while_ping_succeeds() {
    let driver = MockGraphDriver::new();
    driver.fail("MATCH", DriverError::Connection("connection reset by peer".to_string()));
    let connection = manager(&driver);

    for expected in 1..=5 {
        let err = connection
            .read_query("MATCH (n) RETURN n", Params::new())
            .await
            .expect_err("dropped");
        assert!(matches!(err, Error::ConnectionFailure(_)));
        assert_eq!(connection.breaker().failure_count(), expected);
    }

    let err = connection
        .read_query("MATCH (n) RETURN n", Params::new())
        .await
        .expect_err("open");
    assert!(matches!(err, Error::CircuitOpen { retry_after_secs: 60 }));
    assert_eq!(driver.query_count(), 5);
    assert_eq!(driver.connect_attempts(), 1);
}

#[tokio::test]
async fn test_custom_threshold_from_config() {
    let mut config = Config::default();
    config.breaker.failure_threshold = 2;

    let driver = MockGraphDriver::new();
    driver.fail("MATCH", DriverError::Query("boom".to_string()));
    let connection = manager_with(&driver, &config);

    let _ = connection.read_query("MATCH (n) RETURN n", Params::new()).await;
    let _ = connection.read_query("MATCH (n) RETURN n", Params::new()).await;
    let err = connection
        .read_query("MATCH (n) RETURN n", Params::new())
        .await
        .expect_err("open");
    assert!(matches!(err, Error::CircuitOpen { .. }));
}

#[tokio::test]
async fn test_session_config_follows_options() {
    let driver = MockGraphDriver::new();
    let connection = manager(&driver);

    connection
        .execute_query("RETURN 1", Params::new(), QueryOptions::read().on_database("memory"))
        .await
        .expect("read");
    connection.write_query("CREATE (n)", Params::new()).await.expect("write");

    let calls = driver.calls();
    assert_eq!(calls[0].config.database, "memory");
    assert_eq!(calls[0].config.access_mode, AccessMode::Read);
    assert_eq!(calls[1].config.database, "neo4j");
    assert_eq!(calls[1].config.access_mode, AccessMode::Write);
}

#[tokio::test]
async fn test_results_are_normalized() {
    let driver = MockGraphDriver::new();
    driver.respond(
        "MATCH (c:Concept)",
        vec![Record::new().with(
            "c",
            NodeValue::new("4:db:7", "Concept").with_property("name", "security"),
        )],
    );
    let connection = manager(&driver);

    let rows = connection
        .read_query("MATCH (c:Concept) RETURN c", Params::new())
        .await
        .expect("query");
    assert_eq!(rows[0]["c"], json!({"id": "4:db:7", "labels": ["Concept"], "name": "security"}));
}

#[tokio::test]
async fn test_health_check_unreachable_does_not_fail() {
    let driver = MockGraphDriver::new();
    driver.set_connect_failure(Some(DriverError::Connection("refused".to_string())));
    let connection = manager(&driver);

    assert!(connection.last_health_status().is_none());
    let status = connection.health_check().await;

    assert!(!status.connected);
    assert!(status.latency_ms.is_none());
    assert_eq!(connection.last_health_status(), Some(status));
    assert!(!connection.is_healthy());
}

#[tokio::test]
async fn test_health_check_reports_statistics() {
    let driver = MockGraphDriver::new();
    driver.respond(
        "nodeCount",
        vec![Record::new().with("nodeCount", 12i64).with("relCount", 30i64)],
    );
    let connection = manager(&driver);

    let status = connection.health_check().await;
    assert!(status.connected);
    assert!(status.latency_ms.is_some());
    assert_eq!(status.node_count, Some(12));
    assert_eq!(status.relationship_count, Some(30));
    assert!(connection.is_healthy());
}

#[tokio::test]
async fn test_health_check_without_statistics() {
    let mut config = Config::default();
    config.health.include_statistics = false;
    let driver = MockGraphDriver::new();
    let connection = manager_with(&driver, &config);

    let status = connection.health_check().await;
    assert!(status.connected);
    assert!(status.node_count.is_none());
    assert!(driver.calls_matching("nodeCount").is_empty());
}

#[tokio::test]
async fn test_invalid_label_rejected_before_driver() {
    let driver = MockGraphDriver::new();
    let connection = manager(&driver);

    let err = connection
        .search_nodes("File) DETACH DELETE (x", "auth", 10)
        .await
        .expect_err("invalid");
    assert!(matches!(err, Error::InvalidInput(_)));

    let err = connection
        .create_relationship("a", "b", "RELATES TO", serde_json::Map::new())
        .await
        .expect_err("invalid");
    assert!(matches!(err, Error::InvalidInput(_)));

    assert_eq!(driver.query_count(), 0);
    assert_eq!(driver.connect_attempts(), 0);
}

#[tokio::test]
async fn test_create_node_derives_id() {
    let driver = MockGraphDriver::new();
    driver.on("MERGE (n:Service", |_, params| {
        let id = params["id"].as_str().unwrap_or_default().to_string();
        Ok(vec![Record::new().with(
            "n",
            NodeValue::new("4:db:1", "Service")
                .with_property("id", id)
                .with_property("name", "AuthService"),
        )])
    });
    let connection = manager(&driver);

    let mut props = serde_json::Map::new();
    props.insert("name".to_string(), json!("AuthService"));
    let node = connection.create_node("Service", props).await.expect("create");
    assert_eq!(node["name"], "AuthService");

    let call = &driver.calls_matching("MERGE (n:Service")[0];
    let id = call.params["id"].as_str().expect("id param");
    assert_eq!(id.len(), 32);
    assert_eq!(call.params["props"]["name"], "AuthService");
}

#[tokio::test]
async fn test_node_lookup_and_relationships() {
    let driver = MockGraphDriver::new();
    driver.respond(
        "RETURN n LIMIT 1",
        vec![Record::new().with("n", NodeValue::new("4:db:3", "File").with_property("path", "src/auth.ts"))],
    );
    driver.respond(
        "RETURN r, m",
        vec![Record::new()
            .with(
                "r",
                cortex_core::graph::RelationshipValue {
                    id: "9".to_string(),
                    rel_type: "MENTIONS".to_string(),
                    start_node_id: "4:db:8".to_string(),
                    end_node_id: "4:db:3".to_string(),
                    properties: Vec::new(),
                },
            )
            .with("m", NodeValue::new("4:db:8", "Message"))],
    );
    driver.respond("deleted", vec![Record::new().with("deleted", 1i64)]);
    let connection = manager(&driver);

    let node = connection.get_node_by_id("file-1").await.expect("lookup").expect("found");
    assert_eq!(node["path"], "src/auth.ts");

    let rels = connection
        .get_node_relationships("file-1", Direction::In, 25)
        .await
        .expect("relationships");
    assert_eq!(rels.len(), 1);
    assert_eq!(rels[0].relationship["type"], "MENTIONS");
    assert!(driver.calls_matching("(n)<-[r]-(m)")[0].params["limit"] == json!(25));

    assert!(connection.delete_node("file-1").await.expect("delete"));
}

#[tokio::test]
async fn test_search_nodes_passes_parameters() {
    let driver = MockGraphDriver::new();
    let connection = manager(&driver);

    let nodes = connection.search_nodes("Document", "graph", 5).await.expect("search");
    assert!(nodes.is_empty());

    let call = &driver.calls_matching("MATCH (n:Document)")[0];
    assert_eq!(call.params, params([("term", json!("graph")), ("limit", json!(5))]));
    assert_eq!(call.config.access_mode, AccessMode::Read);
}

#[tokio::test]
async fn test_close_marks_disconnected() {
    let driver = MockGraphDriver::new();
    let connection = manager(&driver);

    connection.read_query("RETURN 1", Params::new()).await.expect("query");
    assert!(connection.is_connected());

    connection.close().await;
    assert!(!connection.is_connected());
    assert_eq!(driver.close_count(), 1);
}
