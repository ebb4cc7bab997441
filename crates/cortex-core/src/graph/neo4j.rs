//! Bolt driver backed by neo4rs

use async_trait::async_trait;
use neo4rs::{
    BoltBoolean, BoltFloat, BoltInteger, BoltList, BoltMap, BoltNull, BoltString, BoltType, ConfigBuilder, Graph,
    Row, query,
};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::driver::{DriverError, GraphDriver, GraphSession, SessionConfig};
use super::value::{NodeValue, Params, Record, RelationshipValue, StoreValue};
use crate::config::GraphConfig;

/// Connects on first use. A failed connect is retried on the next call.
pub struct Neo4jDriver {
    uri: String,
    user: String,
    password: String,
    database: String,
    max_connections: usize,
    fetch_size: usize,
    connection_timeout: Duration,
    graph: OnceCell<Graph>,
}

impl Neo4jDriver {
    pub fn new(config: &GraphConfig, password: Option<String>) -> Self {
        Self {
            uri: config.uri.clone(),
            user: config.user.clone(),
            password: password.unwrap_or_default(),
            database: config.database.clone(),
            max_connections: config.max_connections,
            fetch_size: config.fetch_size,
            connection_timeout: config.connection_timeout(),
            graph: OnceCell::new(),
        }
    }

    async fn graph(&self) -> Result<Graph, DriverError> {
        let graph = self
            .graph
            .get_or_try_init(|| async {
                let config = ConfigBuilder::default()
                    .uri(self.uri.as_str())
                    .user(self.user.as_str())
                    .password(self.password.as_str())
                    .db(self.database.as_str())
                    .max_connections(self.max_connections)
                    .fetch_size(self.fetch_size)
                    .build()
                    .map_err(classify)?;

                let graph = tokio::time::timeout(self.connection_timeout, Graph::connect(config))
                    .await
                    .map_err(|_| {
                        DriverError::Connection(format!(
                            "Unreachable - no response within {}ms",
                            self.connection_timeout.as_millis()
                        ))
                    })?
                    .map_err(classify)?;

                info!(uri = %self.uri, "Bolt connection pool created");
                Ok::<_, DriverError>(graph)
            })
            .await?;
        Ok(graph.clone())
    }
}

#[async_trait]
impl GraphDriver for Neo4jDriver {
    async fn verify_connectivity(&self) -> Result<(), DriverError> {
        let graph = self.graph().await?;
        tokio::time::timeout(self.connection_timeout, graph.run(query("RETURN 1")))
            .await
            .map_err(|_| DriverError::Connection("Unreachable - connection failed".to_string()))?
            .map_err(classify)
    }

    async fn session(&self, config: SessionConfig) -> Result<Box<dyn GraphSession>, DriverError> {
        let graph = self.graph().await?;
        Ok(Box::new(Neo4jSession { graph, config }))
    }

    async fn close(&self) {
        // neo4rs closes pooled connections when the last Graph handle drops
        debug!("Bolt driver close requested");
    }
}

struct Neo4jSession {
    graph: Graph,
    config: SessionConfig,
}

#[async_trait]
impl GraphSession for Neo4jSession {
    async fn run(&mut self, cypher: &str, params: &Params) -> Result<Vec<Record>, DriverError> {
        let mut q = query(cypher);
        for (key, value) in params {
            q = q.param(key.as_str(), to_bolt(value));
        }

        debug!(database = %self.config.database, mode = ?self.config.access_mode, "Running Bolt query");
        let mut stream = self
            .graph
            .execute_on(self.config.database.as_str(), q)
            .await
            .map_err(classify)?;

        let mut records = Vec::new();
        while let Some(row) = stream.next().await.map_err(classify)? {
            records.push(row_to_record(&row)?);
        }
        Ok(records)
    }

    async fn close(self: Box<Self>) {}
}

fn classify(err: neo4rs::Error) -> DriverError {
    match err {
        neo4rs::Error::IOError { .. } | neo4rs::Error::ConnectionError => {
            DriverError::Connection(err.to_string())
        }
        other => DriverError::Query(other.to_string()),
    }
}

fn row_to_record(row: &Row) -> Result<Record, DriverError> {
    let mut record = Record::new();
    let columns: BoltMap = row
        .to_strict()
        .map_err(|e| DriverError::Query(format!("failed to decode row: {}", e)))?;
    for key in columns.value.keys() {
        let name = key.value.clone();
        let value: BoltType = row
            .get(name.as_str())
            .map_err(|e| DriverError::Query(format!("failed to decode column {}: {}", name, e)))?;
        record.push(name, from_bolt(&value));
    }
    Ok(record)
}

fn from_bolt(value: &BoltType) -> StoreValue {
    match value {
        BoltType::Null(_) => StoreValue::null(),
        BoltType::Boolean(b) => StoreValue::bool(b.value),
        BoltType::Integer(i) => StoreValue::integer(i.value),
        BoltType::Float(f) => StoreValue::float(f.value),
        BoltType::String(s) => StoreValue::string(s.value.clone()),
        BoltType::List(list) => StoreValue::List(list.value.iter().map(from_bolt).collect()),
        BoltType::Map(map) => StoreValue::Map(from_bolt_map(map)),
        BoltType::Node(node) => StoreValue::Node(NodeValue {
            id: node.id.value.to_string(),
            labels: node
                .labels
                .value
                .iter()
                .filter_map(|label| match label {
                    BoltType::String(s) => Some(s.value.clone()),
                    _ => None,
                })
                .collect(),
            properties: from_bolt_map(&node.properties),
        }),
        BoltType::Relation(rel) => StoreValue::Relationship(RelationshipValue {
            id: rel.id.value.to_string(),
            rel_type: rel.typ.value.clone(),
            start_node_id: rel.start_node_id.value.to_string(),
            end_node_id: rel.end_node_id.value.to_string(),
            properties: from_bolt_map(&rel.properties),
        }),
        other => StoreValue::string(format!("{:?}", other)),
    }
}

fn from_bolt_map(map: &BoltMap) -> Vec<(String, StoreValue)> {
    map.value
        .iter()
        .map(|(key, value)| (key.value.clone(), from_bolt(value)))
        .collect()
}

fn to_bolt(value: &Value) -> BoltType {
    match value {
        Value::Null => BoltType::Null(BoltNull),
        Value::Bool(b) => BoltType::Boolean(BoltBoolean::new(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => BoltType::Integer(BoltInteger::new(i)),
            None => BoltType::Float(BoltFloat::new(n.as_f64().unwrap_or_default())),
        },
        Value::String(s) => BoltType::String(BoltString::new(s)),
        Value::Array(items) => {
            let mut list = BoltList::new();
            for item in items {
                list.push(to_bolt(item));
            }
            BoltType::List(list)
        }
        Value::Object(entries) => {
            let mut map = BoltMap::new();
            for (key, item) in entries {
                map.put(BoltString::new(key), to_bolt(item));
            }
            BoltType::Map(map)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_params_convert_to_bolt() {
        assert!(matches!(to_bolt(&json!(5)), BoltType::Integer(i) if i.value == 5));
        assert!(matches!(to_bolt(&json!(0.25)), BoltType::Float(f) if f.value == 0.25));
        assert!(matches!(to_bolt(&json!("neo4j")), BoltType::String(s) if s.value == "neo4j"));
        assert!(matches!(to_bolt(&json!(null)), BoltType::Null(_)));

        match to_bolt(&json!(["a", 1])) {
            BoltType::List(list) => assert_eq!(list.value.len(), 2),
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn test_bolt_round_trip_through_store_value() {
        let bolt = to_bolt(&json!({"name": "security", "mentions": 2}));
        let normalized = from_bolt(&bolt).normalize();
        assert_eq!(normalized, json!({"name": "security", "mentions": 2}));
    }

    #[test]
    fn test_driver_starts_disconnected() {
        let driver = Neo4jDriver::new(&GraphConfig::default(), None);
        assert!(driver.graph.get().is_none());
    }
}
