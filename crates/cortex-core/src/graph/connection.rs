//! Connection manager: the single entry point for graph queries.
//!
//! Owns the driver, the circuit breaker and the last-known health snapshot.
//! Construct one per process and share it behind an `Arc`.

use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::breaker::{Admission, CircuitBreaker, retry_after_secs};
use super::driver::{AccessMode, DriverError, GraphDriver, SessionConfig};
use super::value::{Params, Row};
use super::params;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::health::HealthStatus;

const PING_QUERY: &str = "RETURN 1 AS ok";

const STATS_QUERY: &str = "MATCH (n) WITH count(n) AS nodeCount \
     OPTIONAL MATCH ()-[r]->() \
     RETURN nodeCount, count(r) AS relCount";

/// Per-call options for [`ConnectionManager::execute_query`]
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub read_only: bool,
    pub timeout: Option<Duration>,
    pub database: Option<String>,
}

impl QueryOptions {
    pub fn read() -> Self {
        Self {
            read_only: true,
            ..Default::default()
        }
    }

    pub fn write() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn on_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }
}

/// Edge direction relative to the anchor node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    In,
    Out,
    #[default]
    Both,
}

/// A relationship together with the node on its far side
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRelationship {
    pub relationship: Value,
    pub node: Value,
}

pub struct ConnectionManager {
    driver: Arc<dyn GraphDriver>,
    database: String,
    acquisition_timeout: Duration,
    query_timeout: Option<Duration>,
    include_statistics: bool,
    breaker: CircuitBreaker,
    connected: AtomicBool,
    last_health: RwLock<Option<HealthStatus>>,
}

impl ConnectionManager {
    pub fn new(driver: Arc<dyn GraphDriver>, config: &Config) -> Self {
        Self {
            driver,
            database: config.graph.database.clone(),
            acquisition_timeout: config.graph.acquisition_timeout(),
            query_timeout: config.graph.query_timeout(),
            include_statistics: config.health.include_statistics,
            breaker: CircuitBreaker::new(&config.breaker),
            connected: AtomicBool::new(false),
            last_health: RwLock::new(None),
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Run a read-only query
    pub async fn read_query(&self, query: &str, params: Params) -> Result<Vec<Row>> {
        self.execute_query(query, params, QueryOptions::read()).await
    }

    /// Run a write query
    pub async fn write_query(&self, query: &str, params: Params) -> Result<Vec<Row>> {
        self.execute_query(query, params, QueryOptions::write()).await
    }

    /// Execute a parameterized query in its own session.
    ///
    /// The session is closed exactly once whether the query succeeds, fails
    /// or times out. Failures are recorded on the circuit breaker and returned
    /// unchanged.
    pub async fn execute_query(&self, query: &str, params: Params, options: QueryOptions) -> Result<Vec<Row>> {
        self.ensure_connection().await?;

        let config = SessionConfig {
            database: options.database.unwrap_or_else(|| self.database.clone()),
            access_mode: if options.read_only { AccessMode::Read } else { AccessMode::Write },
        };

        let mut session = match self.acquire_session(config).await {
            Ok(session) => session,
            Err(err) => {
                self.breaker.record_failure();
                return Err(err);
            }
        };

        let started = Instant::now();
        let outcome = match options.timeout.or(self.query_timeout) {
            Some(limit) => match tokio::time::timeout(limit, session.run(query, &params)).await {
                Ok(result) => result.map_err(|e| self.driver_error(e)),
                Err(_) => Err(Error::QueryTimeout(limit.as_millis() as u64)),
            },
            None => session.run(query, &params).await.map_err(|e| self.driver_error(e)),
        };
        session.close().await;

        match outcome {
            Ok(records) => {
                self.breaker.record_success();
                debug!(
                    latency_ms = started.elapsed().as_millis() as u64,
                    rows = records.len(),
                    "Graph query completed"
                );
                Ok(records.into_iter().map(|record| record.into_row()).collect())
            }
            Err(err) => {
                self.breaker.record_failure();
                warn!(
                    error = %err,
                    failures = self.breaker.failure_count(),
                    "Graph query failed"
                );
                Err(err)
            }
        }
    }

    async fn ensure_connection(&self) -> Result<()> {
        match self.breaker.admit() {
            Ok(Admission::Closed) => {}
            Ok(Admission::Probe) => {
                info!("Circuit reset timeout elapsed, probing graph store");
                self.connected.store(false, Ordering::SeqCst);
            }
            Err(remaining) => {
                return Err(Error::CircuitOpen {
                    retry_after_secs: retry_after_secs(remaining),
                });
            }
        }

        if self.connected.load(Ordering::SeqCst) {
            return Ok(());
        }

        match self.driver.verify_connectivity().await {
            Ok(()) => {
                self.connected.store(true, Ordering::SeqCst);
                self.breaker.record_success();
                info!(database = %self.database, "Connected to graph store");
                Ok(())
            }
            Err(err) => {
                self.connected.store(false, Ordering::SeqCst);
                self.breaker.record_failure();
                warn!(
                    error = %err,
                    failures = self.breaker.failure_count(),
                    "Graph store unreachable"
                );
                Err(Error::ConnectionFailure(err.to_string()))
            }
        }
    }

    async fn acquire_session(&self, config: SessionConfig) -> Result<Box<dyn super::driver::GraphSession>> {
        let acquire = self.driver.session(config);
        let result = if self.acquisition_timeout.is_zero() {
            acquire.await
        } else {
            match tokio::time::timeout(self.acquisition_timeout, acquire).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(Error::ConnectionFailure(format!(
                        "session acquisition timed out after {}ms",
                        self.acquisition_timeout.as_millis()
                    )));
                }
            }
        };
        result.map_err(|e| self.driver_error(e))
    }

    // `connected` is cleared only once the reset timeout admits a call, so consecutive query
    // failures keep accumulating on the breaker.
    fn driver_error(&self, err: DriverError) -> Error {
        match err {
            DriverError::Connection(msg) => Error::ConnectionFailure(msg),
            DriverError::Query(msg) => Error::QueryExecution(msg),
        }
    }

    // ========== Health ==========

    /// Probe the store and record the snapshot. Never fails.
    pub async fn health_check(&self) -> HealthStatus {
        let started = Instant::now();

        let status = match self.read_query(PING_QUERY, Params::new()).await {
            Ok(_) => {
                let latency_ms = started.elapsed().as_millis() as u64;
                let (node_count, relationship_count) = if self.include_statistics {
                    self.statistics().await
                } else {
                    (None, None)
                };
                HealthStatus::connected(latency_ms, node_count, relationship_count)
            }
            Err(err) => {
                warn!(error = %err, "Graph health check failed");
                HealthStatus::disconnected()
            }
        };

        if let Ok(mut last) = self.last_health.write() {
            *last = Some(status.clone());
        }
        status
    }

    async fn statistics(&self) -> (Option<i64>, Option<i64>) {
        match self.read_query(STATS_QUERY, Params::new()).await {
            Ok(rows) => rows
                .first()
                .map(|row| {
                    (
                        row.get("nodeCount").and_then(Value::as_i64),
                        row.get("relCount").and_then(Value::as_i64),
                    )
                })
                .unwrap_or((None, None)),
            Err(err) => {
                debug!(error = %err, "Graph statistics unavailable");
                (None, None)
            }
        }
    }

    /// The most recent health snapshot, if a check has run
    pub fn last_health_status(&self) -> Option<HealthStatus> {
        self.last_health.read().ok().and_then(|last| last.clone())
    }

    /// Connected and below the breaker threshold
    pub fn is_healthy(&self) -> bool {
        self.is_connected() && self.breaker.failure_count() < self.breaker.failure_threshold()
    }

    /// Close the driver
    pub async fn close(&self) {
        self.driver.close().await;
        self.connected.store(false, Ordering::SeqCst);
        info!("Graph connection closed");
    }

    // ========== Node Operations ==========

    /// Substring search over name, title and content of one label
    pub async fn search_nodes(&self, label: &str, term: &str, limit: usize) -> Result<Vec<Value>> {
        validate_identifier(label)?;
        let query = format!(
            "MATCH (n:{label}) \
             WHERE toLower(coalesce(n.name, '')) CONTAINS toLower($term) \
                OR toLower(coalesce(n.title, '')) CONTAINS toLower($term) \
                OR toLower(coalesce(n.content, '')) CONTAINS toLower($term) \
             RETURN n LIMIT $limit"
        );
        let rows = self
            .read_query(&query, params([("term", json!(term)), ("limit", json!(limit))]))
            .await?;
        Ok(take_column(rows, "n"))
    }

    pub async fn get_node_by_id(&self, id: &str) -> Result<Option<Value>> {
        let rows = self
            .read_query(
                "MATCH (n) WHERE n.id = $id OR elementId(n) = $id RETURN n LIMIT 1",
                params([("id", json!(id))]),
            )
            .await?;
        Ok(take_column(rows, "n").into_iter().next())
    }

    pub async fn get_node_relationships(
        &self,
        id: &str,
        direction: Direction,
        limit: usize,
    ) -> Result<Vec<NodeRelationship>> {
        let pattern = match direction {
            Direction::Out => "(n)-[r]->(m)",
            Direction::In => "(n)<-[r]-(m)",
            Direction::Both => "(n)-[r]-(m)",
        };
        let query = format!(
            "MATCH {pattern} WHERE n.id = $id OR elementId(n) = $id RETURN r, m LIMIT $limit"
        );
        let rows = self
            .read_query(&query, params([("id", json!(id)), ("limit", json!(limit))]))
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|mut row| {
                Some(NodeRelationship {
                    relationship: row.remove("r")?,
                    node: row.remove("m")?,
                })
            })
            .collect())
    }

    /// Merge a node by `id`. Without an explicit `id` one is derived from the
    /// label and the node's name, title or full property set.
    pub async fn create_node(&self, label: &str, properties: serde_json::Map<String, Value>) -> Result<Value> {
        validate_identifier(label)?;
        let id = match properties.get("id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => derive_node_id(label, &properties),
        };
        let query = format!("MERGE (n:{label} {{id: $id}}) SET n += $props, n.updatedAt = $now RETURN n");
        let rows = self
            .write_query(
                &query,
                params([
                    ("id", json!(id)),
                    ("props", Value::Object(properties)),
                    ("now", json!(chrono::Utc::now().to_rfc3339())),
                ]),
            )
            .await?;

        take_column(rows, "n")
            .into_iter()
            .next()
            .ok_or_else(|| Error::QueryExecution(format!("MERGE returned no node for id {}", id)))
    }

    /// Merge a typed edge between two existing nodes. `None` when either
    /// endpoint is missing.
    pub async fn create_relationship(
        &self,
        from_id: &str,
        to_id: &str,
        rel_type: &str,
        properties: serde_json::Map<String, Value>,
    ) -> Result<Option<Value>> {
        validate_identifier(rel_type)?;
        let query = format!(
            "MATCH (a), (b) \
             WHERE (a.id = $from OR elementId(a) = $from) AND (b.id = $to OR elementId(b) = $to) \
             MERGE (a)-[r:{rel_type}]->(b) \
             SET r += $props \
             RETURN r"
        );
        let rows = self
            .write_query(
                &query,
                params([
                    ("from", json!(from_id)),
                    ("to", json!(to_id)),
                    ("props", Value::Object(properties)),
                ]),
            )
            .await?;
        Ok(take_column(rows, "r").into_iter().next())
    }

    /// Detach-delete a node. Returns whether anything was removed.
    pub async fn delete_node(&self, id: &str) -> Result<bool> {
        let rows = self
            .write_query(
                "MATCH (n) WHERE n.id = $id OR elementId(n) = $id \
                 WITH n, n.id AS removed \
                 DETACH DELETE n \
                 RETURN count(removed) AS deleted",
                params([("id", json!(id))]),
            )
            .await?;
        Ok(rows
            .first()
            .and_then(|row| row.get("deleted"))
            .and_then(Value::as_i64)
            .is_some_and(|n| n > 0))
    }
}

/// Labels and relationship types are spliced into query text, so only plain
/// identifiers are accepted.
pub fn validate_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_') && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "'{}' is not a valid label or relationship type",
            name
        )))
    }
}

fn derive_node_id(label: &str, properties: &serde_json::Map<String, Value>) -> String {
    let basis = properties
        .get("name")
        .or_else(|| properties.get("title"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| Value::Object(properties.clone()).to_string());

    let digest = Sha256::digest(format!("{}:{}", label, basis).as_bytes());
    hex::encode(&digest[..16])
}

fn take_column(rows: Vec<Row>, column: &str) -> Vec<Value> {
    rows.into_iter()
        .filter_map(|mut row| row.remove(column))
        .collect()
}
