//! Graph store health snapshots, periodic refresh and diagnostics

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::Config;
use crate::graph::{BreakerState, ConnectionManager};
use crate::vector::VectorStore;

/// Point-in-time connectivity snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationship_count: Option<i64>,
    /// RFC 3339
    pub last_check: String,
}

impl HealthStatus {
    pub fn connected(latency_ms: u64, node_count: Option<i64>, relationship_count: Option<i64>) -> Self {
        Self {
            connected: true,
            latency_ms: Some(latency_ms),
            node_count,
            relationship_count,
            last_check: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn disconnected() -> Self {
        Self {
            connected: false,
            latency_ms: None,
            node_count: None,
            relationship_count: None,
            last_check: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Background task refreshing the connection manager's health snapshot
pub struct HealthMonitor {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl HealthMonitor {
    /// Spawn the refresh loop. The first check runs immediately.
    pub fn spawn(connection: Arc<ConnectionManager>, interval: Duration) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let status = connection.health_check().await;
                        debug!(
                            connected = status.connected,
                            latency_ms = ?status.latency_ms,
                            "Health snapshot refreshed"
                        );
                    }
                }
            }
            info!("Health monitor stopped");
        });

        Self { cancel, handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop the loop and wait for it to exit
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
    }
}

/// Diagnostic check result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: CheckStatus,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

/// Overall diagnostics report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub overall_status: CheckStatus,
    pub checks: Vec<HealthCheck>,
    pub graph: HealthStatus,
    pub timestamp: String,
}

/// Run every diagnostic (doctor command). Never fails.
pub async fn doctor(connection: &ConnectionManager, vectors: &dyn VectorStore, config: &Config) -> HealthReport {
    let graph = connection.health_check().await;
    let checks = vec![
        check_config(config),
        check_graph(&graph),
        check_breaker(connection),
        check_vectors(vectors).await,
    ];

    let overall_status = checks
        .iter()
        .map(|check| check.status)
        .max()
        .unwrap_or(CheckStatus::Ok);

    HealthReport {
        overall_status,
        checks,
        graph,
        timestamp: chrono::Utc::now().to_rfc3339(),
    }
}

fn check_config(config: &Config) -> HealthCheck {
    match config.validate() {
        Ok(()) => HealthCheck {
            name: "Configuration".to_string(),
            status: CheckStatus::Ok,
            message: Some(format!("{} / {}", config.graph.uri, config.graph.database)),
        },
        Err(e) => HealthCheck {
            name: "Configuration".to_string(),
            status: CheckStatus::Error,
            message: Some(e.to_string()),
        },
    }
}

fn check_graph(status: &HealthStatus) -> HealthCheck {
    if !status.connected {
        return HealthCheck {
            name: "Graph store".to_string(),
            status: CheckStatus::Error,
            message: Some("Unreachable".to_string()),
        };
    }

    let mut message = format!("Connected ({}ms)", status.latency_ms.unwrap_or_default());
    if let (Some(nodes), Some(rels)) = (status.node_count, status.relationship_count) {
        message.push_str(&format!(", {} nodes, {} relationships", nodes, rels));
    }
    HealthCheck {
        name: "Graph store".to_string(),
        status: CheckStatus::Ok,
        message: Some(message),
    }
}

fn check_breaker(connection: &ConnectionManager) -> HealthCheck {
    let breaker = connection.breaker();
    let (status, message) = match breaker.state() {
        BreakerState::Open => (CheckStatus::Error, "Open".to_string()),
        BreakerState::Closed if breaker.failure_count() > 0 => (
            CheckStatus::Warning,
            format!(
                "Closed, {}/{} recent failures",
                breaker.failure_count(),
                breaker.failure_threshold()
            ),
        ),
        BreakerState::Closed => (CheckStatus::Ok, "Closed".to_string()),
    };
    HealthCheck {
        name: "Circuit breaker".to_string(),
        status,
        message: Some(message),
    }
}

async fn check_vectors(vectors: &dyn VectorStore) -> HealthCheck {
    match vectors.statistics().await {
        Ok(stats) => {
            let mut message = format!("{} records in {} namespaces", stats.total_records, stats.namespaces.len());
            if !vectors.is_persistent() {
                message.push_str(", process-local, discarded on exit");
            }
            HealthCheck {
                name: "Vector store".to_string(),
                status: CheckStatus::Ok,
                message: Some(message),
            }
        }
        Err(e) => HealthCheck {
            name: "Vector store".to_string(),
            status: CheckStatus::Warning,
            message: Some(e.to_string()),
        },
    }
}
