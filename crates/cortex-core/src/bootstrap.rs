//! Process wiring
//!
//! Builds the one [`ConnectionManager`] a process uses and hands it to every
//! component that queries the graph.

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::domain::{HybridRetrievalEngine, KnowledgeIngestionPipeline, PatternMiningEngine};
use crate::error::{Error, Result};
use crate::graph::{ConnectionManager, GraphDriver, Neo4jDriver};
use crate::health::{HealthMonitor, HealthReport, doctor};
use crate::vector::VectorStore;

pub struct Cortex {
    config: Config,
    connection: Arc<ConnectionManager>,
    vectors: Arc<dyn VectorStore>,
    ingestion: KnowledgeIngestionPipeline,
    retrieval: HybridRetrievalEngine,
    patterns: Arc<PatternMiningEngine>,
}

impl Cortex {
    /// Bolt driver from configuration, paired with the caller's vector store
    pub fn from_config(config: Config, vectors: Arc<dyn VectorStore>) -> Result<Self> {
        let password = config
            .graph
            .resolved_password()
            .map_err(|e| Error::ConfigError(e.to_string()))?;
        let driver = Arc::new(Neo4jDriver::new(&config.graph, password));
        Ok(Self::with_parts(config, driver, vectors))
    }

    pub fn with_parts(config: Config, driver: Arc<dyn GraphDriver>, vectors: Arc<dyn VectorStore>) -> Self {
        let connection = Arc::new(ConnectionManager::new(driver, &config));
        let patterns = Arc::new(PatternMiningEngine::new(Arc::clone(&connection)));
        let ingestion = KnowledgeIngestionPipeline::new(Arc::clone(&connection), Arc::clone(&vectors), &config.vector);
        let retrieval = HybridRetrievalEngine::new(
            Arc::clone(&connection),
            Arc::clone(&vectors),
            Arc::clone(&patterns),
            &config,
        );

        Self {
            config,
            connection,
            vectors,
            ingestion,
            retrieval,
            patterns,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.connection
    }

    pub fn vectors(&self) -> &Arc<dyn VectorStore> {
        &self.vectors
    }

    pub fn ingestion(&self) -> &KnowledgeIngestionPipeline {
        &self.ingestion
    }

    pub fn retrieval(&self) -> &HybridRetrievalEngine {
        &self.retrieval
    }

    pub fn patterns(&self) -> &PatternMiningEngine {
        &self.patterns
    }

    /// Start periodic health refresh at the configured interval
    pub fn spawn_health_monitor(&self) -> HealthMonitor {
        HealthMonitor::spawn(
            Arc::clone(&self.connection),
            Duration::from_secs(self.config.health.interval_secs),
        )
    }

    pub async fn doctor(&self) -> HealthReport {
        doctor(&self.connection, self.vectors.as_ref(), &self.config).await
    }

    pub async fn shutdown(&self) {
        self.connection.close().await;
    }
}
