//! Configuration management with file persistence
//!
//! Settings live in `config.toml` under the Cortex config directory. The
//! graph connection can also be driven from the environment with `NEO4J_URI`,
//! `NEO4J_USER` and `NEO4J_DATABASE`. The password is only ever read from
//! `NEO4J_PASSWORD` and is never written to disk.

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Cortex configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub graph: GraphConfig,
    pub breaker: BreakerConfig,
    pub vector: VectorConfig,
    pub retrieval: RetrievalConfig,
    pub health: HealthConfig,
}

/// Graph store connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    #[serde(skip)]
    pub password: Option<String>,
    pub database: String,
    pub max_connections: usize,
    pub fetch_size: usize,
    pub connection_timeout_ms: u64,
    pub acquisition_timeout_ms: u64,
    /// Default per-query timeout. `0` disables it.
    pub query_timeout_ms: u64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: None,
            database: "neo4j".to_string(),
            max_connections: 50,
            fetch_size: 200,
            connection_timeout_ms: 20_000,
            acquisition_timeout_ms: 30_000,
            query_timeout_ms: 0,
        }
    }
}

/// Circuit breaker thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub reset_timeout_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_secs: 60,
        }
    }
}

/// Vector store namespaces and limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorConfig {
    pub message_namespace: String,
    pub knowledge_namespace: String,
    pub search_limit: usize,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            message_namespace: "neural_chat".to_string(),
            knowledge_namespace: "knowledge".to_string(),
            search_limit: 10,
        }
    }
}

/// Retrieval tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Labels searched by the graph branch of hybrid search when the query
    /// context does not name any.
    pub node_labels: Vec<String>,
    /// Below this many semantic message hits, message search falls back to
    /// substring matching in the graph.
    pub min_vector_hits: usize,
    pub graph_limit: usize,
    pub message_limit: usize,
    pub history_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            node_labels: ["File", "Component", "Service", "Document", "Concept", "Agent"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            min_vector_hits: 5,
            graph_limit: 30,
            message_limit: 20,
            history_limit: 20,
        }
    }
}

/// Background health refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub interval_secs: u64,
    pub include_statistics: bool,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            include_statistics: true,
        }
    }
}

impl GraphConfig {
    pub fn resolved_password(&self) -> anyhow::Result<Option<String>> {
        self.enforce_env_only()?;
        Ok(env::var("NEO4J_PASSWORD").ok())
    }

    pub fn enforce_env_only(&self) -> anyhow::Result<()> {
        if self.password.is_some() {
            return Err(anyhow!(
                "Graph store passwords must be provided via NEO4J_PASSWORD, not stored in configuration"
            ));
        }
        Ok(())
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    pub fn acquisition_timeout(&self) -> Duration {
        Duration::from_millis(self.acquisition_timeout_ms)
    }

    pub fn query_timeout(&self) -> Option<Duration> {
        (self.query_timeout_ms > 0).then(|| Duration::from_millis(self.query_timeout_ms))
    }
}

impl BreakerConfig {
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_secs(self.reset_timeout_secs)
    }
}

const KEYS: &[&str] = &[
    "graph.uri",
    "graph.user",
    "graph.password",
    "graph.database",
    "graph.max_connections",
    "graph.fetch_size",
    "graph.connection_timeout_ms",
    "graph.acquisition_timeout_ms",
    "graph.query_timeout_ms",
    "breaker.failure_threshold",
    "breaker.reset_timeout_secs",
    "vector.message_namespace",
    "vector.knowledge_namespace",
    "vector.search_limit",
    "retrieval.node_labels",
    "retrieval.min_vector_hits",
    "retrieval.graph_limit",
    "retrieval.message_limit",
    "retrieval.history_limit",
    "health.interval_secs",
    "health.include_statistics",
];

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("CORTEX_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("cortex")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from the default path and apply environment
    /// overrides
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|key| env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from a file, or the defaults if it doesn't exist
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default path
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to a file
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        self.validate()?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Apply `NEO4J_*` overrides from a variable lookup
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(uri) = lookup("NEO4J_URI") {
            self.graph.uri = uri;
        }
        if let Some(user) = lookup("NEO4J_USER") {
            self.graph.user = user;
        }
        if let Some(database) = lookup("NEO4J_DATABASE") {
            self.graph.database = database;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        self.graph.enforce_env_only()?;

        if self.graph.max_connections == 0 {
            return Err(anyhow!("graph.max_connections must be at least 1"));
        }
        if self.breaker.failure_threshold == 0 {
            return Err(anyhow!("breaker.failure_threshold must be at least 1"));
        }
        if self.vector.message_namespace.is_empty() || self.vector.knowledge_namespace.is_empty() {
            return Err(anyhow!("Vector namespaces must not be empty"));
        }
        if self.health.interval_secs == 0 {
            return Err(anyhow!("health.interval_secs must be at least 1"));
        }
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            "graph.uri" => Ok(self.graph.uri.clone()),
            "graph.user" => Ok(self.graph.user.clone()),
            "graph.database" => Ok(self.graph.database.clone()),
            "graph.max_connections" => Ok(self.graph.max_connections.to_string()),
            "graph.fetch_size" => Ok(self.graph.fetch_size.to_string()),
            "graph.connection_timeout_ms" => Ok(self.graph.connection_timeout_ms.to_string()),
            "graph.acquisition_timeout_ms" => Ok(self.graph.acquisition_timeout_ms.to_string()),
            "graph.query_timeout_ms" => Ok(self.graph.query_timeout_ms.to_string()),

            "breaker.failure_threshold" => Ok(self.breaker.failure_threshold.to_string()),
            "breaker.reset_timeout_secs" => Ok(self.breaker.reset_timeout_secs.to_string()),

            "vector.message_namespace" => Ok(self.vector.message_namespace.clone()),
            "vector.knowledge_namespace" => Ok(self.vector.knowledge_namespace.clone()),
            "vector.search_limit" => Ok(self.vector.search_limit.to_string()),

            "retrieval.node_labels" => Ok(self.retrieval.node_labels.join(", ")),
            "retrieval.min_vector_hits" => Ok(self.retrieval.min_vector_hits.to_string()),
            "retrieval.graph_limit" => Ok(self.retrieval.graph_limit.to_string()),
            "retrieval.message_limit" => Ok(self.retrieval.message_limit.to_string()),
            "retrieval.history_limit" => Ok(self.retrieval.history_limit.to_string()),

            "health.interval_secs" => Ok(self.health.interval_secs.to_string()),
            "health.include_statistics" => Ok(self.health.include_statistics.to_string()),

            // Password (special handling - never shown)
            "graph.password" => match self.graph.resolved_password()? {
                Some(_) => Ok("***".to_string()),
                None => Ok("(not set - use NEO4J_PASSWORD env var)".to_string()),
            },

            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `cortex config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "graph.uri" => {
                let valid = ["bolt://", "bolt+s://", "bolt+ssc://", "neo4j://", "neo4j+s://", "neo4j+ssc://"];
                if !valid.iter().any(|scheme| value.starts_with(scheme)) {
                    return Err(anyhow!(
                        "Invalid graph URI: {}. Expected one of: {}",
                        value,
                        valid.join(", ")
                    ));
                }
                self.graph.uri = value.to_string();
            }
            "graph.user" => self.graph.user = value.to_string(),
            "graph.database" => self.graph.database = value.to_string(),
            "graph.max_connections" => {
                let max: usize = value
                    .parse()
                    .with_context(|| format!("Invalid max_connections value: {}", value))?;
                if max == 0 {
                    return Err(anyhow!("max_connections must be at least 1"));
                }
                self.graph.max_connections = max;
            }
            "graph.fetch_size" => {
                self.graph.fetch_size = parse_number(key, value)?;
            }
            "graph.connection_timeout_ms" => {
                self.graph.connection_timeout_ms = parse_number(key, value)?;
            }
            "graph.acquisition_timeout_ms" => {
                self.graph.acquisition_timeout_ms = parse_number(key, value)?;
            }
            "graph.query_timeout_ms" => {
                self.graph.query_timeout_ms = parse_number(key, value)?;
            }

            "breaker.failure_threshold" => {
                let threshold: u32 = parse_number(key, value)?;
                if threshold == 0 {
                    return Err(anyhow!("failure_threshold must be at least 1"));
                }
                self.breaker.failure_threshold = threshold;
            }
            "breaker.reset_timeout_secs" => {
                self.breaker.reset_timeout_secs = parse_number(key, value)?;
            }

            "vector.message_namespace" | "vector.knowledge_namespace" => {
                if value.trim().is_empty() {
                    return Err(anyhow!("Namespace must not be empty"));
                }
                if key == "vector.message_namespace" {
                    self.vector.message_namespace = value.trim().to_string();
                } else {
                    self.vector.knowledge_namespace = value.trim().to_string();
                }
            }
            "vector.search_limit" => {
                self.vector.search_limit = parse_number(key, value)?;
            }

            "retrieval.node_labels" => {
                self.retrieval.node_labels = value
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
            }
            "retrieval.min_vector_hits" => {
                self.retrieval.min_vector_hits = parse_number(key, value)?;
            }
            "retrieval.graph_limit" => {
                self.retrieval.graph_limit = parse_number(key, value)?;
            }
            "retrieval.message_limit" => {
                self.retrieval.message_limit = parse_number(key, value)?;
            }
            "retrieval.history_limit" => {
                self.retrieval.history_limit = parse_number(key, value)?;
            }

            "health.interval_secs" => {
                let secs: u64 = parse_number(key, value)?;
                if secs == 0 {
                    return Err(anyhow!("interval_secs must be at least 1"));
                }
                self.health.interval_secs = secs;
            }
            "health.include_statistics" => {
                self.health.include_statistics = value
                    .parse()
                    .with_context(|| format!("Invalid boolean for {}: {}", key, value))?;
            }

            // Password cannot be set via config
            "graph.password" => {
                return Err(anyhow!(
                    "Passwords cannot be stored in configuration. \
                     Set the NEO4J_PASSWORD environment variable instead."
                ));
            }

            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `cortex config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        KEYS.iter()
            .map(|key| {
                let value = self.get(key)?;
                Ok((key.to_string(), value))
            })
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .with_context(|| format!("Invalid value for {}: {}", key, value))
}
