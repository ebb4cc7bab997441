//! Vector-similarity store seam
//!
//! Cortex does not compute embeddings. Records are written with optional
//! embeddings and searched by embedding, by text, or both; how a store scores
//! text is up to the implementation.

mod memory;

pub use memory::InMemoryVectorStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::Result;

/// A record keyed by `id` within `namespace`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub namespace: String,
}

impl VectorRecord {
    pub fn new(namespace: impl Into<String>, id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            embedding: None,
            metadata: Map::new(),
            namespace: namespace.into(),
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    Eq,
    Ne,
    Contains,
    In,
}

/// Metadata predicate; all filters on a query must hold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataFilter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl MetadataFilter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Eq,
            value: value.into(),
        }
    }

    pub fn matches(&self, metadata: &Map<String, Value>) -> bool {
        let actual = metadata.get(&self.field);
        match self.op {
            FilterOp::Eq => actual == Some(&self.value),
            FilterOp::Ne => actual != Some(&self.value),
            FilterOp::Contains => match (actual, &self.value) {
                (Some(Value::String(s)), Value::String(needle)) => s.contains(needle.as_str()),
                (Some(Value::Array(items)), needle) => items.contains(needle),
                _ => false,
            },
            FilterOp::In => match (actual, &self.value) {
                (Some(actual), Value::Array(allowed)) => allowed.contains(actual),
                _ => false,
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VectorQuery {
    pub text: Option<String>,
    pub embedding: Option<Vec<f32>>,
    pub limit: usize,
    pub namespace: String,
    #[serde(default)]
    pub filters: Vec<MetadataFilter>,
}

impl VectorQuery {
    pub fn text(namespace: impl Into<String>, text: impl Into<String>, limit: usize) -> Self {
        Self {
            text: Some(text.into()),
            limit,
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    pub fn with_filter(mut self, filter: MetadataFilter) -> Self {
        self.filters.push(filter);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorSearchResult {
    pub id: String,
    pub content: String,
    pub metadata: Map<String, Value>,
    pub similarity: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VectorStoreStatistics {
    pub total_records: usize,
    pub namespaces: Vec<String>,
    pub per_namespace: BTreeMap<String, usize>,
    pub dimension: Option<usize>,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace the record with the same namespace and id
    async fn upsert(&self, record: VectorRecord) -> Result<()>;

    /// Best matches first, at most `query.limit`
    async fn search(&self, query: &VectorQuery) -> Result<Vec<VectorSearchResult>>;

    async fn delete(&self, namespace: &str, id: &str) -> Result<bool>;

    async fn statistics(&self) -> Result<VectorStoreStatistics>;

    /// Whether records outlive the process
    fn is_persistent(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filters() {
        let mut metadata = Map::new();
        metadata.insert("type".into(), json!("message"));
        metadata.insert("concepts".into(), json!(["neo4j", "security"]));

        assert!(MetadataFilter::eq("type", "message").matches(&metadata));
        assert!(!MetadataFilter::eq("type", "document").matches(&metadata));
        assert!(
            MetadataFilter {
                field: "concepts".into(),
                op: FilterOp::Contains,
                value: json!("security"),
            }
            .matches(&metadata)
        );
        assert!(
            MetadataFilter {
                field: "type".into(),
                op: FilterOp::In,
                value: json!(["message", "document"]),
            }
            .matches(&metadata)
        );
        assert!(
            MetadataFilter {
                field: "missing".into(),
                op: FilterOp::Ne,
                value: json!(1),
            }
            .matches(&metadata)
        );
    }
}
