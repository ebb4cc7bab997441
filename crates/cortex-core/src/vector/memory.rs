//! In-memory vector store implementation

use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use super::{VectorQuery, VectorRecord, VectorSearchResult, VectorStore, VectorStoreStatistics};
use crate::{Error, Result};

/// Weight of the keyword score when a query carries both text and an
/// embedding
const KEYWORD_WEIGHT: f64 = 0.5;

/// Process-local store. Scores by cosine similarity when both the query and
/// the record carry embeddings, by keyword overlap when the query carries
/// text, and blends the two when both apply.
#[derive(Default)]
pub struct InMemoryVectorStore {
    records: RwLock<HashMap<(String, String), VectorRecord>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|records| records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn score(query: &VectorQuery, record: &VectorRecord) -> Option<f64> {
        let vector_score = match (&query.embedding, &record.embedding) {
            (Some(a), Some(b)) if a.len() == b.len() => Some(cosine_similarity(a, b)),
            _ => None,
        };
        let keyword_score = query
            .text
            .as_deref()
            .map(|text| keyword_score(&record.content, text));

        match (vector_score, keyword_score) {
            (Some(v), Some(k)) => Some((1.0 - KEYWORD_WEIGHT) * v + KEYWORD_WEIGHT * k),
            (Some(v), None) => Some(v),
            (None, Some(k)) => Some(k),
            // An embedding query cannot score a record without one
            (None, None) if query.embedding.is_some() => None,
            (None, None) => Some(1.0),
        }
    }
}

fn lock_error() -> Error {
    Error::VectorStore("in-memory store lock poisoned".to_string())
}

/// Cosine similarity of two equal-length vectors; zero for zero vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Fraction of query tokens found in the content
fn keyword_score(content: &str, text: &str) -> f64 {
    let content = content.to_lowercase();
    let tokens: Vec<String> = text.split_whitespace().map(str::to_lowercase).collect();
    if tokens.is_empty() {
        return 0.0;
    }
    let matched = tokens.iter().filter(|t| content.contains(t.as_str())).count();
    matched as f64 / tokens.len() as f64
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, record: VectorRecord) -> Result<()> {
        let key = (record.namespace.clone(), record.id.clone());
        self.records.write().map_err(|_| lock_error())?.insert(key, record);
        Ok(())
    }

    async fn search(&self, query: &VectorQuery) -> Result<Vec<VectorSearchResult>> {
        let records = self.records.read().map_err(|_| lock_error())?;

        let mut results: Vec<VectorSearchResult> = records
            .values()
            .filter(|record| record.namespace == query.namespace)
            .filter(|record| query.filters.iter().all(|f| f.matches(&record.metadata)))
            .filter_map(|record| {
                let similarity = Self::score(query, record)?;
                if similarity <= 0.0 {
                    return None;
                }
                Some(VectorSearchResult {
                    id: record.id.clone(),
                    content: record.content.clone(),
                    metadata: record.metadata.clone(),
                    similarity,
                })
            })
            .collect();

        results.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        results.truncate(query.limit);
        Ok(results)
    }

    async fn delete(&self, namespace: &str, id: &str) -> Result<bool> {
        let mut records = self.records.write().map_err(|_| lock_error())?;
        Ok(records.remove(&(namespace.to_string(), id.to_string())).is_some())
    }

    async fn statistics(&self) -> Result<VectorStoreStatistics> {
        let records = self.records.read().map_err(|_| lock_error())?;

        let mut per_namespace: BTreeMap<String, usize> = BTreeMap::new();
        let mut dimension = None;
        for record in records.values() {
            *per_namespace.entry(record.namespace.clone()).or_default() += 1;
            if dimension.is_none() {
                dimension = record.embedding.as_ref().map(Vec::len);
            }
        }

        Ok(VectorStoreStatistics {
            total_records: records.len(),
            namespaces: per_namespace.keys().cloned().collect(),
            per_namespace,
            dimension,
        })
    }

    fn is_persistent(&self) -> bool {
        false
    }
}
