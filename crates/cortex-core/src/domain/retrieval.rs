//! Hybrid retrieval over the vector and graph stores
//!
//! Every external call is isolated: a failing branch contributes nothing and
//! is logged, the other branches still answer. Query methods never fail.

use serde_json::{Map, Value, json};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use super::patterns::PatternMiningEngine;
use super::queries;
use super::query::{Connection, CortexQuery, CortexResult, QueryContext, QueryKind, ResultKind, sort_by_relevance};
use super::relevance::calculate_relevance;
use super::responder::{ContextualAnswer, ResponseGenerator};
use crate::config::{Config, RetrievalConfig, VectorConfig};
use crate::error::{Error, Result};
use crate::graph::{ConnectionManager, Row, params};
use crate::vector::{VectorQuery, VectorSearchResult, VectorStore};

pub struct HybridRetrievalEngine {
    connection: Arc<ConnectionManager>,
    vectors: Arc<dyn VectorStore>,
    patterns: Arc<PatternMiningEngine>,
    vector_config: VectorConfig,
    retrieval: RetrievalConfig,
}

impl HybridRetrievalEngine {
    pub fn new(
        connection: Arc<ConnectionManager>,
        vectors: Arc<dyn VectorStore>,
        patterns: Arc<PatternMiningEngine>,
        config: &Config,
    ) -> Self {
        Self {
            connection,
            vectors,
            patterns,
            vector_config: config.vector.clone(),
            retrieval: config.retrieval.clone(),
        }
    }

    /// Answer a query according to its kind
    pub async fn query(&self, query: &CortexQuery) -> Vec<CortexResult> {
        let context = query.context.as_ref();
        debug!(kind = ?query.kind, query = %query.text, "Cortex query");

        match query.kind {
            QueryKind::Search => self.hybrid_search(&query.text, context).await,
            QueryKind::Pattern => self.patterns.find_patterns(&query.text, context).await,
            QueryKind::Insight => self.patterns.generate_insights(&query.text, context).await,
            QueryKind::History => self.decision_history(&query.text).await,
            QueryKind::Chat => {
                let mut results = self.search_messages(&query.text).await;
                results.extend(self.hybrid_search(&query.text, context).await);
                sort_by_relevance(&mut results);
                results
            }
        }
    }

    /// Run `query` and hand the results to a generator as context
    pub async fn answer(
        &self,
        generator: &dyn ResponseGenerator,
        system_prompt: &str,
        query: &CortexQuery,
        model: Option<&str>,
    ) -> Result<ContextualAnswer> {
        let sources = self.query(query).await;
        let text = generator
            .generate_contextual_response(system_prompt, &query.text, &sources, model)
            .await?;
        if text.trim().is_empty() {
            return Err(Error::Generation(format!(
                "generator returned no text for {} context results",
                sources.len()
            )));
        }
        Ok(ContextualAnswer { text, sources })
    }

    // ========== Messages ==========

    /// Semantic message search, topped up with substring matches from the
    /// graph when too few semantic hits come back
    pub async fn search_messages(&self, text: &str) -> Vec<CortexResult> {
        let mut results = Vec::new();
        let mut seen_ids = HashSet::new();

        let vector_query = VectorQuery::text(
            &self.vector_config.message_namespace,
            text,
            self.vector_config.search_limit,
        );
        match self.vectors.search(&vector_query).await {
            Ok(hits) => {
                for hit in hits {
                    if !seen_ids.insert(hit.id.clone()) {
                        continue;
                    }
                    results.push(message_from_vector(hit));
                }
            }
            Err(e) => warn!(error = %e, "Semantic message search failed"),
        }

        if results.len() >= self.retrieval.min_vector_hits {
            return results;
        }

        let rows = self
            .connection
            .read_query(
                queries::SEARCH_MESSAGES,
                params([("query", json!(text)), ("limit", json!(self.retrieval.message_limit))]),
            )
            .await;
        match rows {
            Ok(rows) => {
                for row in rows {
                    let Some(id) = row.get("id").and_then(Value::as_str).map(str::to_string) else {
                        continue;
                    };
                    if !seen_ids.insert(id) {
                        continue;
                    }
                    let body = row.get("body").and_then(Value::as_str).unwrap_or_default();
                    let relevance = calculate_relevance(text, body);
                    results.push(CortexResult::new(ResultKind::Message, Value::Object(row), relevance, "messages"));
                }
            }
            Err(e) => warn!(error = %e, "Graph message search failed"),
        }

        results
    }

    // ========== Hybrid ==========

    /// Vector and graph search merged by display name. Vector entries win
    /// on collision.
    pub async fn hybrid_search(&self, text: &str, context: Option<&QueryContext>) -> Vec<CortexResult> {
        let mut results = Vec::new();
        let mut seen_names = HashSet::new();

        let vector_query = VectorQuery::text(
            &self.vector_config.knowledge_namespace,
            text,
            self.vector_config.search_limit,
        );
        match self.vectors.search(&vector_query).await {
            Ok(hits) => {
                for hit in hits {
                    let result = node_from_vector(hit);
                    if let Some(name) = result.display_name() {
                        if !seen_names.insert(name.to_string()) {
                            continue;
                        }
                    }
                    results.push(result);
                }
            }
            Err(e) => warn!(error = %e, "Vector search failed, continuing with graph results"),
        }

        let labels = context
            .and_then(|c| c.node_types.clone())
            .filter(|types| !types.is_empty())
            .unwrap_or_else(|| self.retrieval.node_labels.clone());

        let rows = self
            .connection
            .read_query(
                queries::SEARCH_GRAPH,
                params([
                    ("query", json!(text)),
                    ("nodeTypes", json!(labels)),
                    ("limit", json!(self.retrieval.graph_limit)),
                ]),
            )
            .await;
        match rows {
            Ok(rows) => {
                for row in rows {
                    let Some(result) = node_from_graph(text, row) else {
                        continue;
                    };
                    if let Some(name) = result.display_name() {
                        if !seen_names.insert(name.to_string()) {
                            continue;
                        }
                    }
                    results.push(result);
                }
            }
            Err(e) => warn!(error = %e, "Graph search failed"),
        }

        sort_by_relevance(&mut results);
        results
    }

    // ========== History ==========

    /// Recent decision-like messages mentioning the query
    pub async fn decision_history(&self, text: &str) -> Vec<CortexResult> {
        let rows = self
            .connection
            .read_query(
                queries::DECISION_HISTORY,
                params([
                    ("keywords", json!(queries::HISTORY_KEYWORDS)),
                    ("query", json!(text)),
                    ("limit", json!(self.retrieval.history_limit)),
                ]),
            )
            .await;

        match rows {
            Ok(rows) => rows
                .into_iter()
                .map(|row| CortexResult::new(ResultKind::Message, Value::Object(row), 1.0, "history"))
                .collect(),
            Err(e) => {
                warn!(error = %e, "Decision history lookup failed");
                Vec::new()
            }
        }
    }
}

fn message_from_vector(hit: VectorSearchResult) -> CortexResult {
    let field = |key: &str| hit.metadata.get(key).cloned().unwrap_or(Value::Null);
    let data = json!({
        "id": hit.id,
        "body": hit.content,
        "from": field("from"),
        "channel": field("channel"),
        "timestamp": field("timestamp"),
    });
    CortexResult::new(ResultKind::Message, data, hit.similarity, "semantic_messages")
}

fn node_from_vector(hit: VectorSearchResult) -> CortexResult {
    let name = hit
        .metadata
        .get("title")
        .or_else(|| hit.metadata.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| hit.id.clone());

    let data = json!({
        "id": hit.id,
        "name": name,
        "content": hit.content,
        "metadata": Value::Object(hit.metadata),
    });
    CortexResult::new(ResultKind::Node, data, hit.similarity, "semantic_search")
}

fn node_from_graph(text: &str, mut row: Row) -> Option<CortexResult> {
    let node = match row.remove("n")? {
        Value::Object(node) => node,
        _ => return None,
    };
    let name = node_name(&node)?;
    let labels = row.remove("types").unwrap_or_else(|| json!([]));

    let connections: Vec<Connection> = match row.remove("connections") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| {
                let target = item.get("target").and_then(Value::as_str)?;
                let rel_type = item.get("type").and_then(Value::as_str).unwrap_or_default();
                Some(Connection {
                    rel_type: rel_type.to_string(),
                    target: target.to_string(),
                })
            })
            .collect(),
        _ => Vec::new(),
    };

    let relevance = calculate_relevance(text, &name);
    let data = json!({
        "name": name,
        "labels": labels,
        "properties": Value::Object(node),
    });
    Some(CortexResult::new(ResultKind::Node, data, relevance, "knowledge_graph").with_connections(connections))
}

fn node_name(node: &Map<String, Value>) -> Option<String> {
    match node.get("name").or_else(|| node.get("id"))? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_from_graph_drops_empty_connections() {
        let mut row = Row::new();
        row.insert(
            "n".to_string(),
            json!({"id": "4:x:1", "labels": ["Service"], "name": "AuthService"}),
        );
        row.insert("types".to_string(), json!(["Service"]));
        row.insert(
            "connections".to_string(),
            json!([{"type": "MENTIONS", "target": "auth.ts"}, {"type": null, "target": null}]),
        );

        let result = node_from_graph("auth", row).expect("result");
        assert_eq!(result.display_name(), Some("AuthService"));
        assert_eq!(result.relevance, 1.0);
        assert_eq!(result.source, "knowledge_graph");
        let connections = result.connections.expect("connections");
        assert_eq!(connections.len(), 1);
        assert_eq!(connections[0].target, "auth.ts");
    }

    #[test]
    fn test_vector_display_name_prefers_title() {
        let mut metadata = Map::new();
        metadata.insert("title".to_string(), json!("Graph Guide"));
        metadata.insert("name".to_string(), json!("guide"));
        let hit = VectorSearchResult {
            id: "doc-1".to_string(),
            content: "...".to_string(),
            metadata,
            similarity: 0.8,
        };
        assert_eq!(node_from_vector(hit).display_name(), Some("Graph Guide"));
    }
}
