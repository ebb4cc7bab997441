//! Aggregate pattern and insight mining over the message graph
//!
//! Queries run one after another. A failure in any of them discards the
//! whole batch: callers get every populated result set or nothing.

use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, warn};

use super::queries;
use super::query::{CortexResult, QueryContext, ResultKind};
use crate::error::Result;
use crate::graph::{ConnectionManager, Params, Row, params};

const DECISION_PREVIEW_CHARS: usize = 100;

pub struct PatternMiningEngine {
    connection: Arc<ConnectionManager>,
}

impl PatternMiningEngine {
    pub fn new(connection: Arc<ConnectionManager>) -> Self {
        Self { connection }
    }

    /// Co-occurrence, collaboration and decision patterns
    pub async fn find_patterns(&self, text: &str, _context: Option<&QueryContext>) -> Vec<CortexResult> {
        debug!(query = %text, "Mining patterns");
        match self.try_find_patterns().await {
            Ok(results) => results,
            Err(e) => {
                warn!(error = %e, "Pattern mining failed");
                Vec::new()
            }
        }
    }

    /// Hottest topics, knowledge gaps and cross-cutting concerns
    pub async fn generate_insights(&self, text: &str, _context: Option<&QueryContext>) -> Vec<CortexResult> {
        debug!(query = %text, "Generating insights");
        match self.try_generate_insights().await {
            Ok(results) => results,
            Err(e) => {
                warn!(error = %e, "Insight generation failed");
                Vec::new()
            }
        }
    }

    async fn try_find_patterns(&self) -> Result<Vec<CortexResult>> {
        let mut results = Vec::new();

        let rows = self.connection.read_query(queries::CONCEPT_COOCCURRENCE, Params::new()).await?;
        if !rows.is_empty() {
            let entries: Vec<(String, i64)> = rows
                .iter()
                .map(|row| {
                    (
                        format!("{} ↔ {}", text_field(row, "concept1"), text_field(row, "concept2")),
                        count_field(row, "cooccurrences"),
                    )
                })
                .collect();
            let items = entries.iter().map(|(pair, n)| json!(format!("{} ({}x)", pair, n))).collect();
            results.push(pattern(
                "Concept Relationships",
                "Concepts that are frequently discussed together",
                items,
                &entries,
                0.9,
            ));
        }

        let rows = self.connection.read_query(queries::AGENT_COLLABORATION, Params::new()).await?;
        if !rows.is_empty() {
            let entries: Vec<(String, i64)> = rows
                .iter()
                .map(|row| {
                    (
                        format!("{} ↔ {}", text_field(row, "agent1"), text_field(row, "agent2")),
                        count_field(row, "interactions"),
                    )
                })
                .collect();
            let items = entries
                .iter()
                .map(|(pair, n)| json!(format!("{} ({} interactions)", pair, n)))
                .collect();
            results.push(pattern(
                "Agent Collaboration",
                "Agents working in the same channel within 30 minutes",
                items,
                &entries,
                0.85,
            ));
        }

        let rows = self
            .connection
            .read_query(queries::DECISIONS, params([("keywords", json!(queries::DECISION_KEYWORDS))]))
            .await?;
        if !rows.is_empty() {
            let items = rows
                .iter()
                .map(|row| {
                    json!({
                        "decision": preview(&text_field(row, "decision")),
                        "by": text_field(row, "decided_by"),
                        "when": text_field(row, "decided_at"),
                        "affected": row.get("affected").cloned().unwrap_or_else(|| json!([])),
                    })
                })
                .collect();
            results.push(CortexResult::new(
                ResultKind::Pattern,
                json!({
                    "title": "Recent Decisions",
                    "description": "Messages recording decisions and the entities they affect",
                    "items": Value::Array(items),
                }),
                0.95,
                "pattern_analysis",
            ));
        }

        Ok(results)
    }

    async fn try_generate_insights(&self) -> Result<Vec<CortexResult>> {
        let mut results = Vec::new();

        let rows = self.connection.read_query(queries::HOTTEST_TOPICS, Params::new()).await?;
        if !rows.is_empty() {
            let entries: Vec<(String, i64)> = rows
                .iter()
                .map(|row| (text_field(row, "concept"), count_field(row, "mentions")))
                .collect();
            let items = entries
                .iter()
                .map(|(concept, n)| json!(format!("{}: {} mentions", concept, n)))
                .collect();
            results.push(insight(
                "Hottest Topics",
                "Most mentioned concepts",
                items,
                &entries,
                0.9,
            ));
        }

        let rows = self.connection.read_query(queries::KNOWLEDGE_GAPS, Params::new()).await?;
        if !rows.is_empty() {
            let entries: Vec<(String, i64)> = rows
                .iter()
                .map(|row| (text_field(row, "entity"), count_field(row, "mentions")))
                .collect();
            let items = entries
                .iter()
                .map(|(entity, n)| json!(format!("{}: {} mentions, undocumented", entity, n)))
                .collect();
            results.push(insight(
                "Knowledge Gaps",
                "Frequently mentioned entities without documentation",
                items,
                &entries,
                0.8,
            ));
        }

        let rows = self.connection.read_query(queries::CROSS_CUTTING, Params::new()).await?;
        if !rows.is_empty() {
            let entries: Vec<(String, i64)> = rows
                .iter()
                .map(|row| (text_field(row, "concept"), count_field(row, "channels")))
                .collect();
            let items = entries
                .iter()
                .map(|(concept, n)| json!(format!("{}: {} channels", concept, n)))
                .collect();
            results.push(insight(
                "Cross-Cutting Concerns",
                "Concepts discussed across several channels",
                items,
                &entries,
                0.85,
            ));
        }

        Ok(results)
    }
}

fn pattern(title: &str, description: &str, items: Vec<Value>, entries: &[(String, i64)], relevance: f64) -> CortexResult {
    aggregate(ResultKind::Pattern, "pattern_analysis", title, description, items, entries, relevance)
}

fn insight(title: &str, description: &str, items: Vec<Value>, entries: &[(String, i64)], relevance: f64) -> CortexResult {
    aggregate(ResultKind::Insight, "insight_engine", title, description, items, entries, relevance)
}

fn aggregate(
    kind: ResultKind,
    source: &str,
    title: &str,
    description: &str,
    items: Vec<Value>,
    entries: &[(String, i64)],
    relevance: f64,
) -> CortexResult {
    let entries: Vec<Value> = entries
        .iter()
        .map(|(name, count)| json!({"name": name, "count": count}))
        .collect();
    CortexResult::new(
        kind,
        json!({
            "title": title,
            "description": description,
            "items": items,
            "entries": entries,
        }),
        relevance,
        source,
    )
}

fn text_field(row: &Row, key: &str) -> String {
    match row.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn count_field(row: &Row, key: &str) -> i64 {
    row.get(key)
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
        .unwrap_or(0)
}

fn preview(body: &str) -> String {
    if body.chars().count() <= DECISION_PREVIEW_CHARS {
        return body.to_string();
    }
    let head: String = body.chars().take(DECISION_PREVIEW_CHARS).collect();
    format!("{}...", head)
}
