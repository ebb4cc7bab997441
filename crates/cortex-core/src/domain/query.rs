//! Query intents and ranked results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    #[default]
    Chat,
    Search,
    Pattern,
    Insight,
    History,
}

impl std::str::FromStr for QueryKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chat" => Ok(Self::Chat),
            "search" => Ok(Self::Search),
            "pattern" => Ok(Self::Pattern),
            "insight" => Ok(Self::Insight),
            "history" => Ok(Self::History),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown query kind '{}', expected chat, search, pattern, insight or history",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Optional narrowing for a query.
///
/// `node_types` selects the labels searched by the graph branch of hybrid
/// search. The other fields travel with the query for collaborators such as
/// response generators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_range: Option<TimeRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_types: Option<Vec<String>>,
}

impl QueryContext {
    pub fn with_node_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.node_types = Some(types.into_iter().map(Into::into).collect());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CortexQuery {
    #[serde(rename = "type", default)]
    pub kind: QueryKind,
    #[serde(rename = "query")]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<QueryContext>,
}

impl CortexQuery {
    pub fn new(kind: QueryKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            context: None,
        }
    }

    pub fn chat(text: impl Into<String>) -> Self {
        Self::new(QueryKind::Chat, text)
    }

    pub fn with_context(mut self, context: QueryContext) -> Self {
        self.context = Some(context);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    Message,
    Node,
    Pattern,
    Insight,
}

/// A one-hop neighbour of a graph hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    #[serde(rename = "type")]
    pub rel_type: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CortexResult {
    #[serde(rename = "type")]
    pub kind: ResultKind,
    pub data: Value,
    /// In `[0, 1]`
    pub relevance: f64,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connections: Option<Vec<Connection>>,
}

impl CortexResult {
    pub fn new(kind: ResultKind, data: Value, relevance: f64, source: impl Into<String>) -> Self {
        Self {
            kind,
            data,
            relevance: relevance.clamp(0.0, 1.0),
            source: source.into(),
            connections: None,
        }
    }

    pub fn with_connections(mut self, connections: Vec<Connection>) -> Self {
        self.connections = Some(connections);
        self
    }

    /// `data.name`, falling back to `data.title`
    pub fn display_name(&self) -> Option<&str> {
        self.data
            .get("name")
            .or_else(|| self.data.get("title"))
            .and_then(Value::as_str)
    }
}

/// Sort by relevance, highest first, keeping the order of ties
pub fn sort_by_relevance(results: &mut [CortexResult]) {
    results.sort_by(|a, b| {
        b.relevance
            .partial_cmp(&a.relevance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
