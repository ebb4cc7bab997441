//! Message ingestion into the graph and vector stores
//!
//! The message write is the only step whose failure reaches the caller.
//! Entity links, concept links and the vector upsert are best-effort: each
//! produces its own `Result`, and those are aggregated into the returned
//! [`IngestionOutcome`].

use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::extractor::{extract_concepts, extract_entities};
use super::message::Message;
use super::queries;
use crate::config::VectorConfig;
use crate::error::{Error, Result};
use crate::graph::{ConnectionManager, Row, params};
use crate::vector::{VectorRecord, VectorStore};

/// Result of linking one extracted entity to an existing node
#[derive(Debug)]
pub struct EntityLink {
    pub entity: String,
    /// `Ok(None)` when no node matched
    pub result: Result<Option<String>>,
}

#[derive(Debug)]
pub struct ConceptLink {
    pub concept: String,
    pub result: Result<()>,
}

#[derive(Debug)]
pub struct IngestionOutcome {
    pub message_id: String,
    pub entities: Vec<String>,
    pub concepts: Vec<String>,
    pub entity_links: Vec<EntityLink>,
    pub concept_links: Vec<ConceptLink>,
    pub vector: Result<()>,
}

/// Serializable view of an outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionSummary {
    pub message_id: String,
    pub entities: Vec<String>,
    pub concepts: Vec<String>,
    pub linked_nodes: Vec<String>,
    pub vector_stored: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<String>,
}

impl IngestionOutcome {
    /// Names of the nodes the message now MENTIONS
    pub fn linked_nodes(&self) -> Vec<String> {
        self.entity_links
            .iter()
            .filter_map(|link| link.result.as_ref().ok().cloned().flatten())
            .collect()
    }

    pub fn vector_stored(&self) -> bool {
        self.vector.is_ok()
    }

    /// One line per failed branch
    pub fn partial_failures(&self) -> Vec<String> {
        let entities = self.entity_links.iter().filter_map(|link| {
            link.result
                .as_ref()
                .err()
                .map(|e| format!("entity '{}': {}", link.entity, e))
        });
        let concepts = self.concept_links.iter().filter_map(|link| {
            link.result
                .as_ref()
                .err()
                .map(|e| format!("concept '{}': {}", link.concept, e))
        });
        let vector = self.vector.as_ref().err().map(|e| format!("vector upsert: {}", e));

        entities.chain(concepts).chain(vector).collect()
    }

    pub fn is_complete(&self) -> bool {
        self.partial_failures().is_empty()
    }

    pub fn summary(&self) -> IngestionSummary {
        IngestionSummary {
            message_id: self.message_id.clone(),
            entities: self.entities.clone(),
            concepts: self.concepts.clone(),
            linked_nodes: self.linked_nodes(),
            vector_stored: self.vector_stored(),
            failures: self.partial_failures(),
        }
    }

    /// Treat any failed branch as an error
    pub fn ensure_complete(self) -> Result<IngestionSummary> {
        let failures = self.partial_failures();
        if failures.is_empty() {
            Ok(self.summary())
        } else {
            Err(Error::PartialIngestion(failures.join("; ")))
        }
    }
}

/// Author and channel as held by the graph after the message write
struct StoredMessage {
    author: String,
    channel: String,
}

impl StoredMessage {
    fn from_rows(rows: &[Row], message: &Message) -> Self {
        let column = |name: &str, fallback: &str| {
            rows.first()
                .and_then(|row| row.get(name))
                .and_then(Value::as_str)
                .unwrap_or(fallback)
                .to_string()
        };
        Self {
            author: column("from_agent", &message.author),
            channel: column("channel", &message.channel),
        }
    }
}

pub struct KnowledgeIngestionPipeline {
    connection: Arc<ConnectionManager>,
    vectors: Arc<dyn VectorStore>,
    namespace: String,
}

impl KnowledgeIngestionPipeline {
    pub fn new(connection: Arc<ConnectionManager>, vectors: Arc<dyn VectorStore>, config: &VectorConfig) -> Self {
        Self {
            connection,
            vectors,
            namespace: config.message_namespace.clone(),
        }
    }

    /// Ingest one message. Fails only when the message itself cannot be
    /// written.
    pub async fn process_message(&self, message: &Message) -> Result<IngestionOutcome> {
        let entities = extract_entities(&message.body);
        let concepts = extract_concepts(&message.body);

        info!(
            message_id = %message.id,
            author = %message.author,
            channel = %message.channel,
            entities = entities.len(),
            concepts = concepts.len(),
            "Ingesting message"
        );

        let rows = self
            .connection
            .write_query(
                queries::MERGE_MESSAGE,
                params([
                    ("id", json!(message.id)),
                    ("from", json!(message.author)),
                    ("channel", json!(message.channel)),
                    ("body", json!(message.body)),
                    ("timestamp", json!(message.timestamp_rfc3339())),
                    ("kind", json!(message.kind.as_str())),
                ]),
            )
            .await?;

        let stored = StoredMessage::from_rows(&rows, message);
        if stored.author != message.author || stored.channel != message.channel {
            warn!(
                message_id = %message.id,
                stored_author = %stored.author,
                stored_channel = %stored.channel,
                "Message already stored with different author or channel, keeping stored values"
            );
        }

        let mut entity_links = Vec::with_capacity(entities.len());
        for entity in &entities {
            let result = self.link_entity(&message.id, entity).await;
            match &result {
                Ok(Some(node)) => debug!(entity = %entity, node = %node, "Linked entity"),
                Ok(None) => debug!(entity = %entity, "No node matches entity"),
                Err(e) => warn!(entity = %entity, error = %e, "Failed to link entity"),
            }
            entity_links.push(EntityLink {
                entity: entity.clone(),
                result,
            });
        }

        let mut concept_links = Vec::with_capacity(concepts.len());
        for concept in &concepts {
            let result = self.link_concept(&message.id, concept).await;
            if let Err(e) = &result {
                warn!(concept = %concept, error = %e, "Failed to link concept");
            }
            concept_links.push(ConceptLink {
                concept: concept.clone(),
                result,
            });
        }

        let vector = self.store_vector(message, &stored, &entities, &concepts).await;
        if let Err(e) = &vector {
            warn!(message_id = %message.id, error = %e, "Vector upsert failed, continuing graph-only");
        }

        let outcome = IngestionOutcome {
            message_id: message.id.clone(),
            entities,
            concepts,
            entity_links,
            concept_links,
            vector,
        };

        info!(
            message_id = %outcome.message_id,
            linked = outcome.linked_nodes().len(),
            vector_stored = outcome.vector_stored(),
            "Message ingested"
        );

        Ok(outcome)
    }

    /// Ingest a batch, skipping messages that fail
    pub async fn process_messages(&self, messages: &[Message]) -> Vec<IngestionOutcome> {
        let mut outcomes = Vec::with_capacity(messages.len());
        for message in messages {
            match self.process_message(message).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => warn!(message_id = %message.id, error = %e, "Failed to ingest message"),
            }
        }
        outcomes
    }

    async fn link_entity(&self, message_id: &str, entity: &str) -> Result<Option<String>> {
        let rows = self
            .connection
            .write_query(
                queries::LINK_ENTITY,
                params([("messageId", json!(message_id)), ("entity", json!(entity))]),
            )
            .await?;

        Ok(rows
            .first()
            .and_then(|row| row.get("linked"))
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    async fn link_concept(&self, message_id: &str, concept: &str) -> Result<()> {
        self.connection
            .write_query(
                queries::LINK_CONCEPT,
                params([
                    ("messageId", json!(message_id)),
                    ("concept", json!(concept)),
                    ("now", json!(chrono::Utc::now().to_rfc3339())),
                ]),
            )
            .await?;
        Ok(())
    }

    async fn store_vector(
        &self,
        message: &Message,
        stored: &StoredMessage,
        entities: &[String],
        concepts: &[String],
    ) -> Result<()> {
        let record = VectorRecord::new(&self.namespace, &message.id, &message.body)
            .with_metadata("type", "message")
            .with_metadata("kind", message.kind.as_str())
            .with_metadata("from", stored.author.as_str())
            .with_metadata("channel", stored.channel.as_str())
            .with_metadata("timestamp", message.timestamp_rfc3339())
            .with_metadata("entities", json!(entities))
            .with_metadata("concepts", json!(concepts));

        self.vectors.upsert(record).await
    }
}
