//! Memory domain: ingestion, retrieval and pattern mining
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Write path                          │
//! │  Message → extractor → KnowledgeIngestionPipeline            │
//! │              ├─ graph: Message, SENT, IN_CHANNEL, MENTIONS,  │
//! │              │         Concept, RELATES_TO                   │
//! │              └─ vector: message record                       │
//! └──────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Read path                           │
//! │  CortexQuery → HybridRetrievalEngine                         │
//! │              ├─ chat / search / history: vector + graph      │
//! │              └─ pattern / insight: PatternMiningEngine       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Graph model
//!
//! - `(:Agent)-[:SENT]->(:Message)-[:IN_CHANNEL]->(:Channel)`, exactly one
//!   of each edge per message
//! - `(:Message)-[:MENTIONS]->(any node matched by name, path or id)`
//! - `(:Message)-[:RELATES_TO]->(:Concept {name, mention_count})`

pub mod extractor;
pub mod ingestion;
pub mod message;
pub mod patterns;
pub mod queries;
pub mod query;
pub mod relevance;
pub mod responder;
pub mod retrieval;

pub use extractor::{extract_concepts, extract_entities};
pub use ingestion::{ConceptLink, EntityLink, IngestionOutcome, IngestionSummary, KnowledgeIngestionPipeline};
pub use message::{Message, MessageKind};
pub use patterns::PatternMiningEngine;
pub use query::{Connection, CortexQuery, CortexResult, QueryContext, QueryKind, ResultKind, TimeRange};
pub use relevance::calculate_relevance;
pub use responder::{ContextualAnswer, ResponseGenerator};
pub use retrieval::HybridRetrievalEngine;
