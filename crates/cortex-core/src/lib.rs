//! Cortex Core Library
//!
//! Contextual memory for conversational agents, backed by a labeled-property
//! graph and a vector-similarity store:
//! - Graph access (circuit-broken connection manager, Bolt driver, mock driver)
//! - Message ingestion (entity and concept extraction, graph links, vector records)
//! - Hybrid retrieval (semantic + graph search, deduplicated and ranked)
//! - Pattern mining (co-occurrence, collaboration, decisions, insights)
//! - Health snapshots and diagnostics

pub mod bootstrap;
pub mod config;
pub mod domain;
pub mod error;
pub mod graph;
pub mod health;
pub mod vector;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::bootstrap::Cortex;
    pub use crate::config::Config;
    pub use crate::domain::{CortexQuery, CortexResult, Message, QueryContext, QueryKind};
    pub use crate::error::{Error, Result};
    pub use crate::graph::ConnectionManager;
    pub use crate::vector::VectorStore;
}
