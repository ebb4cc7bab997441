//! Error types for Cortex

use thiserror::Error;

/// Result type alias using Cortex's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Cortex error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Graph store errors (E100-E199)
    #[error("Graph store unreachable: {0}. Run `cortex doctor` to check connectivity.")]
    ConnectionFailure(String),

    #[error("Graph store circuit OPEN - {retry_after_secs}s until retry")]
    CircuitOpen { retry_after_secs: u64 },

    #[error("Query failed: {0}")]
    QueryExecution(String),

    #[error("Query timed out after {0}ms")]
    QueryTimeout(u64),

    // Vector store errors (E200-E299)
    #[error("Vector store error: {0}")]
    VectorStore(String),

    // Ingestion errors (E300-E399)
    #[error("Ingestion completed partially: {0}")]
    PartialIngestion(String),

    // Generation errors (E400-E499)
    #[error("Response generation failed: {0}")]
    Generation(String),

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Input errors (E800-E899)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConnectionFailure(_) => "E100",
            Self::CircuitOpen { .. } => "E101",
            Self::QueryExecution(_) => "E102",
            Self::QueryTimeout(_) => "E103",
            Self::VectorStore(_) => "E200",
            Self::PartialIngestion(_) => "E300",
            Self::Generation(_) => "E400",
            Self::ConfigError(_) => "E600",
            Self::InvalidInput(_) => "E800",
            Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::ConnectionFailure(_) => Some("cortex config get graph.uri".to_string()),
            Self::CircuitOpen { retry_after_secs } => {
                Some(format!("Wait {}s, then run `cortex doctor`", retry_after_secs))
            }
            Self::QueryTimeout(_) => Some("cortex config set graph.query_timeout_ms 60000".to_string()),
            Self::ConfigError(_) => Some("cortex config list".to_string()),
            _ => None,
        }
    }

    /// Whether the error came from the graph store being unavailable
    /// rather than from the query itself.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::ConnectionFailure(_) | Self::CircuitOpen { .. })
    }
}
