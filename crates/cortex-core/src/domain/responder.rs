//! Response generation collaborator
//!
//! Cortex supplies ranked context; turning it into prose is delegated to an
//! implementation of [`ResponseGenerator`], typically an LLM client.

use async_trait::async_trait;
use serde::Serialize;

use super::query::CortexResult;
use crate::Result;

#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn generate_contextual_response(
        &self,
        system_prompt: &str,
        user_query: &str,
        context: &[CortexResult],
        model: Option<&str>,
    ) -> Result<String>;
}

/// Generated text together with the results it was grounded on
#[derive(Debug, Clone, Serialize)]
pub struct ContextualAnswer {
    pub text: String,
    pub sources: Vec<CortexResult>,
}
