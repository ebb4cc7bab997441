#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Arc;

use cortex_core::config::Config;
use cortex_core::graph::{ConnectionManager, MockGraphDriver};
use cortex_core::vector::{VectorQuery, VectorRecord, VectorSearchResult, VectorStore, VectorStoreStatistics};
use cortex_core::{Error, Result};

pub fn manager(driver: &MockGraphDriver) -> Arc<ConnectionManager> {
    manager_with(driver, &Config::default())
}

pub fn manager_with(driver: &MockGraphDriver, config: &Config) -> Arc<ConnectionManager> {
    Arc::new(ConnectionManager::new(Arc::new(driver.clone()), config))
}

/// Vector store whose every call fails
pub struct UnavailableVectorStore;

#[async_trait]
impl VectorStore for UnavailableVectorStore {
    async fn upsert(&self, _record: VectorRecord) -> Result<()> {
        Err(Error::VectorStore("service unavailable".to_string()))
    }

    async fn search(&self, _query: &VectorQuery) -> Result<Vec<VectorSearchResult>> {
        Err(Error::VectorStore("service unavailable".to_string()))
    }

    async fn delete(&self, _namespace: &str, _id: &str) -> Result<bool> {
        Err(Error::VectorStore("service unavailable".to_string()))
    }

    async fn statistics(&self) -> Result<VectorStoreStatistics> {
        Err(Error::VectorStore("service unavailable".to_string()))
    }
}
