//! Driver seam between the connection layer and a concrete graph store

use async_trait::async_trait;
use thiserror::Error;

use super::value::{Params, Record};

/// Session access mode, used by routing drivers to pick a cluster member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
}

/// Settings for one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub database: String,
    pub access_mode: AccessMode,
}

/// Errors raised by a driver implementation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// The store could not be reached or the connection dropped
    #[error("connection failed: {0}")]
    Connection(String),

    /// The store rejected or failed the query
    #[error("{0}")]
    Query(String),
}

impl DriverError {
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

/// A graph store driver owning a connection pool
#[async_trait]
pub trait GraphDriver: Send + Sync {
    /// Establish or re-check connectivity with the store
    async fn verify_connectivity(&self) -> Result<(), DriverError>;

    /// Acquire a session from the pool
    async fn session(&self, config: SessionConfig) -> Result<Box<dyn GraphSession>, DriverError>;

    /// Close the pool
    async fn close(&self);
}

/// A pooled session. Callers must close it exactly once.
#[async_trait]
pub trait GraphSession: Send {
    async fn run(&mut self, query: &str, params: &Params) -> Result<Vec<Record>, DriverError>;

    async fn close(self: Box<Self>);
}
