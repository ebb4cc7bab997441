//! Graph store access
//!
//! - `driver`: the seam a concrete store implements
//! - `neo4j`: Bolt driver backed by neo4rs
//! - `mock`: scripted driver for tests and offline runs
//! - `breaker`: circuit breaker shared by every query
//! - `connection`: the manager all other components query through
//! - `value`: driver values and their normalization into JSON rows

pub mod breaker;
pub mod connection;
pub mod driver;
pub mod mock;
pub mod neo4j;
pub mod value;

pub use breaker::{BreakerState, CircuitBreaker};
pub use connection::{ConnectionManager, Direction, NodeRelationship, QueryOptions};
pub use driver::{AccessMode, DriverError, GraphDriver, GraphSession, SessionConfig};
pub use mock::MockGraphDriver;
pub use neo4j::Neo4jDriver;
pub use value::{NodeValue, Params, Record, RelationshipValue, Row, ScalarValue, StoreValue};

use serde_json::Value;

/// Build query parameters from key/value pairs
pub fn params<const N: usize>(pairs: [(&str, Value); N]) -> Params {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}
