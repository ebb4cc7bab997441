//! Scripted in-process graph driver
//!
//! Responses are registered against query substrings. The most recently
//! registered matching rule answers; unmatched queries return no records.
//! Every call is recorded along with session open/close counts.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::driver::{DriverError, GraphDriver, GraphSession, SessionConfig};
use super::value::{Params, Record};

type Responder = Arc<dyn Fn(&str, &Params) -> Result<Vec<Record>, DriverError> + Send + Sync>;

/// A query seen by the mock
#[derive(Debug, Clone)]
pub struct RecordedQuery {
    pub query: String,
    pub params: Params,
    pub config: SessionConfig,
}

#[derive(Default)]
struct MockState {
    rules: Mutex<Vec<(String, Responder)>>,
    connect_failure: Mutex<Option<DriverError>>,
    query_delay: Mutex<Option<Duration>>,
    calls: Mutex<Vec<RecordedQuery>>,
    connect_attempts: AtomicUsize,
    sessions_opened: AtomicUsize,
    sessions_closed: AtomicUsize,
    closes: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone, Default)]
pub struct MockGraphDriver {
    state: Arc<MockState>,
}

impl MockGraphDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer queries containing `pattern` with a closure
    pub fn on<F>(&self, pattern: impl Into<String>, responder: F) -> &Self
    where
        F: Fn(&str, &Params) -> Result<Vec<Record>, DriverError> + Send + Sync + 'static,
    {
        lock(&self.state.rules).push((pattern.into(), Arc::new(responder)));
        self
    }

    /// Answer queries containing `pattern` with fixed records
    pub fn respond(&self, pattern: impl Into<String>, records: Vec<Record>) -> &Self {
        self.on(pattern, move |_, _| Ok(records.clone()))
    }

    /// Fail queries containing `pattern`
    pub fn fail(&self, pattern: impl Into<String>, error: DriverError) -> &Self {
        self.on(pattern, move |_, _| Err(error.clone()))
    }

    /// Make connectivity checks fail until cleared with `None`
    pub fn set_connect_failure(&self, error: Option<DriverError>) {
        *lock(&self.state.connect_failure) = error;
    }

    /// Delay every query by `delay`
    pub fn set_query_delay(&self, delay: Option<Duration>) {
        *lock(&self.state.query_delay) = delay;
    }

    pub fn calls(&self) -> Vec<RecordedQuery> {
        lock(&self.state.calls).clone()
    }

    pub fn query_count(&self) -> usize {
        lock(&self.state.calls).len()
    }

    pub fn calls_matching(&self, pattern: &str) -> Vec<RecordedQuery> {
        lock(&self.state.calls)
            .iter()
            .filter(|call| call.query.contains(pattern))
            .cloned()
            .collect()
    }

    pub fn connect_attempts(&self) -> usize {
        self.state.connect_attempts.load(Ordering::SeqCst)
    }

    pub fn sessions_opened(&self) -> usize {
        self.state.sessions_opened.load(Ordering::SeqCst)
    }

    pub fn sessions_closed(&self) -> usize {
        self.state.sessions_closed.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GraphDriver for MockGraphDriver {
    async fn verify_connectivity(&self) -> Result<(), DriverError> {
        self.state.connect_attempts.fetch_add(1, Ordering::SeqCst);
        match lock(&self.state.connect_failure).clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn session(&self, config: SessionConfig) -> Result<Box<dyn GraphSession>, DriverError> {
        self.state.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSession {
            state: Arc::clone(&self.state),
            config,
        }))
    }

    async fn close(&self) {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
    }
}

struct MockSession {
    state: Arc<MockState>,
    config: SessionConfig,
}

#[async_trait]
impl GraphSession for MockSession {
    async fn run(&mut self, query: &str, params: &Params) -> Result<Vec<Record>, DriverError> {
        lock(&self.state.calls).push(RecordedQuery {
            query: query.to_string(),
            params: params.clone(),
            config: self.config.clone(),
        });

        let delay = *lock(&self.state.query_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let responder = lock(&self.state.rules)
            .iter()
            .rev()
            .find(|(pattern, _)| query.contains(pattern.as_str()))
            .map(|(_, responder)| Arc::clone(responder));

        match responder {
            Some(responder) => responder(query, params),
            None => Ok(Vec::new()),
        }
    }

    async fn close(self: Box<Self>) {
        self.state.sessions_closed.fetch_add(1, Ordering::SeqCst);
    }
}
