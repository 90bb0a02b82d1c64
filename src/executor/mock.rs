//! Scripted executor for tests and examples.
//!
//! Responses are queued up front and consumed in order; every statement is
//! recorded with its parameters as JSON. An empty queue answers queries
//! with no rows and statements with zero affected rows.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use sea_query::Values;
use serde_json::Value;

use crate::executor::{ExecuteResult, ExecutorError, QueryExecutor};
use crate::value::{values_to_json, Row};

/// A queued answer
#[derive(Debug, Clone, PartialEq)]
pub enum MockResponse {
    Rows(Vec<Row>),
    Execute(ExecuteResult),
    /// Fail with `ExecutorError::Query`
    Error(String),
}

/// A statement received by the mock
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedStatement {
    pub sql: String,
    pub values: Vec<Value>,
}

#[derive(Debug, Default)]
pub struct MockExecutor {
    responses: Mutex<VecDeque<MockResponse>>,
    statements: Mutex<Vec<RecordedStatement>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, response: MockResponse) -> &Self {
        lock(&self.responses).push_back(response);
        self
    }

    pub fn push_rows(&self, rows: Vec<Row>) -> &Self {
        self.push(MockResponse::Rows(rows))
    }

    pub fn push_execute(&self, result: ExecuteResult) -> &Self {
        self.push(MockResponse::Execute(result))
    }

    pub fn push_error(&self, message: impl Into<String>) -> &Self {
        self.push(MockResponse::Error(message.into()))
    }

    /// Statements received so far, oldest first
    pub fn statements(&self) -> Vec<RecordedStatement> {
        lock(&self.statements).clone()
    }

    /// Responses not consumed yet
    pub fn pending(&self) -> usize {
        lock(&self.responses).len()
    }

    fn next(&self, sql: &str, values: &Values) -> Option<MockResponse> {
        log::trace!("mock executor received: {sql}");
        lock(&self.statements).push(RecordedStatement {
            sql: sql.to_string(),
            values: values_to_json(values),
        });
        lock(&self.responses).pop_front()
    }
}

impl QueryExecutor for MockExecutor {
    fn query(&self, sql: &str, values: &Values) -> Result<Vec<Row>, ExecutorError> {
        match self.next(sql, values) {
            Some(MockResponse::Rows(rows)) => Ok(rows),
            Some(MockResponse::Execute(_)) | None => Ok(Vec::new()),
            Some(MockResponse::Error(message)) => Err(ExecutorError::Query(message)),
        }
    }

    fn execute(&self, sql: &str, values: &Values) -> Result<ExecuteResult, ExecutorError> {
        match self.next(sql, values) {
            Some(MockResponse::Execute(result)) => Ok(result),
            Some(MockResponse::Rows(rows)) => Ok(ExecuteResult {
                affected_rows: rows.len() as u64,
                insert_id: None,
            }),
            None => Ok(ExecuteResult::default()),
            Some(MockResponse::Error(message)) => Err(ExecutorError::Query(message)),
        }
    }
}
