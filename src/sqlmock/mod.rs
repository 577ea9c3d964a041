//! In-memory fake database with scripted expectations
//!
//! [`MockDb::new`] returns the fake handle and a [`Sqlmock`] recorder that
//! share state. The test scripts calls on the recorder, hands the handle to
//! the code under test, then checks [`Sqlmock::expectations_were_met`].
//!
//! ```ignore
//! let (db, mock) = MockDb::new();
//! mock.expect_exec("DROP TABLE foo")
//!     .will_return_result(ExecResult::new(0, 0));
//! ```

mod expectations;

pub use expectations::QueryMatcher;

use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use crate::dbconn::{DbError, ExecResult, Rows, Session};
use expectations::{CallKind, Expectation, Response, collapse_whitespace, describe_call};

/// Mismatches between scripted expectations and actual calls
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MockError {
    #[error("call to {call} was not expected, next expectation is: {next}")]
    Unexpected { call: String, next: String },

    #[error("call to {0} was not expected, all expectations were already fulfilled")]
    Exhausted(String),

    #[error("query '{query}' does not match expected '{expected}'")]
    QueryMismatch { query: String, expected: String },

    #[error("invalid expectation pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("expectation {0} has no result or error to return")]
    MissingResponse(String),

    #[error("there are unfulfilled expectations: {0}")]
    Unfulfilled(String),
}

#[derive(Debug)]
struct MockState {
    expectations: Vec<Expectation>,
    ordered: bool,
    matcher: QueryMatcher,
}

type SharedState = Arc<Mutex<MockState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// Fake database handle; every clone talks to the same recorder
#[derive(Debug, Clone)]
pub struct MockDb {
    state: SharedState,
}

impl MockDb {
    /// Create a handle and its recorder, matching SQL as regular expressions
    pub fn new() -> (MockDb, Sqlmock) {
        Self::with_matcher(QueryMatcher::default())
    }

    pub fn with_matcher(matcher: QueryMatcher) -> (MockDb, Sqlmock) {
        let state = Arc::new(Mutex::new(MockState {
            expectations: Vec::new(),
            ordered: true,
            matcher,
        }));
        (
            MockDb {
                state: Arc::clone(&state),
            },
            Sqlmock { state },
        )
    }

    fn call(&self, kind: CallKind, query: Option<&str>) -> Result<Response, MockError> {
        let query = query.map(collapse_whitespace);
        let query = query.as_deref();
        let mut state = lock(&self.state);
        let (ordered, matcher) = (state.ordered, state.matcher);

        let mut found = None;
        for (i, exp) in state.expectations.iter().enumerate() {
            if exp.triggered {
                continue;
            }
            let kind_matches = exp.kind == kind;
            if kind_matches && exp.sql_matches(query, matcher)? {
                found = Some(i);
                break;
            }
            if ordered {
                return Err(match (kind_matches, &exp.sql, query) {
                    (true, Some(expected), Some(query)) => MockError::QueryMismatch {
                        query: query.to_string(),
                        expected: expected.clone(),
                    },
                    _ => MockError::Unexpected {
                        call: describe_call(kind, query),
                        next: exp.describe(),
                    },
                });
            }
        }

        let Some(i) = found else {
            return Err(MockError::Exhausted(describe_call(kind, query)));
        };
        let exp = &mut state.expectations[i];
        exp.triggered = true;
        tracing::trace!(expectation = %exp.describe(), "mock expectation met");

        match (&exp.response, kind) {
            (Response::Unset, CallKind::Exec | CallKind::Query) => {
                Err(MockError::MissingResponse(exp.describe()))
            }
            (response, _) => Ok(response.clone()),
        }
    }
}

impl Session for MockDb {
    fn exec(&mut self, query: &str) -> Result<ExecResult, DbError> {
        match self.call(CallKind::Exec, Some(query))? {
            Response::Result(result) => Ok(result),
            Response::Error(message) => Err(DbError::Driver(message)),
            _ => Err(MockError::MissingResponse(describe_call(CallKind::Exec, Some(query))).into()),
        }
    }

    fn query(&mut self, query: &str) -> Result<Rows, DbError> {
        match self.call(CallKind::Query, Some(query))? {
            Response::Rows(rows) => Ok(rows),
            Response::Error(message) => Err(DbError::Driver(message)),
            _ => Err(MockError::MissingResponse(describe_call(CallKind::Query, Some(query))).into()),
        }
    }

    fn begin(&mut self) -> Result<(), DbError> {
        self.transaction_call(CallKind::Begin)
    }

    fn commit(&mut self) -> Result<(), DbError> {
        self.transaction_call(CallKind::Commit)
    }

    fn rollback(&mut self) -> Result<(), DbError> {
        self.transaction_call(CallKind::Rollback)
    }
}

impl MockDb {
    fn transaction_call(&self, kind: CallKind) -> Result<(), DbError> {
        match self.call(kind, None)? {
            Response::Error(message) => Err(DbError::Driver(message)),
            _ => Ok(()),
        }
    }
}

/// Expectation recorder paired with a [`MockDb`]
#[derive(Debug, Clone)]
pub struct Sqlmock {
    state: SharedState,
}

impl Sqlmock {
    fn push(&self, kind: CallKind, sql: Option<&str>) -> usize {
        let mut state = lock(&self.state);
        state.expectations.push(Expectation::new(kind, sql));
        state.expectations.len() - 1
    }

    /// Expect a statement matching `sql`
    pub fn expect_exec(&self, sql: &str) -> ExpectedExec {
        let index = self.push(CallKind::Exec, Some(sql));
        ExpectedExec {
            handle: Handle::new(&self.state, index),
        }
    }

    /// Expect a query matching `sql`
    pub fn expect_query(&self, sql: &str) -> ExpectedQuery {
        let index = self.push(CallKind::Query, Some(sql));
        ExpectedQuery {
            handle: Handle::new(&self.state, index),
        }
    }

    pub fn expect_begin(&self) -> ExpectedTransaction {
        self.expect_transaction(CallKind::Begin)
    }

    pub fn expect_commit(&self) -> ExpectedTransaction {
        self.expect_transaction(CallKind::Commit)
    }

    pub fn expect_rollback(&self) -> ExpectedTransaction {
        self.expect_transaction(CallKind::Rollback)
    }

    fn expect_transaction(&self, kind: CallKind) -> ExpectedTransaction {
        let index = self.push(kind, None);
        ExpectedTransaction {
            handle: Handle::new(&self.state, index),
        }
    }

    /// Require calls in scripted order (the default) or allow any order
    pub fn match_expectations_in_order(&self, ordered: bool) {
        lock(&self.state).ordered = ordered;
    }

    /// Fail if any scripted expectation was never hit
    pub fn expectations_were_met(&self) -> Result<(), MockError> {
        let state = lock(&self.state);
        let pending: Vec<String> = state
            .expectations
            .iter()
            .filter(|e| !e.triggered)
            .map(Expectation::describe)
            .collect();

        if pending.is_empty() {
            Ok(())
        } else {
            Err(MockError::Unfulfilled(pending.join(", ")))
        }
    }
}

#[derive(Debug, Clone)]
struct Handle {
    state: SharedState,
    index: usize,
}

impl Handle {
    fn new(state: &SharedState, index: usize) -> Self {
        Self {
            state: Arc::clone(state),
            index,
        }
    }

    fn respond(&self, response: Response) {
        lock(&self.state).expectations[self.index].response = response;
    }
}

/// Scripted statement; set what it returns with the `will_*` methods
#[derive(Debug, Clone)]
pub struct ExpectedExec {
    handle: Handle,
}

impl ExpectedExec {
    pub fn will_return_result(self, result: ExecResult) -> Self {
        self.handle.respond(Response::Result(result));
        self
    }

    pub fn will_return_error(self, message: impl Into<String>) -> Self {
        self.handle.respond(Response::Error(message.into()));
        self
    }
}

/// Scripted query; set what it returns with the `will_*` methods
#[derive(Debug, Clone)]
pub struct ExpectedQuery {
    handle: Handle,
}

impl ExpectedQuery {
    pub fn will_return_rows(self, rows: Rows) -> Self {
        self.handle.respond(Response::Rows(rows));
        self
    }

    pub fn will_return_error(self, message: impl Into<String>) -> Self {
        self.handle.respond(Response::Error(message.into()));
        self
    }
}

/// Scripted begin, commit or rollback; succeeds unless told otherwise
#[derive(Debug, Clone)]
pub struct ExpectedTransaction {
    handle: Handle,
}

impl ExpectedTransaction {
    pub fn will_return_error(self, message: impl Into<String>) -> Self {
        self.handle.respond(Response::Error(message.into()));
        self
    }
}
