//! Scripted expectations and how calls are matched against them

use regex::Regex;

use super::MockError;
use crate::dbconn::{ExecResult, Rows};

/// How an expectation's SQL is compared with the executed query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryMatcher {
    /// The expectation is a regular expression searched for in the query
    #[default]
    Regexp,
    /// The expectation must equal the query exactly
    Equal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CallKind {
    Begin,
    Commit,
    Rollback,
    Exec,
    Query,
}

impl std::fmt::Display for CallKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Begin => write!(f, "Begin"),
            Self::Commit => write!(f, "Commit"),
            Self::Rollback => write!(f, "Rollback"),
            Self::Exec => write!(f, "Exec"),
            Self::Query => write!(f, "Query"),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Response {
    Unset,
    Result(ExecResult),
    Rows(Rows),
    Error(String),
}

#[derive(Debug, Clone)]
pub(crate) struct Expectation {
    pub kind: CallKind,
    pub sql: Option<String>,
    pub response: Response,
    pub triggered: bool,
}

impl Expectation {
    pub fn new(kind: CallKind, sql: Option<&str>) -> Self {
        Self {
            kind,
            sql: sql.map(collapse_whitespace),
            response: Response::Unset,
            triggered: false,
        }
    }

    /// Whether a query satisfies this expectation's SQL
    ///
    /// Transaction expectations carry no SQL and accept anything.
    pub fn sql_matches(&self, query: Option<&str>, matcher: QueryMatcher) -> Result<bool, MockError> {
        let (Some(expected), Some(query)) = (self.sql.as_deref(), query) else {
            return Ok(true);
        };
        match matcher {
            QueryMatcher::Equal => Ok(expected == query),
            QueryMatcher::Regexp => {
                let pattern = Regex::new(expected).map_err(|e| MockError::InvalidPattern {
                    pattern: expected.to_string(),
                    message: e.to_string(),
                })?;
                Ok(pattern.is_match(query))
            }
        }
    }

    pub fn describe(&self) -> String {
        match &self.sql {
            Some(sql) => format!("{} matching '{}'", self.kind, sql),
            None => self.kind.to_string(),
        }
    }
}

/// Collapse runs of whitespace so formatting differences never matter
pub(crate) fn collapse_whitespace(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn describe_call(kind: CallKind, query: Option<&str>) -> String {
    match query {
        Some(query) => format!("{} '{}'", kind, query),
        None => kind.to_string(),
    }
}
