//! Driver that hands out sessions onto a mock database

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::dbconn::{ConnectParams, DbError, Driver, Session};
use crate::sqlmock::MockDb;

/// [`Driver`] whose every connection shares one [`MockDb`]
///
/// `err_to_return` fails every connect. `errs_to_return` fails individual
/// connects by call number, which is how a test simulates the third of five
/// connections being refused.
#[derive(Debug)]
pub struct TestDriver {
    pub db: MockDb,
    pub db_name: String,
    pub user: String,
    pub err_to_return: Option<String>,
    pub errs_to_return: Vec<Option<String>>,
    call_number: AtomicUsize,
}

impl TestDriver {
    pub fn new(db: MockDb, db_name: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            db,
            db_name: db_name.into(),
            user: user.into(),
            err_to_return: None,
            errs_to_return: Vec::new(),
            call_number: AtomicUsize::new(0),
        }
    }

    /// Number of connect calls made so far
    pub fn calls(&self) -> usize {
        self.call_number.load(Ordering::SeqCst)
    }
}

impl Driver for TestDriver {
    fn connect(&self, params: &ConnectParams) -> Result<Box<dyn Session>, DbError> {
        let call = self.call_number.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(call, db = %params.db_name, user = %self.user, "mock connect");

        if let Some(message) = &self.err_to_return {
            return Err(DbError::Driver(message.clone()));
        }
        if let Some(Some(message)) = self.errs_to_return.get(call) {
            return Err(DbError::Driver(message.clone()));
        }
        Ok(Box::new(self.db.clone()))
    }
}
