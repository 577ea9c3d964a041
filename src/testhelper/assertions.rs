//! Assertions on captured output, panics and errors
//!
//! Every helper reports failure by panicking with a descriptive message,
//! which is how the test harness records a failed assertion.

use std::any::Any;
use std::fmt::{Debug, Display};
use std::panic::{self, AssertUnwindSafe};

use crate::dbconn::DbConn;
use crate::logging::CaptureBuffer;

/// Assert the buffer's unread output contains `test_str` literally
///
/// Regex metacharacters in `test_str` are escaped. A match consumes the
/// output up to its end.
#[track_caller]
pub fn expect_regexp(buffer: &CaptureBuffer, test_str: &str) {
    if !buffer.say_literal(test_str) {
        panic!(
            "Expected output to contain '{}'\nUnread output:\n{}",
            test_str,
            buffer.unread()
        );
    }
}

/// Assert the buffer's unread output does not contain `test_str` literally
#[track_caller]
pub fn not_expect_regexp(buffer: &CaptureBuffer, test_str: &str) {
    let unread = buffer.unread();
    if buffer.say_literal(test_str) {
        panic!(
            "Expected output not to contain '{}'\nUnread output:\n{}",
            test_str, unread
        );
    }
}

/// Render a panic payload as text
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(e) = payload.downcast_ref::<anyhow::Error>() {
        format!("{:#}", e)
    } else if let Some(e) = payload.downcast_ref::<Box<dyn std::error::Error + Send + Sync>>() {
        e.to_string()
    } else {
        "<non-string panic payload>".to_string()
    }
}

/// Run `f` and assert that it panics with a message containing `message`
///
/// The payload is trimmed before comparing.
#[track_caller]
pub fn should_panic_with_message<F, R>(message: &str, f: F)
where
    F: FnOnce() -> R,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(_) => panic!("Function did not panic as expected"),
        Err(payload) => {
            let actual = panic_message(payload.as_ref());
            let actual = actual.trim();
            if !actual.contains(message) {
                panic!("Expected panic message '{}', got '{}'", message, actual);
            }
        }
    }
}

/// Assert that `result` is an error whose message contains `message`
#[track_caller]
pub fn assert_err_contains<T: Debug, E: Display>(result: Result<T, E>, message: &str) {
    match result {
        Ok(value) => panic!(
            "Expected an error containing '{}', got Ok({:?})",
            message, value
        ),
        Err(err) => {
            let actual = format!("{:#}", err);
            let actual = actual.trim();
            if !actual.contains(message) {
                panic!("Expected error message '{}', got '{}'", message, actual);
            }
        }
    }
}

/// Assert that `query` executes without error
#[track_caller]
pub fn assert_query_runs(conn: &mut DbConn, query: &str) {
    if let Err(err) = conn.exec(query) {
        panic!("{}\nQuery failed: {}", query, err);
    }
}
