//! Common test utilities

use std::sync::Arc;

use chrono::{Local, TimeZone};
use dbharness::operating;
use dbharness::{Rows, TestEnvironment, Value};

/// Pin this thread's clock so log prefixes are predictable
pub fn pin_clock(year: i32, month: u32, day: u32) {
    let fixed = Local
        .with_ymd_and_hms(year, month, day, 12, 0, 0)
        .single()
        .expect("Failed to build fixed timestamp");
    operating::update_system(move |sys| sys.now = Arc::new(move || fixed));
}

/// Single-column rows of text values
pub fn text_rows(column: &str, values: &[&str]) -> Rows {
    values
        .iter()
        .fold(Rows::new(&[column]), |rows, v| rows.add_row([Value::Text(v.to_string())]))
}

/// Fail the test if the environment's mock saw fewer calls than scripted
pub fn assert_mock_met(env: &TestEnvironment) {
    env.mock
        .expectations_were_met()
        .expect("Mock expectations were not met");
}
