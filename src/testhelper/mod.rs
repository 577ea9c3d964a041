//! Helpers for unit tests of code that talks to the database
//!
//! This module is split into focused submodules:
//! - `assertions`: checks on captured output, panics and errors
//! - `driver`: a [`Driver`](crate::dbconn::Driver) over the mock database
//! - `files`: substitute contents for files opened for reading
//!
//! The setup functions here panic when a step fails, failing the test
//! that called them.

mod assertions;
mod driver;
mod files;

pub use assertions::{
    assert_err_contains, assert_query_runs, expect_regexp, not_expect_regexp, panic_message,
    should_panic_with_message,
};
pub use driver::TestDriver;
pub use files::mock_file_contents;

use crate::config::HarnessConfig;
use crate::dbconn::DbConn;
use crate::logging::{CaptureBuffer, Logger, LoggerGuard};
use crate::operating;
use crate::sqlmock::{MockDb, Sqlmock};

/// Buffers capturing one installed logger's output
///
/// The logger stays installed on this thread until the value drops.
#[derive(Debug)]
pub struct TestLogger {
    pub stdout: CaptureBuffer,
    pub stderr: CaptureBuffer,
    pub logfile: CaptureBuffer,
    _guard: LoggerGuard,
}

/// Install a fresh logger writing info and above into three new buffers
pub fn setup_test_logger() -> TestLogger {
    setup_test_logger_with(&HarnessConfig::default())
}

/// Like [`setup_test_logger`] with the program name and level from `config`
pub fn setup_test_logger_with(config: &HarnessConfig) -> TestLogger {
    let stdout = CaptureBuffer::new();
    let stderr = CaptureBuffer::new();
    let logfile = CaptureBuffer::new();

    let guard = Logger::new(
        stdout.clone(),
        stderr.clone(),
        logfile.clone(),
        config.program_name.clone(),
        config.log_level,
    )
    .install();

    TestLogger {
        stdout,
        stderr,
        logfile,
        _guard: guard,
    }
}

/// Everything most tests need: a connected mock database and captured logs
#[derive(Debug)]
pub struct TestEnvironment {
    pub conn: DbConn,
    pub mock: Sqlmock,
    pub stdout: CaptureBuffer,
    pub stderr: CaptureBuffer,
    pub logfile: CaptureBuffer,
    _logger: TestLogger,
}

pub fn setup_test_environment() -> TestEnvironment {
    setup_test_environment_with(&HarnessConfig::default())
}

/// Logger, then a one-session mock connection, then the real OS functions
#[track_caller]
pub fn setup_test_environment_with(config: &HarnessConfig) -> TestEnvironment {
    let logger = setup_test_logger_with(config);
    let (conn, mock) = create_and_connect_mock_db_with(1, config);
    operating::reset_system();

    TestEnvironment {
        conn,
        mock,
        stdout: logger.stdout.clone(),
        stderr: logger.stderr.clone(),
        logfile: logger.logfile.clone(),
        _logger: logger,
    }
}

/// Fake database handle and the recorder scripting it
pub fn create_mock_db() -> (MockDb, Sqlmock) {
    MockDb::new()
}

/// Connect `num_conns` sessions onto one mock as `testrole` on `testdb`
#[track_caller]
pub fn create_and_connect_mock_db(num_conns: usize) -> (DbConn, Sqlmock) {
    create_and_connect_mock_db_with(num_conns, &HarnessConfig::default())
}

#[track_caller]
pub fn create_and_connect_mock_db_with(
    num_conns: usize,
    config: &HarnessConfig,
) -> (DbConn, Sqlmock) {
    let (db, mock) = create_mock_db();

    let mut conn = match DbConn::from_environment(&config.db_name) {
        Ok(conn) => conn,
        Err(e) => panic!("Could not create mock connection: {}", e),
    };
    conn.driver = Box::new(TestDriver::new(db, &config.db_name, &config.role));
    conn.user = config.role.clone();

    if let Err(e) = conn.connect(num_conns) {
        panic!("Could not connect {} mock session(s): {}", num_conns, e);
    }
    set_db_version(&mut conn, &config.server_version);

    (conn, mock)
}

/// Overwrite the connection's version; a malformed string fails the test
#[track_caller]
pub fn set_db_version(conn: &mut DbConn, version: &str) {
    if let Err(e) = conn.set_version(version) {
        panic!("Could not set database version: {}", e);
    }
}
