pub mod config;
pub mod dbconn;
pub mod logging;
pub mod operating;
pub mod sqlmock;
pub mod testhelper;

pub use config::HarnessConfig;
pub use dbconn::{ConnectParams, DbConn, DbError, DbVersion, Driver, ExecResult, Rows, Session, SqliteDriver, Value};
pub use logging::{CaptureBuffer, LogLevel, Logger, LoggerGuard};
pub use sqlmock::{MockDb, MockError, QueryMatcher, Sqlmock};
pub use testhelper::{
    assert_err_contains, assert_query_runs, create_and_connect_mock_db,
    create_and_connect_mock_db_with, create_mock_db, expect_regexp, mock_file_contents,
    not_expect_regexp, set_db_version, setup_test_environment, setup_test_environment_with,
    setup_test_logger, setup_test_logger_with, should_panic_with_message, TestDriver,
    TestEnvironment, TestLogger,
};
