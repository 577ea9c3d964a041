//! Integration tests for the database test harness

mod common;

use std::fs::OpenOptions;
use std::io::Read;
use std::path::Path;

use dbharness::operating;
use dbharness::{
    DbError, ExecResult, HarnessConfig, LogLevel, MockError, Value, assert_err_contains,
    assert_query_runs, create_and_connect_mock_db, expect_regexp, mock_file_contents,
    not_expect_regexp, set_db_version, setup_test_environment, setup_test_environment_with,
    setup_test_logger, should_panic_with_message,
};

// ==================== Logger Capture ====================

#[test]
fn test_info_reaches_all_three_buffers() {
    let logger = setup_test_logger();
    tracing::info!("Restore completed successfully");

    expect_regexp(&logger.stdout, "Restore completed successfully");
    expect_regexp(&logger.stderr, "Restore completed successfully");
    expect_regexp(&logger.logfile, "Restore completed successfully");
}

#[test]
fn test_error_and_warning_are_captured() {
    let logger = setup_test_logger();
    tracing::warn!("Skipping table");
    tracing::error!("Backup failed");

    expect_regexp(&logger.stdout, "[WARNING]:-Skipping table");
    expect_regexp(&logger.stdout, "[ERROR]:-Backup failed");
}

#[test]
fn test_debug_is_filtered_at_info() {
    let logger = setup_test_logger();
    tracing::debug!("verbose detail");
    tracing::trace!("debug detail");

    assert!(logger.stdout.contents().is_empty());
    assert!(logger.logfile.contents().is_empty());
}

#[test]
fn test_line_prefix_uses_program_and_clock() {
    common::pin_clock(2026, 3, 14);
    let logger = setup_test_logger();
    tracing::info!(table = "public.foo", "Writing data");
    operating::reset_system();

    let line = logger.stdout.contents_string();
    assert!(line.starts_with("20260314:12:00:00 testProgram:"), "{}", line);
    assert!(line.contains("-[INFO]:-Writing data"), "{}", line);
    assert!(line.contains("public.foo"), "{}", line);
}

#[test]
fn test_dropping_logger_stops_capture() {
    let logger = setup_test_logger();
    let stdout = logger.stdout.clone();
    drop(logger);

    tracing::info!("after drop");
    assert!(stdout.contents().is_empty());
}

#[test]
fn test_verbose_level_from_config() {
    let config = HarnessConfig {
        log_level: LogLevel::Verbose,
        program_name: "gprestore".to_string(),
        ..HarnessConfig::default()
    };
    let env = setup_test_environment_with(&config);
    tracing::debug!("Verbose message");

    expect_regexp(&env.stdout, "gprestore:");
    expect_regexp(&env.stdout, "[VERBOSE]:-Verbose message");
}

// ==================== Output Assertions ====================

#[test]
fn test_expect_regexp_is_literal() {
    let logger = setup_test_logger();
    tracing::info!("axb");
    should_panic_with_message("Expected output to contain 'a.b'", || {
        expect_regexp(&logger.stdout, "a.b")
    });

    tracing::info!("a.b");
    expect_regexp(&logger.stdout, "a.b");
}

#[test]
fn test_expect_regexp_consumes_output() {
    let logger = setup_test_logger();
    tracing::info!("Table foo");
    expect_regexp(&logger.stdout, "Table foo");
    not_expect_regexp(&logger.stdout, "Table foo");
}

// ==================== Panic Assertions ====================

#[test]
fn test_should_panic_with_error_value() {
    should_panic_with_message("boom", || {
        std::panic::panic_any(anyhow::anyhow!("something boom happened"))
    });
}

#[test]
#[should_panic(expected = "Expected panic message 'boom', got 'ok'")]
fn test_should_panic_reports_both_messages() {
    should_panic_with_message("boom", || panic!("ok"));
}

#[test]
fn test_assert_err_contains_on_db_error() {
    let (mut conn, _mock) = create_and_connect_mock_db(1);
    assert_err_contains(conn.exec_on("SELECT 1", 4), "invalid connection 4");
}

// ==================== Mock Database ====================

#[test]
fn test_set_db_version_stores_both_forms() {
    let (mut conn, _mock) = create_and_connect_mock_db(1);
    set_db_version(&mut conn, "5.1.0");

    assert_eq!(conn.version.version_string, "5.1.0");
    assert_eq!(conn.version.semver, semver::Version::new(5, 1, 0));
}

#[test]
fn test_set_db_version_rejects_malformed() {
    let (mut conn, _mock) = create_and_connect_mock_db(1);
    set_db_version(&mut conn, "6.0.0");

    should_panic_with_message("not-a-version", || set_db_version(&mut conn, "not-a-version"));
    assert_eq!(conn.version.version_string, "6.0.0");
    assert_eq!(conn.version.semver, semver::Version::new(6, 0, 0));
}

#[test]
fn test_three_connections() {
    let (conn, _mock) = create_and_connect_mock_db(3);

    assert_eq!(conn.num_conns(), 3);
    assert_eq!(conn.version.version_string, "5.1.0");
    assert_eq!(conn.version.semver, semver::Version::new(5, 1, 0));
}

#[test]
fn test_init_version_through_mock() {
    let mut env = setup_test_environment();
    env.mock
        .expect_query(&regex::escape("SELECT version()"))
        .will_return_rows(common::text_rows(
            "version",
            &["PostgreSQL 9.4.26 (Greenplum Database 6.20.3 build commit:abc) on x86_64"],
        ));

    env.conn.init_version().unwrap();
    assert_eq!(env.conn.version.version_string, "6.20.3");
    assert!(env.conn.version.before("7").unwrap());
    common::assert_mock_met(&env);
}

#[test]
fn test_transaction_across_sessions() {
    let (mut conn, mock) = create_and_connect_mock_db(2);
    mock.expect_begin();
    mock.expect_exec("INSERT INTO foo")
        .will_return_result(ExecResult::new(0, 1));
    mock.expect_commit();

    conn.begin(1).unwrap();
    assert_eq!(conn.exec_on("INSERT INTO foo VALUES (1)", 1).unwrap().rows_affected, 1);
    conn.commit(1).unwrap();
    mock.expectations_were_met().unwrap();
}

#[test]
fn test_unexpected_exec_names_query() {
    let mut env = setup_test_environment();
    let err = env.conn.exec("DROP SCHEMA bar").unwrap_err();

    assert!(matches!(err, DbError::Mock(MockError::Exhausted(_))));
    assert_err_contains(Err::<(), _>(err), "DROP SCHEMA bar");
}

#[test]
fn test_unmet_expectation_is_reported() {
    let env = setup_test_environment();
    env.mock
        .expect_exec("VACUUM foo")
        .will_return_result(ExecResult::default());

    assert_err_contains(env.mock.expectations_were_met(), "VACUUM foo");
}

#[test]
#[should_panic(expected = "Query failed: permission denied")]
fn test_assert_query_runs_reports_error() {
    let mut env = setup_test_environment();
    env.mock
        .expect_exec("ANALYZE")
        .will_return_error("permission denied");
    assert_query_runs(&mut env.conn, "ANALYZE foo");
}

#[test]
fn test_query_rows() {
    let mut env = setup_test_environment();
    env.mock
        .expect_query("SELECT nspname")
        .will_return_rows(common::text_rows("nspname", &["public", "gp_toolkit"]));

    let rows = env.conn.query("SELECT nspname FROM pg_namespace").unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows.rows[1][0], Value::Text("gp_toolkit".to_string()));
}

// ==================== File Mocking ====================

#[test]
fn test_mock_file_contents_ignores_path() {
    mock_file_contents("hello");

    let mut reader = operating::open_file_read(
        Path::new("/any/file/name.sql"),
        OpenOptions::new().read(true),
    )
    .unwrap();
    let mut content = Vec::new();
    reader.read_to_end(&mut content).unwrap();
    operating::reset_system();

    assert_eq!(content, b"hello");
}

#[test]
fn test_environment_resets_file_mock() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("real.toml");
    std::fs::write(&path, "db_name = \"real\"").unwrap();

    mock_file_contents("db_name = \"fake\"");
    let _env = setup_test_environment();

    let config = HarnessConfig::load(&path).unwrap();
    assert_eq!(config.db_name, "real");
}

#[test]
fn test_config_through_mocked_file() {
    mock_file_contents("role = \"gpadmin\"\nserver_version = \"6.1.0\"\n");
    let config = HarnessConfig::load(Path::new("harness.toml"));
    operating::reset_system();

    let config = config.unwrap();
    assert_eq!(config.role, "gpadmin");
    assert_eq!(config.server_version, "6.1.0");
    assert_eq!(config.db_name, "testdb");
}
