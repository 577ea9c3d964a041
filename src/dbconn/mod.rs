//! Database connection and driver seam
//!
//! This module is split into focused submodules:
//! - `rows`: query results and the shared value type
//! - `sqlite`: the default driver, backed by `rusqlite`
//! - `version`: the server version a connection reports
//!
//! A [`DbConn`] owns one or more [`Session`]s opened through a [`Driver`].
//! Tests swap the driver for one that hands out mock sessions.

mod rows;
mod sqlite;
mod version;

pub use rows::{ExecResult, Rows, Value, value_to_string};
pub use sqlite::SqliteDriver;
pub use version::DbVersion;

use thiserror::Error;

use crate::operating;
use crate::sqlmock::MockError;

/// Errors returned by connections and drivers
#[derive(Debug, Error)]
pub enum DbError {
    #[error("number of connections must be at least 1, got {0}")]
    InvalidConnectionCount(usize),

    #[error("not connected to database {0}")]
    NotConnected(String),

    #[error("invalid connection {which}: {num_conns} connection(s) open")]
    InvalidConnection { which: usize, num_conns: usize },

    #[error("could not connect to database {db_name}: {source}")]
    Connect {
        db_name: String,
        #[source]
        source: Box<DbError>,
    },

    #[error("invalid PGPORT value '{0}'")]
    InvalidPort(String),

    #[error("connection {0} already has a transaction in progress")]
    TransactionInProgress(usize),

    #[error("connection {0} has no transaction in progress")]
    NoTransaction(usize),

    #[error("expected a single value from query, got {rows} row(s) and {columns} column(s)")]
    NotSingleValue { rows: usize, columns: usize },

    #[error("invalid database version '{version}': {source}")]
    Version {
        version: String,
        #[source]
        source: semver::Error,
    },

    #[error("could not find a version number in '{0}'")]
    VersionNotFound(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Mock(#[from] MockError),

    #[error("{0}")]
    Driver(String),
}

/// Where and as whom a driver should connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectParams {
    pub db_name: String,
    pub user: String,
    pub host: String,
    pub port: u16,
}

/// A backend that can open sessions
pub trait Driver: Send {
    fn connect(&self, params: &ConnectParams) -> Result<Box<dyn Session>, DbError>;
}

/// One open connection to a backend
pub trait Session: Send {
    fn exec(&mut self, query: &str) -> Result<ExecResult, DbError>;

    fn query(&mut self, query: &str) -> Result<Rows, DbError>;

    fn begin(&mut self) -> Result<(), DbError>;

    fn commit(&mut self) -> Result<(), DbError>;

    fn rollback(&mut self) -> Result<(), DbError>;
}

/// Connection to a database, possibly spanning several sessions
pub struct DbConn {
    pub driver: Box<dyn Driver>,
    pub db_name: String,
    pub user: String,
    pub host: String,
    pub port: u16,
    pub version: DbVersion,
    sessions: Vec<Box<dyn Session>>,
    in_transaction: Vec<bool>,
}

impl std::fmt::Debug for DbConn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConn")
            .field("db_name", &self.db_name)
            .field("user", &self.user)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("version", &self.version)
            .field("num_conns", &self.sessions.len())
            .finish_non_exhaustive()
    }
}

impl DbConn {
    pub fn new(
        db_name: impl Into<String>,
        user: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        driver: Box<dyn Driver>,
    ) -> Self {
        Self {
            driver,
            db_name: db_name.into(),
            user: user.into(),
            host: host.into(),
            port,
            version: DbVersion::default(),
            sessions: Vec::new(),
            in_transaction: Vec::new(),
        }
    }

    /// Build a connection from `PG*` environment variables
    ///
    /// An empty `db_name` falls back to `PGDATABASE`. The user comes from
    /// `PGUSER`, then `USER`; host and port from `PGHOST` and `PGPORT`.
    /// The driver is [`SqliteDriver`] until replaced.
    pub fn from_environment(db_name: &str) -> Result<Self, DbError> {
        let db_name = if db_name.is_empty() {
            operating::getenv("PGDATABASE").unwrap_or_default()
        } else {
            db_name.to_string()
        };
        let user = operating::getenv("PGUSER")
            .or_else(|| operating::getenv("USER"))
            .unwrap_or_else(|| "postgres".to_string());
        let host = operating::getenv("PGHOST").unwrap_or_else(|| "localhost".to_string());
        let port = match operating::getenv("PGPORT") {
            Some(port) => port.parse().map_err(|_| DbError::InvalidPort(port))?,
            None => 5432,
        };

        Ok(Self::new(db_name, user, host, port, Box::new(SqliteDriver)))
    }

    pub fn params(&self) -> ConnectParams {
        ConnectParams {
            db_name: self.db_name.clone(),
            user: self.user.clone(),
            host: self.host.clone(),
            port: self.port,
        }
    }

    /// Open `num_conns` sessions, replacing any already open
    pub fn connect(&mut self, num_conns: usize) -> Result<(), DbError> {
        if num_conns < 1 {
            return Err(DbError::InvalidConnectionCount(num_conns));
        }

        let params = self.params();
        let mut sessions = Vec::with_capacity(num_conns);
        for _ in 0..num_conns {
            let session = self.driver.connect(&params).map_err(|e| DbError::Connect {
                db_name: self.db_name.clone(),
                source: Box::new(e),
            })?;
            sessions.push(session);
        }

        self.sessions = sessions;
        self.in_transaction = vec![false; num_conns];
        tracing::debug!(
            db = %self.db_name,
            user = %self.user,
            num_conns,
            "Connected to database"
        );
        Ok(())
    }

    /// Number of open sessions
    pub fn num_conns(&self) -> usize {
        self.sessions.len()
    }

    fn session(&mut self, which: usize) -> Result<&mut Box<dyn Session>, DbError> {
        if self.sessions.is_empty() {
            return Err(DbError::NotConnected(self.db_name.clone()));
        }
        let num_conns = self.sessions.len();
        self.sessions
            .get_mut(which)
            .ok_or(DbError::InvalidConnection { which, num_conns })
    }

    /// Execute a statement on the first session
    pub fn exec(&mut self, query: &str) -> Result<ExecResult, DbError> {
        self.exec_on(query, 0)
    }

    pub fn exec_on(&mut self, query: &str, which: usize) -> Result<ExecResult, DbError> {
        tracing::trace!(which, query, "exec");
        self.session(which)?.exec(query)
    }

    /// Run a query on the first session
    pub fn query(&mut self, query: &str) -> Result<Rows, DbError> {
        self.query_on(query, 0)
    }

    pub fn query_on(&mut self, query: &str, which: usize) -> Result<Rows, DbError> {
        tracing::trace!(which, query, "query");
        self.session(which)?.query(query)
    }

    /// Run a query that must return exactly one row with one column
    pub fn select_string(&mut self, query: &str) -> Result<String, DbError> {
        let rows = self.query(query)?;
        match rows.rows.as_slice() {
            [row] if row.len() == 1 => Ok(value_to_string(&row[0])),
            _ => Err(DbError::NotSingleValue {
                rows: rows.len(),
                columns: rows.columns.len(),
            }),
        }
    }

    pub fn begin(&mut self, which: usize) -> Result<(), DbError> {
        self.session(which)?;
        if self.in_transaction[which] {
            return Err(DbError::TransactionInProgress(which));
        }
        self.session(which)?.begin()?;
        self.in_transaction[which] = true;
        Ok(())
    }

    pub fn commit(&mut self, which: usize) -> Result<(), DbError> {
        self.session(which)?;
        if !self.in_transaction[which] {
            return Err(DbError::NoTransaction(which));
        }
        self.session(which)?.commit()?;
        self.in_transaction[which] = false;
        Ok(())
    }

    pub fn rollback(&mut self, which: usize) -> Result<(), DbError> {
        self.session(which)?;
        if !self.in_transaction[which] {
            return Err(DbError::NoTransaction(which));
        }
        self.session(which)?.rollback()?;
        self.in_transaction[which] = false;
        Ok(())
    }

    /// Replace the stored version; nothing changes if `version` is malformed
    pub fn set_version(&mut self, version: &str) -> Result<(), DbError> {
        self.version = DbVersion::parse(version)?;
        Ok(())
    }

    /// Ask the server for its version and store it
    pub fn init_version(&mut self) -> Result<(), DbError> {
        let output = self.select_string("SELECT version()")?;
        self.version = DbVersion::from_server_output(&output)?;
        tracing::debug!(version = %self.version, "Detected server version");
        Ok(())
    }

    /// Close every session
    pub fn close(&mut self) {
        if !self.sessions.is_empty() {
            tracing::debug!(db = %self.db_name, "Closing connections");
        }
        self.sessions.clear();
        self.in_transaction.clear();
    }
}
