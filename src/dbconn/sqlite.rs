//! SQLite driver backed by `rusqlite`

use rusqlite::Connection;
use rusqlite::types::Value;

use super::rows::{ExecResult, Rows};
use super::{ConnectParams, DbError, Driver, Session};

/// Opens `rusqlite` connections; the database name is the file path
///
/// `:memory:` opens a private in-memory database per session.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDriver;

impl Driver for SqliteDriver {
    fn connect(&self, params: &ConnectParams) -> Result<Box<dyn Session>, DbError> {
        let conn = if params.db_name == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(&params.db_name)?
        };
        Ok(Box::new(SqliteSession { conn }))
    }
}

struct SqliteSession {
    conn: Connection,
}

impl Session for SqliteSession {
    fn exec(&mut self, query: &str) -> Result<ExecResult, DbError> {
        let mut stmt = self.conn.prepare(query)?;

        // Statements that produce rows are stepped to completion and the
        // rows dropped; they change nothing.
        if stmt.column_count() > 0 {
            let mut rows = stmt.query([])?;
            while rows.next()?.is_some() {}
            return Ok(ExecResult::new(self.conn.last_insert_rowid(), 0));
        }

        let rows_affected = stmt.execute([])?;
        Ok(ExecResult::new(
            self.conn.last_insert_rowid(),
            rows_affected as u64,
        ))
    }

    fn query(&mut self, query: &str) -> Result<Rows, DbError> {
        let mut stmt = self.conn.prepare(query)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let width = columns.len();

        let rows = stmt
            .query_map([], |row| {
                (0..width)
                    .map(|i| row.get::<_, Value>(i))
                    .collect::<rusqlite::Result<Vec<_>>>()
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Rows { columns, rows })
    }

    fn begin(&mut self) -> Result<(), DbError> {
        self.conn.execute_batch("BEGIN")?;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DbError> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DbError> {
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }
}
