//! # Database
//!
//! SQLite connectivity through SQLx: a cloneable [`DatabasePool`] for
//! app-level work and a per-request [`Session`] that owns one transaction.
//!
//! A session begins its transaction on first use and must be committed
//! explicitly. Dropping it uncommitted rolls back and hands the connection
//! back to the pool, so every exit path of a request releases it.
//!
//! Read sessions begin deferred. Write sessions begin with
//! `BEGIN IMMEDIATE` so the database write lock is taken before the first
//! read; two writers can then never both hold a read lock and deadlock on
//! the upgrade. File databases run in WAL mode with a busy timeout, so a
//! writer waiting on the lock queues instead of failing with `SQLITE_BUSY`.

use crate::error::Result;
use serde::Serialize;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::{Column, Row, Sqlite, SqliteConnection, Transaction, TypeInfo};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Default pool size for file-backed databases
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// How long a connection waits on a locked database before giving up
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite connection pool
#[derive(Clone, Debug)]
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Connect to a SQLite database
    ///
    /// File databases are created when missing and opened in WAL mode with
    /// [`DEFAULT_BUSY_TIMEOUT`]. In-memory URLs
    /// (`sqlite::memory:`) get exactly one long-lived connection, since
    /// every SQLite connection would otherwise see its own empty database.
    ///
    /// ```ignore
    /// let pool = DatabasePool::connect_sqlite("sqlite::memory:", None).await?;
    /// let pool = DatabasePool::connect_sqlite("sqlite:users.db", Some(8)).await?;
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` if the URL is malformed or the connection fails.
    pub async fn connect_sqlite(url: &str, max_connections: Option<u32>) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .busy_timeout(DEFAULT_BUSY_TIMEOUT);

        let pool = if is_memory_url(url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS))
                .connect_with(options.journal_mode(SqliteJournalMode::Wal))
                .await?
        };

        debug!(url, "SQLite pool connected");
        Ok(Self { pool })
    }

    /// Execute one statement, returning the number of affected rows
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` if the statement fails.
    pub async fn execute(&self, query: &str) -> Result<u64> {
        let result = sqlx::query(query).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    /// Execute a script of `;`-separated statements (schema setup)
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` on the first failing statement.
    pub async fn execute_batch(&self, script: &str) -> Result<()> {
        sqlx::Executor::execute(&self.pool, script).await?;
        Ok(())
    }

    /// Fetch all rows as column-name maps
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` if the query fails.
    pub async fn fetch_all(&self, query: &str) -> Result<Vec<HashMap<String, DbValue>>> {
        let rows: Vec<SqliteRow> = sqlx::query(query).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_map).collect())
    }

    /// Fetch at most one row
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` if the query fails.
    pub async fn fetch_optional(&self, query: &str) -> Result<Option<HashMap<String, DbValue>>> {
        let row: Option<SqliteRow> = sqlx::query(query).fetch_optional(&self.pool).await?;
        Ok(row.as_ref().map(row_to_map))
    }

    /// Open a read session for one unit of work
    #[must_use]
    pub fn session(&self) -> Session {
        Session::new(self.pool.clone(), SessionMode::Read)
    }

    /// Open a session that takes the write lock when it begins
    #[must_use]
    pub fn write_session(&self) -> Session {
        Session::new(self.pool.clone(), SessionMode::Write)
    }

    /// Close the pool, waiting for checked-out connections to return
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn is_memory_url(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

/// How a [`Session`] begins its transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// `BEGIN`: locks are taken as statements need them
    Read,
    /// `BEGIN IMMEDIATE`: the write lock is held from the start
    Write,
}

/// One request's unit of work
///
/// Holds at most one open transaction. Queries run through
/// [`Session::connection`]; nothing is persisted until [`Session::commit`].
pub struct Session {
    pool: SqlitePool,
    mode: SessionMode,
    tx: Option<Transaction<'static, Sqlite>>,
}

impl Session {
    const fn new(pool: SqlitePool, mode: SessionMode) -> Self {
        Self {
            pool,
            mode,
            tx: None,
        }
    }

    /// How this session begins transactions
    #[must_use]
    pub const fn mode(&self) -> SessionMode {
        self.mode
    }

    /// Connection inside the session's transaction, beginning it if needed
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` if no connection can be acquired.
    pub async fn connection(&mut self) -> Result<&mut SqliteConnection> {
        let tx = match self.tx.take() {
            Some(tx) => tx,
            None => {
                debug!(mode = ?self.mode, "session: begin");
                match self.mode {
                    SessionMode::Read => self.pool.begin().await?,
                    SessionMode::Write => self.pool.begin_with("BEGIN IMMEDIATE").await?,
                }
            }
        };
        Ok(&mut **self.tx.insert(tx))
    }

    /// Commit the open transaction, if any
    ///
    /// The session stays usable; the next query begins a new transaction.
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` if the commit fails.
    pub async fn commit(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.commit().await?;
            debug!("session: commit");
        }
        Ok(())
    }

    /// Roll back the open transaction, if any
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` if the rollback fails.
    pub async fn rollback(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
            debug!("session: rollback");
        }
        Ok(())
    }

    /// Whether a transaction is currently open
    #[must_use]
    pub const fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("mode", &self.mode)
            .field("in_transaction", &self.in_transaction())
            .finish_non_exhaustive()
    }
}

/// Loosely typed column value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DbValue {
    /// NULL
    Null,
    /// INTEGER
    Int(i64),
    /// REAL
    Float(f64),
    /// TEXT
    String(String),
    /// BOOLEAN
    Bool(bool),
    /// BLOB
    Bytes(Vec<u8>),
}

fn row_to_map(row: &SqliteRow) -> HashMap<String, DbValue> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, column)| {
            let value = match column.type_info().name() {
                "INTEGER" => row.try_get::<i64, _>(i).map(DbValue::Int),
                "REAL" => row.try_get::<f64, _>(i).map(DbValue::Float),
                "BOOLEAN" => row.try_get::<bool, _>(i).map(DbValue::Bool),
                "BLOB" => row.try_get::<Vec<u8>, _>(i).map(DbValue::Bytes),
                _ => row.try_get::<String, _>(i).map(DbValue::String),
            }
            .unwrap_or(DbValue::Null);
            (column.name().to_string(), value)
        })
        .collect()
}
