#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Staging table lifecycle for the catalog table.
//!
//! Every refresh writes into a freshly named staging table and then promotes
//! it over the live table. Statements go through the narrow [`SqlExecutor`]
//! seam so the same code runs against MySQL (via `switchy_database`) and
//! against [`memory::MemoryDatabase`].

pub mod db;
pub mod memory;
pub mod schema;
pub mod staging;

use async_trait::async_trait;
use switchy_database::DatabaseValue;

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Database query error.
    #[error("Database error: {0}")]
    Database(#[from] switchy_database::DatabaseError),

    /// Opening the connection failed.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of what went wrong.
        message: String,
    },

    /// A table name that cannot be safely interpolated into SQL.
    #[error("Invalid table name {name:?}")]
    InvalidIdentifier {
        /// The rejected name.
        name: String,
    },

    /// A statement was rejected by the store.
    #[error("Statement failed: {message}")]
    Statement {
        /// Description of what went wrong.
        message: String,
    },
}

/// Executes parameterized statements that do not return rows.
///
/// This is the only capability the staging lifecycle needs from a store.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Executes one statement and returns the number of affected rows.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the store rejects the statement.
    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> Result<u64, DbError>;
}

/// Hands out store connections. Each call opens a new one; dropping the
/// returned executor releases it.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a connection.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Connection`] if the store cannot be reached.
    async fn connect(&self) -> Result<Box<dyn SqlExecutor>, DbError>;
}

/// [`SqlExecutor`] over a `switchy_database` connection.
pub struct DatabaseExecutor {
    db: Box<dyn switchy_database::Database>,
}

impl DatabaseExecutor {
    /// Wraps an open connection.
    #[must_use]
    pub fn new(db: Box<dyn switchy_database::Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SqlExecutor for DatabaseExecutor {
    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> Result<u64, DbError> {
        if params.is_empty() {
            self.db.exec_raw(sql).await?;
            return Ok(0);
        }
        Ok(self.db.exec_raw_params(sql, params).await?)
    }
}
