//! In-memory catalog store.
//!
//! [`MemoryDatabase`] understands exactly the statements built by
//! [`crate::schema`]: create (plain and `LIKE`), multi-row insert, drop, and
//! multi-table rename. It keeps a log of every statement it was asked to run,
//! can be told to reject statements by prefix, and counts how many
//! connections were handed out and released. The CLI uses it for dry runs.

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock, Mutex, PoisonError};

use async_trait::async_trait;
use regex::Regex;
use switchy_database::DatabaseValue;

use crate::{Connector, DbError, SqlExecutor};

static CREATE_LIKE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^CREATE TABLE IF NOT EXISTS `([A-Za-z0-9_]+)` LIKE `([A-Za-z0-9_]+)`$")
        .unwrap_or_else(|_| unreachable!())
});
static CREATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^CREATE TABLE IF NOT EXISTS `([A-Za-z0-9_]+)` \(").unwrap_or_else(|_| unreachable!())
});
static COLUMN_DEF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^  `([A-Za-z0-9_]+)` ").unwrap_or_else(|_| unreachable!())
});
static INSERT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^INSERT INTO `([A-Za-z0-9_]+)` \(([^)]*)\) VALUES ")
        .unwrap_or_else(|_| unreachable!())
});
static DROP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^DROP TABLE IF EXISTS `([A-Za-z0-9_]+)`$").unwrap_or_else(|_| unreachable!())
});
static RENAME_PAIR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^`([A-Za-z0-9_]+)` TO `([A-Za-z0-9_]+)`$").unwrap_or_else(|_| unreachable!())
});

/// A stored cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellValue {
    /// SQL `NULL`
    Null,
    /// Integer column value
    Int(i64),
    /// Text column value
    Text(String),
}

impl CellValue {
    fn from_param(value: &DatabaseValue) -> Result<Self, DbError> {
        Ok(match value {
            DatabaseValue::Null => Self::Null,
            DatabaseValue::String(s) => Self::Text(s.clone()),
            DatabaseValue::Int32(i) => Self::Int(i64::from(*i)),
            DatabaseValue::Int64(i) => Self::Int(*i),
            DatabaseValue::Bool(b) => Self::Int(i64::from(*b)),
            _ => {
                return Err(DbError::Statement {
                    message: "unsupported parameter type".to_string(),
                });
            }
        })
    }

    /// Returns the text content, if this is a text cell.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// One stored row, keyed by column name.
pub type Row = BTreeMap<String, CellValue>;

#[derive(Debug, Clone, Default)]
struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
    next_row_id: i64,
}

#[derive(Debug, Default)]
struct State {
    tables: BTreeMap<String, Table>,
    statements: Vec<String>,
    insert_batches: Vec<usize>,
    fail_prefix: Option<String>,
    opened: usize,
    released: usize,
}

impl State {
    fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> Result<u64, DbError> {
        self.statements.push(sql.to_string());

        if let Some(prefix) = &self.fail_prefix
            && sql.starts_with(prefix.as_str())
        {
            return Err(DbError::Statement {
                message: format!("injected failure for statement starting with {prefix:?}"),
            });
        }

        if let Some(caps) = CREATE_LIKE_RE.captures(sql) {
            return self.create_like(&caps[1], &caps[2]);
        }
        if let Some(caps) = CREATE_RE.captures(sql) {
            let columns = COLUMN_DEF_RE
                .captures_iter(sql)
                .map(|c| c[1].to_string())
                .collect();
            self.tables
                .entry(caps[1].to_string())
                .or_insert_with(|| Table {
                    columns,
                    ..Table::default()
                });
            return Ok(0);
        }
        if let Some(caps) = INSERT_RE.captures(sql) {
            let columns: Vec<String> = caps[2]
                .split(',')
                .map(|c| c.trim().trim_matches('`').to_string())
                .collect();
            return self.insert(&caps[1], &columns, params);
        }
        if let Some(caps) = DROP_RE.captures(sql) {
            self.tables.remove(&caps[1]);
            return Ok(0);
        }
        if let Some(renames) = sql.strip_prefix("RENAME TABLE ") {
            return self.rename(renames);
        }

        Err(DbError::Statement {
            message: format!("unsupported statement: {sql}"),
        })
    }

    fn create_like(&mut self, table: &str, template: &str) -> Result<u64, DbError> {
        if self.tables.contains_key(table) {
            return Ok(0);
        }
        let columns = self
            .tables
            .get(template)
            .ok_or_else(|| DbError::Statement {
                message: format!("table {template} does not exist"),
            })?
            .columns
            .clone();
        self.tables.insert(
            table.to_string(),
            Table {
                columns,
                ..Table::default()
            },
        );
        Ok(0)
    }

    fn insert(
        &mut self,
        table: &str,
        columns: &[String],
        params: &[DatabaseValue],
    ) -> Result<u64, DbError> {
        if columns.is_empty() || params.len() % columns.len() != 0 {
            return Err(DbError::Statement {
                message: format!(
                    "{} parameters do not fill rows of {} columns",
                    params.len(),
                    columns.len()
                ),
            });
        }

        let cells = params
            .iter()
            .map(CellValue::from_param)
            .collect::<Result<Vec<_>, _>>()?;

        let target = self
            .tables
            .get_mut(table)
            .ok_or_else(|| DbError::Statement {
                message: format!("table {table} does not exist"),
            })?;

        if let Some(unknown) = columns.iter().find(|c| !target.columns.contains(*c)) {
            return Err(DbError::Statement {
                message: format!("unknown column {unknown} in {table}"),
            });
        }

        let mut inserted = 0u64;
        for values in cells.chunks(columns.len()) {
            target.next_row_id += 1;
            let mut row: Row = columns.iter().cloned().zip(values.iter().cloned()).collect();
            row.insert("row_id".to_string(), CellValue::Int(target.next_row_id));
            target.rows.push(row);
            inserted += 1;
        }

        self.insert_batches.push(cells.len() / columns.len());
        Ok(inserted)
    }

    /// Applies all renames or none, left to right, like MySQL.
    fn rename(&mut self, renames: &str) -> Result<u64, DbError> {
        let mut tables = self.tables.clone();

        for pair in renames.split(", ") {
            let caps = RENAME_PAIR_RE
                .captures(pair)
                .ok_or_else(|| DbError::Statement {
                    message: format!("unsupported rename clause: {pair}"),
                })?;
            let (from, to) = (&caps[1], &caps[2]);

            if tables.contains_key(to) {
                return Err(DbError::Statement {
                    message: format!("table {to} already exists"),
                });
            }
            let table = tables.remove(from).ok_or_else(|| DbError::Statement {
                message: format!("table {from} does not exist"),
            })?;
            tables.insert(to.to_string(), table);
        }

        self.tables = tables;
        Ok(0)
    }
}

/// Shared in-memory store. Clones observe the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<Mutex<State>>,
}

impl MemoryDatabase {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hands out a connection. Dropping it counts as a release.
    #[must_use]
    pub fn connection(&self) -> MemoryConnection {
        self.lock().opened += 1;
        MemoryConnection {
            state: Arc::clone(&self.state),
        }
    }

    /// Makes every subsequent statement starting with `prefix` fail.
    pub fn fail_statements_starting_with(&self, prefix: &str) {
        self.lock().fail_prefix = Some(prefix.to_string());
    }

    /// Stops injecting failures.
    pub fn clear_failures(&self) {
        self.lock().fail_prefix = None;
    }

    /// Every statement attempted so far, including rejected ones.
    #[must_use]
    pub fn statements(&self) -> Vec<String> {
        self.lock().statements.clone()
    }

    /// Row count of each successful `INSERT`, in order.
    #[must_use]
    pub fn insert_batch_sizes(&self) -> Vec<usize> {
        self.lock().insert_batches.clone()
    }

    /// Names of existing tables, sorted.
    #[must_use]
    pub fn tables(&self) -> Vec<String> {
        self.lock().tables.keys().cloned().collect()
    }

    /// Whether `table` exists.
    #[must_use]
    pub fn has_table(&self, table: &str) -> bool {
        self.lock().tables.contains_key(table)
    }

    /// Number of rows in `table`, or `None` if it does not exist.
    #[must_use]
    pub fn row_count(&self, table: &str) -> Option<usize> {
        self.lock().tables.get(table).map(|t| t.rows.len())
    }

    /// All rows of `table` in insertion order.
    #[must_use]
    pub fn rows(&self, table: &str) -> Option<Vec<Row>> {
        self.lock().tables.get(table).map(|t| t.rows.clone())
    }

    /// Number of connections handed out.
    #[must_use]
    pub fn connections_opened(&self) -> usize {
        self.lock().opened
    }

    /// Number of connections dropped.
    #[must_use]
    pub fn connections_released(&self) -> usize {
        self.lock().released
    }
}

#[async_trait]
impl Connector for MemoryDatabase {
    async fn connect(&self) -> Result<Box<dyn SqlExecutor>, DbError> {
        Ok(Box::new(self.connection()))
    }
}

/// A connection to a [`MemoryDatabase`].
#[derive(Debug)]
pub struct MemoryConnection {
    state: Arc<Mutex<State>>,
}

#[async_trait]
impl SqlExecutor for MemoryConnection {
    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> Result<u64, DbError> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .execute(sql, params)
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .released += 1;
    }
}
