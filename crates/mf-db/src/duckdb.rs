//! DuckDB database backend implementation

use crate::error::{DbError, DbResult};
use crate::pool::{Pool, PoolLimits, PoolStats};
use crate::row_helpers::collect_rows;
use crate::traits::Database;
use async_trait::async_trait;
use duckdb::Connection;
use std::path::Path;

/// DuckDB database backend over a bounded connection pool
pub struct DuckDbBackend {
    pool: Pool,
}

impl DuckDbBackend {
    /// Create a new in-memory DuckDB database
    pub fn in_memory() -> DbResult<Self> {
        Self::in_memory_with_limits(PoolLimits::default())
    }

    /// Create a new in-memory DuckDB database with explicit pool limits
    pub fn in_memory_with_limits(limits: PoolLimits) -> DbResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self {
            pool: Pool::new(conn, limits),
        })
    }

    /// Open (or create) a DuckDB database file
    pub fn from_path(path: &Path, limits: PoolLimits) -> DbResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| DbError::ConnectionError(format!("{e}: {}", path.display())))?;
        Ok(Self {
            pool: Pool::new(conn, limits),
        })
    }

    /// Create from path string (handles :memory: special case)
    pub fn new(path: &str, limits: PoolLimits) -> DbResult<Self> {
        if path == ":memory:" {
            Self::in_memory_with_limits(limits)
        } else {
            Self::from_path(Path::new(path), limits)
        }
    }

    /// Pool limits this backend was opened with
    pub fn pool_limits(&self) -> PoolLimits {
        self.pool.limits()
    }

    /// Current pool usage
    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }
}

#[async_trait]
impl Database for DuckDbBackend {
    async fn execute(&self, sql: &str) -> DbResult<usize> {
        let checkout = self.pool.checkout().await?;
        checkout
            .conn()?
            .execute(sql, [])
            .map_err(|e| DbError::from(e).with_sql(sql))
    }

    async fn execute_batch(&self, sql: &str) -> DbResult<()> {
        let checkout = self.pool.checkout().await?;
        checkout.conn()?.execute_batch(sql).map_err(DbError::from)
    }

    async fn relation_exists(&self, name: &str) -> DbResult<bool> {
        // Handle schema-qualified names
        let (schema, table) = match name.rfind('.') {
            Some(pos) => (&name[..pos], &name[pos + 1..]),
            None => ("main", name),
        };

        let checkout = self.pool.checkout().await?;
        let count: i64 = checkout.conn()?.query_row(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = ? AND table_name = ?",
            duckdb::params![schema, table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    async fn query_count(&self, sql: &str) -> DbResult<usize> {
        let checkout = self.pool.checkout().await?;
        let count: i64 =
            checkout
                .conn()?
                .query_row(&format!("SELECT COUNT(*) FROM ({})", sql), [], |row| {
                    row.get(0)
                })?;
        usize::try_from(count).map_err(|e| DbError::Internal(e.to_string()))
    }

    async fn query_rows(&self, sql: &str) -> DbResult<Vec<Vec<String>>> {
        let checkout = self.pool.checkout().await?;
        collect_rows(checkout.conn()?, sql)
    }

    async fn ping(&self) -> DbResult<()> {
        let checkout = self.pool.checkout().await?;
        checkout
            .conn()?
            .execute_batch("SELECT 1")
            .map_err(|e| DbError::ConnectionError(e.to_string()))
    }

    async fn close(&self) {
        self.pool.close();
    }

    fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    fn db_type(&self) -> &'static str {
        "duckdb"
    }
}

impl DbError {
    /// Attach the offending statement to execution errors
    fn with_sql(self, sql: &str) -> Self {
        match self {
            DbError::ExecutionError(msg) => DbError::ExecutionError(format!("{msg}: {sql}")),
            other => other,
        }
    }
}

#[cfg(test)]
#[path = "duckdb_test.rs"]
mod tests;
