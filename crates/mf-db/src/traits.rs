//! Database trait definition

use crate::error::DbResult;
use async_trait::async_trait;

/// Database abstraction trait for Migraflow
///
/// Implementations must be Send + Sync for async operation. The live
/// handle is shared as `Arc<dyn Database>`; components borrow it per call.
#[async_trait]
pub trait Database: Send + Sync {
    /// Execute SQL that modifies data, returns affected rows
    async fn execute(&self, sql: &str) -> DbResult<usize>;

    /// Execute multiple SQL statements
    async fn execute_batch(&self, sql: &str) -> DbResult<()>;

    /// Check if a table or view exists
    async fn relation_exists(&self, name: &str) -> DbResult<bool>;

    /// Execute query returning row count
    async fn query_count(&self, sql: &str) -> DbResult<usize>;

    /// Execute a query and return every row with values coerced to strings
    async fn query_rows(&self, sql: &str) -> DbResult<Vec<Vec<String>>>;

    /// Round-trip to check the connection is usable
    async fn ping(&self) -> DbResult<()>;

    /// Close the handle; later calls fail with [`crate::DbError::Closed`]
    async fn close(&self);

    /// Whether [`Database::close`] has been called
    fn is_closed(&self) -> bool;

    /// Database type identifier for logging
    fn db_type(&self) -> &'static str;
}
