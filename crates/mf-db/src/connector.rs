//! Opening live database handles from connection options

use crate::duckdb::DuckDbBackend;
use crate::error::DbResult;
use crate::pool::PoolLimits;
use crate::traits::Database;
use async_trait::async_trait;
use mf_core::ConnectionOptions;
use std::sync::Arc;

/// Opens a live handle for the given options.
///
/// One call is one connection attempt; retrying is the caller's concern
/// (see [`crate::retry::retry_exponential`]).
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, opts: &ConnectionOptions) -> DbResult<Arc<dyn Database>>;
}

/// Connector for DuckDB; `database_name` is the database path
#[derive(Debug, Clone, Copy, Default)]
pub struct DuckDbConnector;

#[async_trait]
impl Connector for DuckDbConnector {
    async fn connect(&self, opts: &ConnectionOptions) -> DbResult<Arc<dyn Database>> {
        log::debug!("Attempting to connect to DB: {}", opts.redacted());
        let backend = DuckDbBackend::new(opts.database_name(), PoolLimits::from(opts))?;
        backend.ping().await?;
        Ok(Arc::new(backend))
    }
}
