//! mf-db - Database abstraction layer for Migraflow
//!
//! This crate provides the `Database` trait, a pooled DuckDB
//! implementation, the `Connector` used to open it with exponential
//! backoff, and the liveness sink that database errors are reported to.

pub mod connector;
pub mod duckdb;
pub mod error;
pub mod pool;
pub mod probe;
pub mod retry;
pub(crate) mod row_helpers;
pub mod traits;

pub use connector::{Connector, DuckDbConnector};
pub use duckdb::DuckDbBackend;
pub use error::{DbError, DbResult, ErrorClass};
pub use pool::{PoolLimits, PoolStats};
pub use probe::{handle_database_error, Liveness, Remediation};
pub use retry::{retry_exponential, INITIAL_RETRY_WAIT, NUM_CONNECT_ATTEMPTS};
pub use traits::Database;
