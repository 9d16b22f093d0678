//! Bounded pool of DuckDB connections.
//!
//! Every pooled connection is a `try_clone` of one root connection, so all
//! of them see the same database (including `:memory:`). At most
//! `max_open` connections are checked out at once; returned connections
//! are kept idle up to `max_idle` and discarded once older than
//! `max_lifetime`.

use crate::error::{DbError, DbResult};
use duckdb::Connection;
use mf_core::ConnectionOptions;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Pool sizing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolLimits {
    pub max_open: usize,
    pub max_idle: usize,
    /// Zero means connections are reused forever
    pub max_lifetime: Duration,
}

impl Default for PoolLimits {
    fn default() -> Self {
        Self::from(&ConnectionOptions::default())
    }
}

impl From<&ConnectionOptions> for PoolLimits {
    fn from(opts: &ConnectionOptions) -> Self {
        Self {
            max_open: opts.max_open(),
            max_idle: opts.max_idle(),
            max_lifetime: opts.max_lifetime(),
        }
    }
}

/// Snapshot of pool usage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub idle: usize,
    pub in_use: usize,
}

struct PooledConn {
    conn: Connection,
    created: Instant,
}

impl PooledConn {
    fn expired(&self, max_lifetime: Duration) -> bool {
        !max_lifetime.is_zero() && self.created.elapsed() >= max_lifetime
    }
}

pub(crate) struct Pool {
    root: Mutex<Option<Connection>>,
    idle: Mutex<Vec<PooledConn>>,
    permits: Arc<Semaphore>,
    limits: PoolLimits,
    closed: AtomicBool,
}

impl Pool {
    pub(crate) fn new(root: Connection, limits: PoolLimits) -> Self {
        let max_open = limits.max_open.max(1);
        Self {
            root: Mutex::new(Some(root)),
            idle: Mutex::new(Vec::new()),
            permits: Arc::new(Semaphore::new(max_open)),
            limits: PoolLimits { max_open, ..limits },
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn limits(&self) -> PoolLimits {
        self.limits
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Wait for a free slot and hand out a connection
    pub(crate) async fn checkout(&self) -> DbResult<Checkout<'_>> {
        if self.is_closed() {
            return Err(DbError::Closed);
        }
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| DbError::Closed)?;

        let reused = {
            let mut idle = self
                .idle
                .lock()
                .map_err(|e| DbError::MutexPoisoned(e.to_string()))?;
            let mut found = None;
            while let Some(candidate) = idle.pop() {
                if candidate.expired(self.limits.max_lifetime) {
                    log::debug!("discarding connection past its max lifetime");
                    continue;
                }
                found = Some(candidate);
                break;
            }
            found
        };

        let conn = match reused {
            Some(conn) => conn,
            None => self.open_conn()?,
        };

        Ok(Checkout {
            pool: self,
            conn: Some(conn),
            _permit: permit,
        })
    }

    fn open_conn(&self) -> DbResult<PooledConn> {
        let root = self
            .root
            .lock()
            .map_err(|e| DbError::MutexPoisoned(e.to_string()))?;
        let root = root.as_ref().ok_or(DbError::Closed)?;
        let conn = root
            .try_clone()
            .map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(PooledConn {
            conn,
            created: Instant::now(),
        })
    }

    fn checkin(&self, conn: PooledConn) {
        if self.is_closed() || conn.expired(self.limits.max_lifetime) {
            return;
        }
        if let Ok(mut idle) = self.idle.lock() {
            if idle.len() < self.limits.max_idle {
                idle.push(conn);
            }
        }
    }

    pub(crate) fn stats(&self) -> PoolStats {
        let idle = self.idle.lock().map(|idle| idle.len()).unwrap_or(0);
        let available = if self.is_closed() {
            self.limits.max_open
        } else {
            self.permits.available_permits()
        };
        PoolStats {
            idle,
            in_use: self.limits.max_open.saturating_sub(available),
        }
    }

    /// Drop every idle connection and the root; pending checkouts fail
    pub(crate) fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.permits.close();
        if let Ok(mut idle) = self.idle.lock() {
            idle.clear();
        }
        if let Ok(mut root) = self.root.lock() {
            root.take();
        }
    }
}

/// A checked-out connection, returned to the pool on drop
pub(crate) struct Checkout<'a> {
    pool: &'a Pool,
    conn: Option<PooledConn>,
    _permit: OwnedSemaphorePermit,
}

impl Checkout<'_> {
    pub(crate) fn conn(&self) -> DbResult<&Connection> {
        self.conn
            .as_ref()
            .map(|c| &c.conn)
            .ok_or_else(|| DbError::Internal("checked-out connection missing".to_string()))
    }
}

impl Drop for Checkout<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.checkin(conn);
        }
    }
}
