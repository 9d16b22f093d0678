//! Liveness sink fed by database errors.
//!
//! A service exposes [`Liveness::is_live`] to its health endpoint; the
//! bootstrap flips it once the database is connected and migrated, and
//! [`handle_database_error`] flips it back when the database goes away.

use crate::error::{DbError, ErrorClass};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared live/dead flag. Starts dead.
#[derive(Debug, Clone, Default)]
pub struct Liveness {
    live: Arc<AtomicBool>,
}

impl Liveness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_live(&self) {
        self.live.store(true, Ordering::SeqCst);
    }

    pub fn set_dead(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

/// What the caller should do after a batch of errors was classified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remediation {
    None,
    /// A relation the schema should have is missing; run migration again
    Remigrate,
}

/// Classify errors reported by a service and update `liveness`.
///
/// Connection loss and client exhaustion mark the service dead. A missing
/// relation asks for a re-migration. Other errors are only logged.
pub fn handle_database_error<'a>(
    liveness: &Liveness,
    errors: impl IntoIterator<Item = &'a DbError>,
) -> Remediation {
    let mut remediation = Remediation::None;
    for err in errors {
        match err.class() {
            ErrorClass::Connection => {
                log::error!("lost connection to the database: {err}");
                liveness.set_dead();
            }
            ErrorClass::TooManyClients => {
                log::error!("database refused the connection: {err}");
                liveness.set_dead();
            }
            ErrorClass::MissingRelation => {
                log::warn!("missing relation, schema needs migrating: {err}");
                remediation = Remediation::Remigrate;
            }
            ErrorClass::Other => log::info!("database error: {err}"),
        }
    }
    remediation
}
