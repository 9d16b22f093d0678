//! Connect, migrate and hand the database over to the service.

use crate::error::{MigrateError, MigrateResult};
use crate::hooks::{LegacyMigration, MigrationHook, VersionedMigration};
use crate::orchestrator::{Migration, MigrationReport};
use mf_core::{ConnectionOptions, ForeignDatabase};
use mf_db::{
    handle_database_error, retry_exponential, Connector, Database, DbError, Liveness,
    Remediation, INITIAL_RETRY_WAIT, NUM_CONNECT_ATTEMPTS,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// A connected, migrated database
pub struct Ready {
    pub db: Arc<dyn Database>,
    /// Migration result; only an `Err` when `halt_on_error` is unset
    pub migration: MigrateResult<MigrationReport>,
}

/// Brings up the database for a service.
///
/// Connects with exponential backoff, runs the migration and delivers the
/// handle. Cheap to clone; clones share the hook and liveness sink.
#[derive(Clone)]
pub struct Bootstrap {
    opts: ConnectionOptions,
    connector: Arc<dyn Connector>,
    hook: Option<MigrationHook>,
    foreign_db: Option<ForeignDatabase>,
    liveness: Liveness,
    attempts: u32,
    initial_wait: Duration,
}

impl Bootstrap {
    pub fn new(opts: ConnectionOptions, connector: Arc<dyn Connector>) -> Self {
        Self {
            opts,
            connector,
            hook: None,
            foreign_db: None,
            liveness: Liveness::new(),
            attempts: NUM_CONNECT_ATTEMPTS,
            initial_wait: INITIAL_RETRY_WAIT,
        }
    }

    pub fn with_hook(mut self, hook: MigrationHook) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Register hooks by shape; both at once is a configuration error
    pub fn with_migrations(
        mut self,
        legacy: Option<Arc<dyn LegacyMigration>>,
        versioned: Option<Arc<dyn VersionedMigration>>,
    ) -> MigrateResult<Self> {
        self.hook = MigrationHook::from_parts(legacy, versioned)?;
        Ok(self)
    }

    pub fn with_foreign_database(mut self, foreign_db: ForeignDatabase) -> Self {
        self.foreign_db = Some(foreign_db);
        self
    }

    pub fn with_liveness(mut self, liveness: Liveness) -> Self {
        self.liveness = liveness;
        self
    }

    /// Override the connection retry policy
    pub fn with_retry(mut self, attempts: u32, initial_wait: Duration) -> Self {
        self.attempts = attempts;
        self.initial_wait = initial_wait;
        self
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.opts
    }

    pub fn liveness(&self) -> &Liveness {
        &self.liveness
    }

    /// Connect and migrate in the background.
    ///
    /// The receiver yields the handle once it is ready to serve. It closes
    /// without a value when connecting fails, when `run` is cancelled, or
    /// when migration fails with `halt_on_error` set.
    pub fn initialize(&self, run: CancellationToken) -> oneshot::Receiver<Arc<dyn Database>> {
        let (tx, rx) = oneshot::channel();
        let this = self.clone();
        tokio::spawn(async move {
            // failures are logged where they happen
            if let Ok(ready) = this.connect_and_migrate(&run).await {
                if tx.send(ready.db).is_err() {
                    log::warn!("database is up but nobody is waiting for it");
                }
            }
        });
        rx
    }

    /// Connect and migrate inline
    pub async fn connect_and_migrate(&self, run: &CancellationToken) -> MigrateResult<Ready> {
        let db = self.connect(run).await?;

        let watched = db.clone();
        let token = run.clone();
        tokio::spawn(async move {
            token.cancelled().await;
            watched.close().await;
            log::info!("database connection closed");
        });

        let migration = match self.migrate(db.as_ref(), run).await {
            Err(e) if self.opts.halt_on_error() => {
                log::error!("database migration failed - aborting: {e}");
                db.close().await;
                self.liveness.set_dead();
                return Err(e);
            }
            Err(e) => {
                log::warn!("database migration failed - continuing: {e}");
                Err(e)
            }
            Ok(report) => Ok(report),
        };
        log::info!("database migration finished");

        log::info!(
            "database connection is up and configured (max_open={}, max_idle={}, max_lifetime={:?})",
            self.opts.max_open(),
            self.opts.max_idle(),
            self.opts.max_lifetime()
        );
        self.liveness.set_live();
        Ok(Ready { db, migration })
    }

    /// Report errors a service hit on the live handle.
    ///
    /// Updates the liveness sink and re-runs the migration when a relation
    /// turned out to be missing. The schema is assumed lost, so a once-only
    /// legacy hook is called again.
    pub async fn handle_database_errors(
        &self,
        db: &dyn Database,
        errors: &[DbError],
    ) -> MigrateResult<Remediation> {
        let remediation = handle_database_error(&self.liveness, errors);
        if remediation == Remediation::Remigrate {
            log::info!("re-running database migration");
            if let Some(hook) = &self.hook {
                hook.rearm();
            }
            self.migrate(db, &CancellationToken::new()).await?;
        }
        Ok(remediation)
    }

    async fn connect(&self, run: &CancellationToken) -> MigrateResult<Arc<dyn Database>> {
        let result = retry_exponential(run, self.attempts, self.initial_wait, || {
            self.connector.connect(&self.opts)
        })
        .await;

        result.map_err(|e| {
            match &e {
                DbError::Cancelled => log::warn!("{e}"),
                _ => log::error!("could not connect to DB {}: {e}", self.opts.redacted()),
            }
            self.liveness.set_dead();
            MigrateError::Database(e)
        })
    }

    async fn migrate(
        &self,
        db: &dyn Database,
        run: &CancellationToken,
    ) -> MigrateResult<MigrationReport> {
        let mut migration = Migration::for_hook(&self.opts, self.hook.as_ref());
        if let Some(foreign_db) = &self.foreign_db {
            migration = migration.with_foreign_database(foreign_db.clone());
        }
        migration
            .run(
                db,
                self.hook.as_ref(),
                self.opts.migration_version(),
                self.opts.start_from_zero(),
                run,
            )
            .await
    }
}

#[cfg(test)]
#[path = "bootstrap_test.rs"]
mod tests;
