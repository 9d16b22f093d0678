//! Migration hooks: user code run against the live database.
//!
//! A versioned hook is called once per pending version between that
//! version's before- and after-scripts. A legacy hook does not know about
//! versions: it runs once per migration through a [`LegacyAdapter`], ahead
//! of the numbered `.up.sql` / `.down.sql` steps when a target is set.

use crate::error::{MigrateError, MigrateResult};
use async_trait::async_trait;
use mf_core::Version;
use mf_db::Database;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Error returned by user hooks
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

pub type HookResult = Result<(), HookError>;

/// Version-aware migration hook
#[async_trait]
pub trait VersionedMigration: Send + Sync {
    async fn migrate(&self, db: &dyn Database, version: Version) -> HookResult;
}

/// Version-oblivious migration hook
#[async_trait]
pub trait LegacyMigration: Send + Sync {
    async fn migrate(&self, db: &dyn Database) -> HookResult;
}

/// Presents a [`LegacyMigration`] as a [`VersionedMigration`] that ignores
/// the version.
pub struct LegacyAdapter {
    inner: Arc<dyn LegacyMigration>,
    once: bool,
    called: AtomicBool,
}

impl LegacyAdapter {
    /// Call `inner` on the first invocation only; later calls succeed
    /// without doing anything.
    pub fn once(inner: Arc<dyn LegacyMigration>) -> Self {
        Self {
            inner,
            once: true,
            called: AtomicBool::new(false),
        }
    }

    /// Call `inner` on every invocation
    pub fn every_call(inner: Arc<dyn LegacyMigration>) -> Self {
        Self {
            inner,
            once: false,
            called: AtomicBool::new(false),
        }
    }

    /// Whether the wrapped hook has completed successfully at least once
    pub fn has_run(&self) -> bool {
        self.called.load(Ordering::SeqCst)
    }

    /// Let a once-only adapter call its hook again
    pub fn reset(&self) {
        self.called.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl VersionedMigration for LegacyAdapter {
    async fn migrate(&self, db: &dyn Database, _version: Version) -> HookResult {
        if self.once && self.has_run() {
            log::debug!("legacy migration already ran, skipping");
            return Ok(());
        }
        // a failed call leaves the adapter armed for the next run
        self.inner.migrate(db).await?;
        self.called.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// The one hook registered for a run
#[derive(Clone)]
pub enum MigrationHook {
    Legacy(Arc<LegacyAdapter>),
    Versioned(Arc<dyn VersionedMigration>),
}

impl MigrationHook {
    /// Resolve the registered hook, if any.
    ///
    /// Registering both shapes is a configuration error.
    pub fn from_parts(
        legacy: Option<Arc<dyn LegacyMigration>>,
        versioned: Option<Arc<dyn VersionedMigration>>,
    ) -> MigrateResult<Option<Self>> {
        match (legacy, versioned) {
            (Some(_), Some(_)) => Err(MigrateError::Config(
                "both a legacy and a versioned migration hook are set; configure only one migration flow"
                    .to_string(),
            )),
            (Some(legacy), None) => Ok(Some(Self::legacy(legacy))),
            (None, Some(versioned)) => Ok(Some(Self::Versioned(versioned))),
            (None, None) => Ok(None),
        }
    }

    /// Legacy hook that runs once per process
    pub fn legacy(inner: Arc<dyn LegacyMigration>) -> Self {
        Self::Legacy(Arc::new(LegacyAdapter::once(inner)))
    }

    /// Legacy hook that runs on every migration
    pub fn legacy_every_call(inner: Arc<dyn LegacyMigration>) -> Self {
        Self::Legacy(Arc::new(LegacyAdapter::every_call(inner)))
    }

    pub fn versioned(inner: Arc<dyn VersionedMigration>) -> Self {
        Self::Versioned(inner)
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, Self::Legacy(_))
    }

    /// Re-enable a once-only legacy hook, e.g. before rebuilding a lost schema
    pub fn rearm(&self) {
        if let Self::Legacy(adapter) = self {
            adapter.reset();
        }
    }

    /// The hook as called by the orchestrator
    pub(crate) fn as_versioned(&self) -> &dyn VersionedMigration {
        match self {
            Self::Legacy(adapter) => adapter.as_ref(),
            Self::Versioned(hook) => hook.as_ref(),
        }
    }
}

impl std::fmt::Debug for MigrationHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Legacy(_) => f.write_str("MigrationHook::Legacy"),
            Self::Versioned(_) => f.write_str("MigrationHook::Versioned"),
        }
    }
}
