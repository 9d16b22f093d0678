//! Versioned migration orchestrator.
//!
//! A run is strictly ordered:
//!
//! 1. `setup.sql`
//! 2. `fdw.up.sql`, rendered against the foreign database when configured
//! 3. the version steps
//! 4. `fdw.down.sql`, attempted exactly once whenever step 2 succeeded
//!
//! With a versioned hook, or none, step 3 walks every version up to the
//! target: before-script, up-script, hook, after-script, record. Progress
//! is recorded only after a version's whole sequence succeeds, so a failed
//! step is retried from its before-script on the next run.
//!
//! A legacy hook runs once instead, and then the numbered scripts move the
//! schema to the target in either direction, one scripted version at a
//! time. Each of those steps marks the table dirty before touching the
//! schema, so an interrupted step blocks later runs until it is forced.

use crate::error::{MigrateError, MigrateResult};
use crate::hooks::MigrationHook;
use crate::scripts::{
    discover, find_version_script, ScriptKind, FDW_DOWN_SCRIPT, FDW_UP_SCRIPT, SETUP_SCRIPT,
};
use crate::tracker::{resolve_version, MetadataTable, VersionTracker};
use mf_core::{ConnectionOptions, ForeignDatabase, Version};
use mf_db::Database;
use mf_jinja::ScriptLoader;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Outcome of a successful [`Migration::run`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Version recorded before the step loop
    pub from_version: Version,
    /// Version recorded when the run finished
    pub to_version: Version,
    /// Versions applied by this run, ascending
    pub applied: Vec<Version>,
    /// Versions reverted by this run, descending
    pub reverted: Vec<Version>,
    /// Nothing was recorded and the target was taken as current
    pub assumed_current: bool,
    /// Script files that were executed, in order
    pub scripts_executed: Vec<String>,
}

/// Migrates one database from its source folder
pub struct Migration {
    loader: ScriptLoader,
    migrations_table: String,
    foreign_db: Option<ForeignDatabase>,
}

impl Migration {
    pub fn new(source_folder: impl Into<PathBuf>, migrations_table: impl Into<String>) -> Self {
        Self {
            loader: ScriptLoader::new(source_folder),
            migrations_table: migrations_table.into(),
            foreign_db: None,
        }
    }

    /// Migration using the source folder and table from `opts`
    pub fn from_options(opts: &ConnectionOptions) -> Self {
        Self::new(opts.source_folder(), opts.migrations_table())
    }

    /// Like [`Migration::from_options`], but a legacy hook keeps its
    /// versions in the legacy metadata table
    pub fn for_hook(opts: &ConnectionOptions, hook: Option<&MigrationHook>) -> Self {
        let table = match hook {
            Some(hook) if hook.is_legacy() => opts.legacy_migrations_table(),
            _ => opts.migrations_table(),
        };
        Self::new(opts.source_folder(), table)
    }

    /// Render the FDW scripts against `foreign_db`
    pub fn with_foreign_database(mut self, foreign_db: ForeignDatabase) -> Self {
        self.foreign_db = Some(foreign_db);
        self
    }

    pub fn source_folder(&self) -> &Path {
        self.loader.source_folder()
    }

    pub fn migrations_table(&self) -> &str {
        &self.migrations_table
    }

    /// Version tracker over this migration's metadata table
    pub fn tracker<'a>(&self, db: &'a dyn Database) -> MetadataTable<'a> {
        MetadataTable::new(db, self.migrations_table.clone())
    }

    /// Run `setup.sql`; `false` when there is nothing to run
    pub async fn execute_setup(&self, db: &dyn Database) -> MigrateResult<bool> {
        self.execute_script(db, SETUP_SCRIPT, false).await
    }

    pub async fn execute_fdw_up(&self, db: &dyn Database) -> MigrateResult<bool> {
        self.execute_script(db, FDW_UP_SCRIPT, true).await
    }

    pub async fn execute_fdw_down(&self, db: &dyn Database) -> MigrateResult<bool> {
        self.execute_script(db, FDW_DOWN_SCRIPT, true).await
    }

    /// Run the before-script for `version`, if there is one
    pub async fn execute_before(&self, db: &dyn Database, version: Version) -> MigrateResult<bool> {
        Ok(self
            .execute_version_script(db, version, ScriptKind::Before)
            .await?
            .is_some())
    }

    /// Run the numbered up-script for `version`, if there is one
    pub async fn execute_up(&self, db: &dyn Database, version: Version) -> MigrateResult<bool> {
        Ok(self
            .execute_version_script(db, version, ScriptKind::Up)
            .await?
            .is_some())
    }

    /// Run the after-script for `version`, if there is one
    pub async fn execute_after(&self, db: &dyn Database, version: Version) -> MigrateResult<bool> {
        Ok(self
            .execute_version_script(db, version, ScriptKind::After)
            .await?
            .is_some())
    }

    /// Run the numbered down-script for `version`, if there is one
    pub async fn execute_down(&self, db: &dyn Database, version: Version) -> MigrateResult<bool> {
        Ok(self
            .execute_version_script(db, version, ScriptKind::Down)
            .await?
            .is_some())
    }

    /// Recorded `(version, dirty)`; see [`crate::tracker::current_version`]
    pub async fn current_version(
        &self,
        db: &dyn Database,
        target: Version,
        start_from_zero: bool,
    ) -> MigrateResult<(Version, bool)> {
        crate::tracker::current_version(&self.tracker(db), target, start_from_zero).await
    }

    /// Bring `db` to `target`.
    ///
    /// `cancel` is checked before each version; a step in flight always
    /// finishes. A target of 0 skips versioning and calls the hook once.
    pub async fn run(
        &self,
        db: &dyn Database,
        hook: Option<&MigrationHook>,
        target: Version,
        start_from_zero: bool,
        cancel: &CancellationToken,
    ) -> MigrateResult<MigrationReport> {
        let mut report = MigrationReport::default();

        if self.execute_setup(db).await? {
            report.scripts_executed.push(SETUP_SCRIPT.to_string());
        }
        if self.execute_fdw_up(db).await? {
            report.scripts_executed.push(FDW_UP_SCRIPT.to_string());
        }

        let result = match hook {
            Some(legacy) if legacy.is_legacy() && target > 0 => {
                self.run_numbered(db, legacy, target, start_from_zero, cancel, &mut report)
                    .await
            }
            _ => {
                self.run_versions(db, hook, target, start_from_zero, cancel, &mut report)
                    .await
            }
        };

        match (result, self.execute_fdw_down(db).await) {
            (Ok(()), Ok(ran)) => {
                if ran {
                    report.scripts_executed.push(FDW_DOWN_SCRIPT.to_string());
                }
                Ok(report)
            }
            (Ok(()), Err(down)) => {
                log::error!("error executing fdw down script: {down}");
                Err(down)
            }
            (Err(err), Ok(_)) => Err(err),
            (Err(err), Err(down)) => {
                log::error!("error executing fdw down script: {down}");
                Err(err)
            }
        }
    }

    async fn run_versions(
        &self,
        db: &dyn Database,
        hook: Option<&MigrationHook>,
        target: Version,
        start_from_zero: bool,
        cancel: &CancellationToken,
        report: &mut MigrationReport,
    ) -> MigrateResult<()> {
        if target == 0 {
            if let Some(hook) = hook {
                call_hook(db, hook, 0).await?;
            }
            log::info!("no migration version set, skipped versioned migration");
            return Ok(());
        }

        let tracker = self.tracker(db);
        let current = resolve_version(&tracker, target, start_from_zero).await?;
        check_clean(current.version, current.dirty)?;

        report.from_version = current.version;
        report.to_version = current.version;

        if current.assumed {
            // Fresh database: the hook builds the current schema in one go
            if let Some(hook) = hook {
                call_hook(db, hook, target).await?;
            }
            record(&tracker, target).await?;
            report.assumed_current = true;
            log::info!("recorded v{target} without running earlier versions");
            return Ok(());
        }

        if current.version > target {
            log::warn!(
                "database is at v{} which is ahead of the requested v{target}; \
                 versioned migration never reverts",
                current.version
            );
        }

        for version in current.version.saturating_add(1)..=target {
            check_cancelled(cancel, version)?;
            self.apply_version(db, hook, &tracker, version, report)
                .await?;
            report.applied.push(version);
            report.to_version = version;
            log::info!("migration for version {version} executed successfully");
        }

        if report.applied.is_empty() {
            log::info!("migration to v{target} skipped: no changes");
        } else {
            log::info!("migration to v{target} succeeded");
        }
        Ok(())
    }

    /// Legacy flow: the hook once, then numbered scripts up or down.
    ///
    /// Only versions with a before, up or after script are steps, so the
    /// target must be one of them.
    async fn run_numbered(
        &self,
        db: &dyn Database,
        hook: &MigrationHook,
        target: Version,
        start_from_zero: bool,
        cancel: &CancellationToken,
        report: &mut MigrationReport,
    ) -> MigrateResult<()> {
        call_hook(db, hook, target).await?;

        let tracker = self.tracker(db);
        let current = resolve_version(&tracker, target, start_from_zero).await?;
        check_clean(current.version, current.dirty)?;

        report.from_version = current.version;
        report.to_version = current.version;

        if current.assumed {
            record(&tracker, target).await?;
            report.assumed_current = true;
            return Ok(());
        }
        if current.version == target {
            log::info!("migration to v{target} skipped: no changes");
            return Ok(());
        }

        let index = discover(self.source_folder())?;
        let scripted: Vec<Version> = index
            .iter()
            .filter(|(_, found)| {
                found.before.is_some() || found.up.is_some() || found.after.is_some()
            })
            .map(|(version, _)| *version)
            .collect();
        if !scripted.contains(&target) {
            return Err(MigrateError::MissingScript {
                version: target,
                kind: ScriptKind::Up.as_str(),
            });
        }

        if target > current.version {
            let pending = scripted
                .iter()
                .copied()
                .filter(|v| *v > current.version && *v <= target);
            for version in pending {
                check_cancelled(cancel, version)?;
                tracker.mark_dirty(version).await?;
                self.apply_version(db, None, &tracker, version, report)
                    .await?;
                report.applied.push(version);
                report.to_version = version;
                log::info!("migration for version {version} executed successfully");
            }
        } else {
            let reverting: Vec<Version> = scripted
                .iter()
                .copied()
                .filter(|v| *v > target && *v <= current.version)
                .rev()
                .collect();
            // every down-script must exist before the first one runs
            let mut down_scripts = Vec::with_capacity(reverting.len());
            for version in &reverting {
                match index.get(version).and_then(|found| found.down.clone()) {
                    Some(name) => down_scripts.push(name),
                    None => {
                        return Err(MigrateError::MissingScript {
                            version: *version,
                            kind: ScriptKind::Down.as_str(),
                        })
                    }
                }
            }

            for (version, script) in reverting.into_iter().zip(down_scripts) {
                check_cancelled(cancel, version)?;
                let previous = scripted
                    .iter()
                    .rev()
                    .copied()
                    .find(|v| *v < version)
                    .unwrap_or(target);
                tracker.mark_dirty(previous).await?;
                if self.execute_script(db, &script, false).await.inspect_err(|e| {
                    log::error!("error running down migration for version {version}: {e}");
                })? {
                    report.scripts_executed.push(script);
                }
                record(&tracker, previous).await?;
                report.reverted.push(version);
                report.to_version = previous;
                log::info!("migration for version {version} reverted successfully");
            }
        }

        log::info!("migration to v{target} succeeded");
        Ok(())
    }

    async fn apply_version(
        &self,
        db: &dyn Database,
        hook: Option<&MigrationHook>,
        tracker: &dyn VersionTracker,
        version: Version,
        report: &mut MigrationReport,
    ) -> MigrateResult<()> {
        self.run_step_script(db, version, ScriptKind::Before, report)
            .await?;
        self.run_step_script(db, version, ScriptKind::Up, report)
            .await?;
        if let Some(hook) = hook {
            call_hook(db, hook, version).await?;
        }
        self.run_step_script(db, version, ScriptKind::After, report)
            .await?;
        record(tracker, version).await
    }

    async fn run_step_script(
        &self,
        db: &dyn Database,
        version: Version,
        kind: ScriptKind,
        report: &mut MigrationReport,
    ) -> MigrateResult<()> {
        match self.execute_version_script(db, version, kind).await {
            Ok(Some(name)) => {
                report.scripts_executed.push(name);
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(e) => {
                log::error!("error running {kind} migration for version {version}: {e}");
                Err(e)
            }
        }
    }

    async fn execute_version_script(
        &self,
        db: &dyn Database,
        version: Version,
        kind: ScriptKind,
    ) -> MigrateResult<Option<String>> {
        let Some(filename) = find_version_script(self.source_folder(), version, kind)? else {
            log::info!("no {kind} migration found for version {version} - skipped");
            return Ok(None);
        };
        self.execute_script(db, &filename, false).await?;
        Ok(Some(filename))
    }

    /// Load, optionally render, and execute one script.
    async fn execute_script(
        &self,
        db: &dyn Database,
        filename: &str,
        templated: bool,
    ) -> MigrateResult<bool> {
        let loaded = match (&self.foreign_db, templated) {
            (Some(foreign_db), true) => self.loader.load(filename, Some(foreign_db)),
            _ => self.loader.load::<()>(filename, None),
        };
        let sql = loaded.map_err(|e| MigrateError::script(filename, e))?;

        if sql.trim().is_empty() {
            log::info!("nothing to execute for script {filename:?}");
            return Ok(false);
        }

        db.execute_batch(&sql)
            .await
            .map_err(|e| MigrateError::script(filename, e))?;
        log::info!("successfully executed script {filename:?}");
        Ok(true)
    }
}

async fn call_hook(db: &dyn Database, hook: &MigrationHook, version: Version) -> MigrateResult<()> {
    hook.as_versioned()
        .migrate(db, version)
        .await
        .map_err(|source| {
            log::error!("error running migration hook for version {version}: {source}");
            MigrateError::Hook { version, source }
        })
}

async fn record(tracker: &dyn VersionTracker, version: Version) -> MigrateResult<()> {
    tracker.force(version).await.inspect_err(|e| {
        log::error!("error setting migration version to {version}: {e}");
    })
}

fn check_clean(version: Version, dirty: bool) -> MigrateResult<()> {
    if dirty {
        log::error!("database migration is dirty at version {version}");
        return Err(MigrateError::Dirty { version });
    }
    Ok(())
}

fn check_cancelled(cancel: &CancellationToken, next: Version) -> MigrateResult<()> {
    if cancel.is_cancelled() {
        log::warn!("migration canceled before version {next}");
        return Err(MigrateError::Cancelled { next });
    }
    Ok(())
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;
