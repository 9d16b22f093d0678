//! Version and dirty-state tracking.

use crate::error::{MigrateError, MigrateResult};
use async_trait::async_trait;
use mf_core::Version;
use mf_db::Database;

/// What the metadata table says about the schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionState {
    /// No version has ever been recorded
    Nil,
    At { version: Version, dirty: bool },
}

/// Reads and records the applied schema version
#[async_trait]
pub trait VersionTracker: Send + Sync {
    async fn version(&self) -> MigrateResult<VersionState>;

    /// Record `version` as applied and clean
    async fn force(&self, version: Version) -> MigrateResult<()>;
}

/// Single-row `(version BIGINT, dirty BOOLEAN)` table in the target database
pub struct MetadataTable<'a> {
    db: &'a dyn Database,
    table: String,
}

impl<'a> MetadataTable<'a> {
    pub fn new(db: &'a dyn Database, table: impl Into<String>) -> Self {
        Self {
            db,
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Create the table if it does not exist yet
    pub async fn ensure_table(&self) -> MigrateResult<()> {
        self.db
            .execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {} (version BIGINT NOT NULL, dirty BOOLEAN NOT NULL)",
                self.table
            ))
            .await?;
        Ok(())
    }

    /// Record `version` as dirty, as an interrupted run would leave it
    pub async fn mark_dirty(&self, version: Version) -> MigrateResult<()> {
        self.write(version, true).await
    }

    async fn write(&self, version: Version, dirty: bool) -> MigrateResult<()> {
        self.ensure_table().await?;
        self.db
            .execute_batch(&format!(
                "DELETE FROM {table}; INSERT INTO {table} (version, dirty) VALUES ({version}, {dirty});",
                table = self.table
            ))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl VersionTracker for MetadataTable<'_> {
    async fn version(&self) -> MigrateResult<VersionState> {
        if !self.db.relation_exists(&self.table).await? {
            return Ok(VersionState::Nil);
        }

        let rows = self
            .db
            .query_rows(&format!(
                "SELECT CAST(version AS VARCHAR), CAST(dirty AS VARCHAR) FROM {} LIMIT 1",
                self.table
            ))
            .await?;

        let Some(row) = rows.first() else {
            return Ok(VersionState::Nil);
        };
        let (raw_version, raw_dirty) = match row.as_slice() {
            [v, d] => (v, d),
            _ => {
                return Err(MigrateError::Tracker(format!(
                    "expected 2 columns in {}, got {}",
                    self.table,
                    row.len()
                )))
            }
        };

        let version = raw_version.parse::<Version>().map_err(|e| {
            MigrateError::Tracker(format!(
                "version {raw_version:?} in {} is not a valid version: {e}",
                self.table
            ))
        })?;
        let dirty = match raw_dirty.as_str() {
            "true" => true,
            "false" => false,
            other => {
                return Err(MigrateError::Tracker(format!(
                    "dirty flag {other:?} in {} is not a boolean",
                    self.table
                )))
            }
        };

        Ok(VersionState::At { version, dirty })
    }

    async fn force(&self, version: Version) -> MigrateResult<()> {
        self.write(version, false).await
    }
}

/// Version the step loop starts after
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ResolvedVersion {
    pub(crate) version: Version,
    pub(crate) dirty: bool,
    /// Nothing is recorded and `target` is to be taken as current; the
    /// caller records it
    pub(crate) assumed: bool,
}

pub(crate) async fn resolve_version(
    tracker: &dyn VersionTracker,
    target: Version,
    start_from_zero: bool,
) -> MigrateResult<ResolvedVersion> {
    match tracker.version().await? {
        VersionState::At { version, dirty } => Ok(ResolvedVersion {
            version,
            dirty,
            assumed: false,
        }),
        VersionState::Nil if start_from_zero => Ok(ResolvedVersion {
            version: 0,
            dirty: false,
            assumed: false,
        }),
        VersionState::Nil => {
            log::info!("no migration version recorded, assuming v{target}");
            Ok(ResolvedVersion {
                version: target,
                dirty: false,
                assumed: true,
            })
        }
    }
}

/// Current `(version, dirty)` for a run towards `target`.
///
/// With nothing recorded, returns `(0, false)` when `start_from_zero` is
/// set; otherwise records `target` and returns `(target, false)`.
pub async fn current_version(
    tracker: &dyn VersionTracker,
    target: Version,
    start_from_zero: bool,
) -> MigrateResult<(Version, bool)> {
    let resolved = resolve_version(tracker, target, start_from_zero).await?;
    if resolved.assumed {
        tracker.force(target).await?;
    }
    Ok((resolved.version, resolved.dirty))
}

#[cfg(test)]
#[path = "tracker_test.rs"]
mod tests;
