use super::*;
use crate::hooks::HookResult;
use crate::tracker::VersionTracker;
use async_trait::async_trait;
use mf_core::Version;
use mf_db::{DbResult, DuckDbConnector};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use tempfile::TempDir;

/// Fails a fixed number of times, then opens an in-memory DuckDB
struct FlakyConnector {
    failures: u32,
    calls: AtomicU32,
}

impl FlakyConnector {
    fn new(failures: u32) -> Arc<Self> {
        Arc::new(Self {
            failures,
            calls: AtomicU32::new(0),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for FlakyConnector {
    async fn connect(&self, opts: &ConnectionOptions) -> DbResult<Arc<dyn Database>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= self.failures {
            return Err(DbError::ConnectionError(format!(
                "dial tcp: connection refused (attempt {n})"
            )));
        }
        DuckDbConnector.connect(opts).await
    }
}

struct TableHook {
    fail: bool,
}

#[async_trait]
impl VersionedMigration for TableHook {
    async fn migrate(&self, db: &dyn Database, version: Version) -> HookResult {
        if self.fail {
            return Err("schema change rejected".into());
        }
        db.execute_batch(&format!("CREATE TABLE IF NOT EXISTS v{version} (id INT)"))
            .await?;
        Ok(())
    }
}

struct NoopLegacy;

#[async_trait]
impl LegacyMigration for NoopLegacy {
    async fn migrate(&self, _db: &dyn Database) -> HookResult {
        Ok(())
    }
}

/// Creates the `users` table the service reads from
#[derive(Default)]
struct UsersLegacy {
    calls: AtomicU32,
}

#[async_trait]
impl LegacyMigration for UsersLegacy {
    async fn migrate(&self, db: &dyn Database) -> HookResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        db.execute_batch("CREATE TABLE IF NOT EXISTS users (id INT)")
            .await?;
        Ok(())
    }
}

fn options(source: &Path, target: Version, halt_on_error: bool) -> ConnectionOptions {
    ConnectionOptions::builder()
        .with_source_folder(source)
        .with_migration_version(target)
        .with_start_from_zero(true)
        .with_halt_on_error(halt_on_error)
        .build()
        .unwrap()
}

fn counting_setup() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("setup.sql"),
        "CREATE TABLE IF NOT EXISTS setup_runs (n INT); INSERT INTO setup_runs VALUES (1);",
    )
    .unwrap();
    dir
}

#[tokio::test(start_paused = true)]
async fn test_delivers_after_transient_failures() {
    let dir = counting_setup();
    let connector = FlakyConnector::new(2);
    let liveness = Liveness::new();
    let bootstrap = Bootstrap::new(options(dir.path(), 2, true), connector.clone())
        .with_hook(MigrationHook::versioned(Arc::new(TableHook { fail: false })))
        .with_liveness(liveness.clone());

    let db = bootstrap
        .initialize(CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(connector.calls(), 3);
    assert!(liveness.is_live());
    assert!(db.relation_exists("v1").await.unwrap());
    assert!(db.relation_exists("v2").await.unwrap());
    let tracker = crate::tracker::MetadataTable::new(db.as_ref(), "migrations");
    assert_eq!(
        tracker.version().await.unwrap(),
        crate::tracker::VersionState::At {
            version: 2,
            dirty: false
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_closes_empty_when_retries_exhausted() {
    let dir = TempDir::new().unwrap();
    let connector = FlakyConnector::new(u32::MAX);
    let bootstrap = Bootstrap::new(options(dir.path(), 1, true), connector.clone());

    let rx = bootstrap.initialize(CancellationToken::new());
    assert!(rx.await.is_err());
    assert_eq!(connector.calls(), NUM_CONNECT_ATTEMPTS);
    assert!(!bootstrap.liveness().is_live());
}

#[tokio::test(start_paused = true)]
async fn test_connect_reports_exhaustion() {
    let dir = TempDir::new().unwrap();
    let bootstrap = Bootstrap::new(options(dir.path(), 1, true), FlakyConnector::new(u32::MAX))
        .with_retry(3, Duration::from_millis(10));

    let err = bootstrap
        .connect_and_migrate(&CancellationToken::new())
        .await
        .err()
        .unwrap();
    assert!(matches!(
        err,
        MigrateError::Database(DbError::RetriesExhausted { attempts: 3, .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_backoff_closes_empty() {
    let dir = TempDir::new().unwrap();
    let connector = FlakyConnector::new(u32::MAX);
    let bootstrap = Bootstrap::new(options(dir.path(), 1, true), connector.clone());
    let run = CancellationToken::new();

    let rx = bootstrap.initialize(run.clone());
    tokio::time::sleep(Duration::from_millis(1500)).await;
    run.cancel();

    assert!(rx.await.is_err());
    assert_eq!(connector.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_halting_migration_failure_closes_empty() {
    let dir = TempDir::new().unwrap();
    let liveness = Liveness::new();
    let bootstrap = Bootstrap::new(options(dir.path(), 1, true), FlakyConnector::new(0))
        .with_hook(MigrationHook::versioned(Arc::new(TableHook { fail: true })))
        .with_liveness(liveness.clone());

    let rx = bootstrap.initialize(CancellationToken::new());
    assert!(rx.await.is_err());
    assert!(!liveness.is_live());
}

#[tokio::test(start_paused = true)]
async fn test_non_halting_migration_failure_still_delivers() {
    let dir = TempDir::new().unwrap();
    let bootstrap = Bootstrap::new(options(dir.path(), 1, false), FlakyConnector::new(0))
        .with_hook(MigrationHook::versioned(Arc::new(TableHook { fail: true })));

    let ready = bootstrap
        .connect_and_migrate(&CancellationToken::new())
        .await
        .unwrap();
    assert!(matches!(
        ready.migration,
        Err(MigrateError::Hook { version: 1, .. })
    ));
    ready.db.ping().await.unwrap();
    assert!(bootstrap.liveness().is_live());

    let rx = bootstrap.initialize(CancellationToken::new());
    assert!(rx.await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_legacy_hook_with_target_runs_numbered_scripts() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("1_orders.up.sql"), "CREATE TABLE orders (id INT);").unwrap();
    fs::write(
        dir.path().join("2_items.up.sql"),
        "CREATE TABLE items (id INT);",
    )
    .unwrap();
    let legacy = Arc::new(UsersLegacy::default());
    let bootstrap = Bootstrap::new(options(dir.path(), 2, true), FlakyConnector::new(0))
        .with_hook(MigrationHook::legacy(legacy.clone()));

    let ready = bootstrap
        .connect_and_migrate(&CancellationToken::new())
        .await
        .unwrap();
    let report = ready.migration.unwrap();

    assert_eq!(report.applied, vec![1, 2]);
    assert_eq!(legacy.calls.load(Ordering::SeqCst), 1);
    for table in ["users", "orders", "items"] {
        assert!(ready.db.relation_exists(table).await.unwrap());
    }
    // the legacy flow keeps its own metadata table
    let tracker = crate::tracker::MetadataTable::new(ready.db.as_ref(), "schema_migrations");
    assert_eq!(
        tracker.version().await.unwrap(),
        crate::tracker::VersionState::At {
            version: 2,
            dirty: false
        }
    );
    assert!(!ready.db.relation_exists("migrations").await.unwrap());
}

#[test]
fn test_with_migrations_rejects_both_shapes() {
    let dir = TempDir::new().unwrap();
    let result = Bootstrap::new(options(dir.path(), 1, true), FlakyConnector::new(0))
        .with_migrations(
            Some(Arc::new(NoopLegacy)),
            Some(Arc::new(TableHook { fail: false })),
        );
    assert!(matches!(result, Err(MigrateError::Config(_))));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_closes_delivered_handle() {
    let dir = TempDir::new().unwrap();
    let bootstrap = Bootstrap::new(options(dir.path(), 0, true), FlakyConnector::new(0));
    let run = CancellationToken::new();

    let db = bootstrap.initialize(run.clone()).await.unwrap();
    assert!(!db.is_closed());

    run.cancel();
    for _ in 0..100 {
        if db.is_closed() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(db.is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_missing_relation_triggers_remigration() {
    let dir = counting_setup();
    let liveness = Liveness::new();
    let bootstrap = Bootstrap::new(options(dir.path(), 0, true), FlakyConnector::new(0))
        .with_liveness(liveness.clone());
    let db = bootstrap
        .initialize(CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(db.query_count("SELECT * FROM setup_runs").await.unwrap(), 1);

    let remediation = bootstrap
        .handle_database_errors(db.as_ref(), &[DbError::TableNotFound("users".into())])
        .await
        .unwrap();
    assert_eq!(remediation, Remediation::Remigrate);
    assert_eq!(db.query_count("SELECT * FROM setup_runs").await.unwrap(), 2);
    assert!(liveness.is_live());

    let remediation = bootstrap
        .handle_database_errors(db.as_ref(), &[DbError::ConnectionError("reset".into())])
        .await
        .unwrap();
    assert_eq!(remediation, Remediation::None);
    assert!(!liveness.is_live());
}

#[tokio::test(start_paused = true)]
async fn test_remigration_reruns_once_only_legacy_hook() {
    let dir = TempDir::new().unwrap();
    let legacy = Arc::new(UsersLegacy::default());
    let bootstrap = Bootstrap::new(options(dir.path(), 0, true), FlakyConnector::new(0))
        .with_hook(MigrationHook::legacy(legacy.clone()));
    let db = bootstrap
        .initialize(CancellationToken::new())
        .await
        .unwrap();
    assert!(db.relation_exists("users").await.unwrap());

    // the database came back empty
    db.execute_batch("DROP TABLE users").await.unwrap();
    let remediation = bootstrap
        .handle_database_errors(db.as_ref(), &[DbError::TableNotFound("users".into())])
        .await
        .unwrap();

    assert_eq!(remediation, Remediation::Remigrate);
    assert_eq!(legacy.calls.load(Ordering::SeqCst), 2);
    assert!(db.relation_exists("users").await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_remigration_rebuilds_versioned_schema() {
    let dir = TempDir::new().unwrap();
    let opts = ConnectionOptions::builder()
        .with_source_folder(dir.path())
        .with_migration_version(3)
        .build()
        .unwrap();
    let bootstrap = Bootstrap::new(opts, FlakyConnector::new(0))
        .with_hook(MigrationHook::versioned(Arc::new(TableHook { fail: false })));
    let db = bootstrap
        .initialize(CancellationToken::new())
        .await
        .unwrap();
    assert!(db.relation_exists("v3").await.unwrap());

    db.execute_batch("DROP TABLE v3; DROP TABLE migrations;")
        .await
        .unwrap();
    bootstrap
        .handle_database_errors(db.as_ref(), &[DbError::TableNotFound("v3".into())])
        .await
        .unwrap();

    assert!(db.relation_exists("v3").await.unwrap());
    assert!(!db.relation_exists("v1").await.unwrap());
}
