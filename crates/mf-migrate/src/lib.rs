//! mf-migrate - Versioned migration orchestration for Migraflow
//!
//! Brings a database to a target schema version: runs the setup and FDW
//! scripts, walks every pending version through its before-script,
//! migration hook and after-script, and records progress in a metadata
//! table. [`Bootstrap`] wraps this in connection retry and delivers the
//! ready handle to the service.

pub mod bootstrap;
pub mod error;
pub mod hooks;
pub mod orchestrator;
pub mod scripts;
pub mod tracker;

pub use bootstrap::{Bootstrap, Ready};
pub use error::{MigrateError, MigrateResult};
pub use hooks::{
    HookError, HookResult, LegacyAdapter, LegacyMigration, MigrationHook, VersionedMigration,
};
pub use orchestrator::{Migration, MigrationReport};
pub use scripts::{ScriptKind, VersionScripts};
pub use tracker::{current_version, MetadataTable, VersionState, VersionTracker};
