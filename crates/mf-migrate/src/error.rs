//! Error types for mf-migrate

use mf_core::Version;
use mf_db::DbError;
use thiserror::Error;

/// Migration errors
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Invalid hook or run configuration, detected before any I/O (M001)
    #[error("[M001] Invalid migration configuration: {0}")]
    Config(String),

    /// A previous run was interrupted mid-step (M002)
    #[error("[M002] migration table is dirty at version {version}")]
    Dirty { version: Version },

    /// A script could not be read, rendered or executed (M003)
    #[error("[M003] could not run the {script:?} script: {source}")]
    Script {
        script: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The source folder could not be listed (M004)
    #[error("[M004] could not scan {folder} for migration scripts: {source}")]
    Scan {
        folder: String,
        #[source]
        source: std::io::Error,
    },

    /// More than one script claims the same version and kind (M005)
    #[error("[M005] ambiguous {kind} scripts for version {version}: {}", .files.join(", "))]
    Ambiguous {
        version: Version,
        kind: &'static str,
        files: Vec<String>,
    },

    /// The migration hook failed (M006)
    #[error("[M006] migration hook failed for version {version}: {source}")]
    Hook {
        version: Version,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The metadata table holds something unreadable (M007)
    #[error("[M007] Invalid migration metadata: {0}")]
    Tracker(String),

    /// Database error while tracking versions or connecting (M008)
    #[error("[M008] {0}")]
    Database(#[from] DbError),

    /// The run was cancelled between steps (M009)
    #[error("[M009] Migration canceled before version {next}")]
    Cancelled { next: Version },

    /// A numbered migration step has no script to run (M010)
    #[error("[M010] no {kind} script for version {version} in the source folder")]
    MissingScript {
        version: Version,
        kind: &'static str,
    },
}

/// Result type alias for MigrateError
pub type MigrateResult<T> = Result<T, MigrateError>;

impl MigrateError {
    pub(crate) fn script(
        script: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        MigrateError::Script {
            script: script.into(),
            source: source.into(),
        }
    }
}
