//! Configuration types and parsing for migraflow.yml

use crate::error::{CoreError, CoreResult};
use crate::foreign::ForeignDatabase;
use crate::options::{
    ConnectionOptions, ConnectionOptionsBuilder, SslMode, DEFAULT_MAX_IDLE, DEFAULT_MAX_LIFETIME,
    DEFAULT_MAX_OPEN, DEFAULT_MIGRATIONS_TABLE, DEFAULT_SOURCE_FOLDER, LEGACY_MIGRATIONS_TABLE,
};
use crate::Version;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE_NAMES: [&str; 2] = ["migraflow.yml", "migraflow.yaml"];

const MEMORY_DB_PATH: &str = ":memory:";

/// Project configuration from migraflow.yml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Folder holding setup, FDW and per-version scripts, relative to the project
    #[serde(default = "default_source_folder")]
    pub source_folder: String,

    /// Table recording `(version, dirty)`
    #[serde(default = "default_migrations_table")]
    pub migrations_table: String,

    /// Table used instead when the service registers a legacy hook
    #[serde(default = "default_legacy_migrations_table")]
    pub legacy_migrations_table: String,

    /// Database connection configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Migration target and error policy
    #[serde(default)]
    pub migration: MigrationConfig,

    /// Remote side of the FDW link, used to template fdw.up.sql / fdw.down.sql
    #[serde(default)]
    pub foreign_database: Option<ForeignDatabase>,
}

/// Database connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Database path (for DuckDB file-based or :memory:)
    #[serde(default = "default_db_path")]
    pub path: String,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_schema")]
    pub schema: String,

    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub password: String,

    #[serde(default)]
    pub ssl_mode: SslMode,

    /// Root CA for `verify-ca` / `verify-full`
    #[serde(default)]
    pub ssl_root_cert: Option<PathBuf>,

    /// Pool sizing
    #[serde(default)]
    pub pool: PoolConfig,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            host: default_host(),
            port: default_port(),
            schema: default_schema(),
            user: String::new(),
            password: String::new(),
            ssl_mode: SslMode::default(),
            ssl_root_cert: None,
            pool: PoolConfig::default(),
        }
    }
}

/// Connection pool limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolConfig {
    #[serde(default = "default_max_open")]
    pub max_open: usize,

    #[serde(default = "default_max_idle")]
    pub max_idle: usize,

    /// Maximum connection lifetime in seconds
    #[serde(default = "default_max_lifetime_secs")]
    pub max_lifetime_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_open: default_max_open(),
            max_idle: default_max_idle(),
            max_lifetime_secs: default_max_lifetime_secs(),
        }
    }
}

/// Migration target and error policy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MigrationConfig {
    /// Target version; 0 disables versioned migration
    #[serde(default)]
    pub version: Version,

    /// Replay the full history on a database with no recorded version
    #[serde(default)]
    pub start_from_zero: bool,

    /// Treat a failed migration as fatal to startup
    #[serde(default)]
    pub halt_on_error: bool,
}

fn default_source_folder() -> String {
    DEFAULT_SOURCE_FOLDER.to_string()
}

fn default_migrations_table() -> String {
    DEFAULT_MIGRATIONS_TABLE.to_string()
}

fn default_legacy_migrations_table() -> String {
    LEGACY_MIGRATIONS_TABLE.to_string()
}

fn default_db_path() -> String {
    MEMORY_DB_PATH.to_string()
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_max_open() -> usize {
    DEFAULT_MAX_OPEN
}

fn default_max_idle() -> usize {
    DEFAULT_MAX_IDLE
}

fn default_max_lifetime_secs() -> u64 {
    DEFAULT_MAX_LIFETIME.as_secs()
}

impl Config {
    /// Load configuration from a file path
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Config = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a project directory
    /// Looks for migraflow.yml or migraflow.yaml
    pub fn load_from_dir(dir: &Path) -> CoreResult<Self> {
        for name in CONFIG_FILE_NAMES {
            let path = dir.join(name);
            if path.exists() {
                return Self::load(&path);
            }
        }
        Err(CoreError::ConfigNotFound {
            path: dir.join(CONFIG_FILE_NAMES[0]).display().to_string(),
        })
    }

    fn validate(&self) -> CoreResult<()> {
        if self.source_folder.is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "source_folder cannot be empty".to_string(),
            });
        }
        if self.database.path.is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "database.path cannot be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Absolute source folder relative to a project root
    pub fn source_folder_absolute(&self, root: &Path) -> PathBuf {
        root.join(&self.source_folder)
    }

    /// Database path relative to a project root; `:memory:` is kept as-is
    pub fn database_path_absolute(&self, root: &Path) -> String {
        if self.database.path == MEMORY_DB_PATH {
            return self.database.path.clone();
        }
        root.join(&self.database.path).display().to_string()
    }

    /// Build validated [`ConnectionOptions`], resolving paths against `root`
    pub fn connection_options(&self, root: &Path) -> CoreResult<ConnectionOptions> {
        self.connection_options_builder(root).build()
    }

    /// Builder pre-filled from this config, for callers that layer
    /// overrides on top before validating
    pub fn connection_options_builder(&self, root: &Path) -> ConnectionOptionsBuilder {
        let db = &self.database;
        let mut builder = ConnectionOptions::builder()
            .with_host(db.host.clone())
            .with_port(db.port)
            .with_database_name(self.database_path_absolute(root))
            .with_schema(db.schema.clone())
            .with_user(db.user.clone())
            .with_password(db.password.clone())
            .with_ssl_mode(db.ssl_mode)
            .with_max_open(db.pool.max_open)
            .with_max_idle(db.pool.max_idle)
            .with_max_lifetime(Duration::from_secs(db.pool.max_lifetime_secs))
            .with_migration_version(self.migration.version)
            .with_start_from_zero(self.migration.start_from_zero)
            .with_halt_on_error(self.migration.halt_on_error)
            .with_migrations_table(self.migrations_table.clone())
            .with_legacy_migrations_table(self.legacy_migrations_table.clone())
            .with_source_folder(self.source_folder_absolute(root));
        if let Some(cert) = &db.ssl_root_cert {
            builder = builder.with_ssl_root_cert(cert.clone());
        }
        builder
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
