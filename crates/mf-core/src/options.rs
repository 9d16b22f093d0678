//! Connection options for the migration target database.
//!
//! [`ConnectionOptions`] is built once at bootstrap from defaults plus
//! overrides through [`ConnectionOptionsBuilder`] and is immutable after
//! [`ConnectionOptionsBuilder::build`] validates it.

use crate::error::{CoreError, CoreResult};
use crate::Version;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Default maximum lifetime of a pooled connection
pub const DEFAULT_MAX_LIFETIME: Duration = Duration::from_secs(5 * 60);

/// Default number of idle connections kept in the pool
pub const DEFAULT_MAX_IDLE: usize = 3;

/// Default maximum number of open connections
pub const DEFAULT_MAX_OPEN: usize = 6;

/// Default metadata table for the versioned migration flow
pub const DEFAULT_MIGRATIONS_TABLE: &str = "migrations";

/// Default metadata table for the legacy migration flow
pub const LEGACY_MIGRATIONS_TABLE: &str = "schema_migrations";

/// Default folder holding the SQL scripts
pub const DEFAULT_SOURCE_FOLDER: &str = "sql";

const DEFAULT_DATABASE_NAME: &str = ":memory:";

/// TLS mode used when connecting to the database server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SslMode {
    /// No TLS (default)
    #[default]
    Disable,
    /// TLS, server certificate checked against the root CA
    VerifyCa,
    /// TLS, server certificate and host name checked
    VerifyFull,
}

impl SslMode {
    /// The libpq spelling of this mode
    pub fn as_str(self) -> &'static str {
        match self {
            SslMode::Disable => "disable",
            SslMode::VerifyCa => "verify-ca",
            SslMode::VerifyFull => "verify-full",
        }
    }

    /// Whether this mode needs a root certificate to validate the server
    pub fn requires_root_cert(self) -> bool {
        matches!(self, SslMode::VerifyCa | SslMode::VerifyFull)
    }
}

impl fmt::Display for SslMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SslMode {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s {
            "disable" => Ok(SslMode::Disable),
            "verify-ca" => Ok(SslMode::VerifyCa),
            "verify-full" => Ok(SslMode::VerifyFull),
            other => Err(CoreError::ConfigInvalid {
                message: format!(
                    "unknown ssl mode '{other}'. Valid modes: disable, verify-ca, verify-full"
                ),
            }),
        }
    }
}

/// Validated, immutable connection and migration options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionOptions {
    host: String,
    port: u16,
    database_name: String,
    schema: String,
    user: String,
    password: String,
    ssl_mode: SslMode,
    ssl_root_cert: Option<PathBuf>,
    max_lifetime: Duration,
    max_idle: usize,
    max_open: usize,
    migration_version: Version,
    start_from_zero: bool,
    halt_on_error: bool,
    migrations_table: String,
    legacy_migrations_table: String,
    source_folder: PathBuf,
}

impl ConnectionOptions {
    /// Start building options from the documented defaults
    pub fn builder() -> ConnectionOptionsBuilder {
        ConnectionOptionsBuilder::default()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Database name; the DuckDB connector treats this as the database path
    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn ssl_mode(&self) -> SslMode {
        self.ssl_mode
    }

    pub fn ssl_root_cert(&self) -> Option<&Path> {
        self.ssl_root_cert.as_deref()
    }

    pub fn max_lifetime(&self) -> Duration {
        self.max_lifetime
    }

    pub fn max_idle(&self) -> usize {
        self.max_idle
    }

    pub fn max_open(&self) -> usize {
        self.max_open
    }

    /// Target migration version; 0 means no versioned migration
    pub fn migration_version(&self) -> Version {
        self.migration_version
    }

    pub fn start_from_zero(&self) -> bool {
        self.start_from_zero
    }

    pub fn halt_on_error(&self) -> bool {
        self.halt_on_error
    }

    pub fn migrations_table(&self) -> &str {
        &self.migrations_table
    }

    /// Metadata table for runs driven by a legacy hook
    pub fn legacy_migrations_table(&self) -> &str {
        &self.legacy_migrations_table
    }

    pub fn source_folder(&self) -> &Path {
        &self.source_folder
    }

    /// Connection descriptor without credentials, safe to log
    pub fn redacted(&self) -> String {
        let mut s = format!(
            "host={} port={} dbname={} sslmode={}",
            self.host, self.port, self.database_name, self.ssl_mode
        );
        if self.ssl_mode.requires_root_cert() {
            if let Some(cert) = &self.ssl_root_cert {
                s.push_str(&format!(" sslrootcert={}", cert.display()));
            }
        }
        s
    }

    /// Full libpq-style connection string including credentials
    pub fn connect_string(&self) -> String {
        format!(
            "{} user={} password={}",
            self.redacted(),
            self.user,
            self.password
        )
    }
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        ConnectionOptionsBuilder::default().into_unchecked()
    }
}

/// Builder for [`ConnectionOptions`], seeded with the documented defaults
#[derive(Debug, Clone)]
pub struct ConnectionOptionsBuilder {
    opts: ConnectionOptions,
}

impl Default for ConnectionOptionsBuilder {
    fn default() -> Self {
        Self {
            opts: ConnectionOptions {
                host: "localhost".to_string(),
                port: 5432,
                database_name: DEFAULT_DATABASE_NAME.to_string(),
                schema: "public".to_string(),
                user: String::new(),
                password: String::new(),
                ssl_mode: SslMode::Disable,
                ssl_root_cert: None,
                max_lifetime: DEFAULT_MAX_LIFETIME,
                max_idle: DEFAULT_MAX_IDLE,
                max_open: DEFAULT_MAX_OPEN,
                migration_version: 0,
                start_from_zero: false,
                halt_on_error: false,
                migrations_table: DEFAULT_MIGRATIONS_TABLE.to_string(),
                legacy_migrations_table: LEGACY_MIGRATIONS_TABLE.to_string(),
                source_folder: PathBuf::from(DEFAULT_SOURCE_FOLDER),
            },
        }
    }
}

impl ConnectionOptionsBuilder {
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.opts.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.opts.port = port;
        self
    }

    pub fn with_database_name(mut self, name: impl Into<String>) -> Self {
        self.opts.database_name = name.into();
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.opts.schema = schema.into();
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.opts.user = user.into();
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.opts.password = password.into();
        self
    }

    pub fn with_ssl_mode(mut self, mode: SslMode) -> Self {
        self.opts.ssl_mode = mode;
        self
    }

    pub fn with_ssl_root_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.opts.ssl_root_cert = Some(path.into());
        self
    }

    pub fn with_max_lifetime(mut self, lifetime: Duration) -> Self {
        self.opts.max_lifetime = lifetime;
        self
    }

    pub fn with_max_idle(mut self, max_idle: usize) -> Self {
        self.opts.max_idle = max_idle;
        self
    }

    pub fn with_max_open(mut self, max_open: usize) -> Self {
        self.opts.max_open = max_open;
        self
    }

    pub fn with_migration_version(mut self, version: Version) -> Self {
        self.opts.migration_version = version;
        self
    }

    pub fn with_start_from_zero(mut self, value: bool) -> Self {
        self.opts.start_from_zero = value;
        self
    }

    pub fn with_halt_on_error(mut self, value: bool) -> Self {
        self.opts.halt_on_error = value;
        self
    }

    pub fn with_migrations_table(mut self, table: impl Into<String>) -> Self {
        self.opts.migrations_table = table.into();
        self
    }

    pub fn with_legacy_migrations_table(mut self, table: impl Into<String>) -> Self {
        self.opts.legacy_migrations_table = table.into();
        self
    }

    pub fn with_source_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.opts.source_folder = folder.into();
        self
    }

    /// Validate and freeze the options
    pub fn build(self) -> CoreResult<ConnectionOptions> {
        let mut opts = self.opts;

        if opts.ssl_mode.requires_root_cert() && opts.ssl_root_cert.is_none() {
            return Err(CoreError::ConfigInvalid {
                message: format!(
                    "ssl mode '{}' requires a root certificate path",
                    opts.ssl_mode
                ),
            });
        }

        if opts.max_open == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "max_open must be at least 1".to_string(),
            });
        }

        if opts.max_idle > opts.max_open {
            log::debug!(
                "max_idle ({}) exceeds max_open ({}), clamping",
                opts.max_idle,
                opts.max_open
            );
            opts.max_idle = opts.max_open;
        }

        validate_table_name(&opts.migrations_table)?;
        validate_table_name(&opts.legacy_migrations_table)?;

        Ok(opts)
    }

    fn into_unchecked(self) -> ConnectionOptions {
        self.opts
    }
}

/// Metadata table names are interpolated into SQL, so only plain
/// identifiers with an optional schema qualifier are accepted.
fn validate_table_name(name: &str) -> CoreResult<()> {
    let valid_part =
        |p: &str| !p.is_empty() && p.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() > 2 || !parts.iter().all(|p| valid_part(p)) {
        return Err(CoreError::ConfigInvalid {
            message: format!(
                "invalid migrations table '{name}': use letters, digits, underscores and at most one schema qualifier"
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "options_test.rs"]
mod tests;
