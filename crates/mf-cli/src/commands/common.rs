//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use mf_core::{Config, ConnectionOptions, ConnectionOptionsBuilder};
use mf_db::{
    retry_exponential, Connector, Database, DuckDbConnector, INITIAL_RETRY_WAIT,
    NUM_CONNECT_ATTEMPTS,
};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::cli::GlobalArgs;

/// Error type representing a non-zero process exit code.
///
/// Use `return Err(ExitCode(N).into())` instead of `std::process::exit(N)`
/// so that RAII destructors run and cleanup happens properly.
#[derive(Debug)]
pub(crate) struct ExitCode(pub(crate) i32);

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Empty: the command already reported the failure
        write!(f, "")
    }
}

impl std::error::Error for ExitCode {}

/// Loaded project configuration and the directory paths resolve against
pub(crate) struct Project {
    pub(crate) root: PathBuf,
    pub(crate) config: Config,
}

/// Load `migraflow.yml` from `--config` or the project directory
pub(crate) fn load_project(global: &GlobalArgs) -> Result<Project> {
    let config = match &global.config {
        Some(path) => Config::load(path).context("Failed to load configuration file")?,
        None => Config::load_from_dir(&global.project_dir)
            .context("Failed to load project configuration")?,
    };
    Ok(Project {
        root: global.project_dir.clone(),
        config,
    })
}

/// Connection options from the project config with CLI overrides applied
pub(crate) fn connection_options(
    project: &Project,
    global: &GlobalArgs,
    overrides: impl FnOnce(ConnectionOptionsBuilder) -> ConnectionOptionsBuilder,
) -> Result<ConnectionOptions> {
    let mut builder = project.config.connection_options_builder(&project.root);
    if let Some(database) = &global.database {
        builder = builder.with_database_name(database_path(&project.root, database));
    }
    if let Some(password) = &global.password {
        builder = builder.with_password(password.clone());
    }
    overrides(builder)
        .build()
        .context("Invalid connection options")
}

fn database_path(root: &Path, database: &str) -> String {
    if database == ":memory:" || Path::new(database).is_absolute() {
        database.to_string()
    } else {
        root.join(database).display().to_string()
    }
}

/// Token cancelled on Ctrl-C
pub(crate) fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted, stopping after the current step...");
            trigger.cancel();
        }
    });
    token
}

/// Open the database with the standard retry policy
pub(crate) async fn connect(
    opts: &ConnectionOptions,
    run: &CancellationToken,
) -> Result<Arc<dyn Database>> {
    let connector = DuckDbConnector;
    retry_exponential(run, NUM_CONNECT_ATTEMPTS, INITIAL_RETRY_WAIT, || {
        connector.connect(opts)
    })
    .await
    .with_context(|| format!("Failed to connect to database: {}", opts.redacted()))
}

/// Print to stderr when `--verbose` is set
pub(crate) fn verbose(global: &GlobalArgs, msg: &str) {
    if global.verbose {
        eprintln!("[verbose] {}", msg);
    }
}
