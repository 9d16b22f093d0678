//! Migrate command implementation

use anyhow::Result;
use mf_db::DuckDbConnector;
use mf_migrate::{Bootstrap, MigrationReport};
use std::sync::Arc;

use crate::cli::{GlobalArgs, MigrateArgs, OutputFormat};
use crate::commands::common::{
    cancel_on_ctrl_c, connection_options, load_project, verbose, ExitCode,
};

/// Execute the migrate command
pub async fn execute(args: &MigrateArgs, global: &GlobalArgs) -> Result<()> {
    let project = load_project(global)?;
    let opts = connection_options(&project, global, |mut builder| {
        if let Some(target) = args.target {
            builder = builder.with_migration_version(target);
        }
        if args.start_from_zero {
            builder = builder.with_start_from_zero(true);
        }
        builder
    })?;

    verbose(global, &format!("Connecting to {}", opts.redacted()));
    verbose(
        global,
        &format!("Source folder: {}", opts.source_folder().display()),
    );

    let mut bootstrap = Bootstrap::new(opts, Arc::new(DuckDbConnector));
    if let Some(foreign_db) = &project.config.foreign_database {
        bootstrap = bootstrap.with_foreign_database(foreign_db.clone());
    }

    let run = cancel_on_ctrl_c();
    let ready = match bootstrap.connect_and_migrate(&run).await {
        Ok(ready) => ready,
        Err(e) => {
            eprintln!("Migration failed: {e}");
            return Err(ExitCode(1).into());
        }
    };

    let outcome: Result<()> = match ready.migration {
        Ok(report) => {
            print_report(&report, args.output)?;
            Ok(())
        }
        Err(e) => {
            // halt_on_error is unset: the database is usable but not fully migrated
            eprintln!("Migration failed, database left as is: {e}");
            Err(ExitCode(1).into())
        }
    };

    ready.db.close().await;
    run.cancel();
    outcome
}

fn print_report(report: &MigrationReport, output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Text => {
            for script in &report.scripts_executed {
                println!("  Executed: {script}");
            }
            if report.assumed_current {
                println!(
                    "No version recorded; recorded the schema as v{}",
                    report.to_version
                );
            } else if !report.reverted.is_empty() {
                println!(
                    "Reverted v{} -> v{} ({} version{})",
                    report.from_version,
                    report.to_version,
                    report.reverted.len(),
                    if report.reverted.len() == 1 { "" } else { "s" }
                );
            } else if report.applied.is_empty() {
                println!("Already at v{}, nothing to migrate", report.to_version);
            } else {
                println!(
                    "Migrated v{} -> v{} ({} version{})",
                    report.from_version,
                    report.to_version,
                    report.applied.len(),
                    if report.applied.len() == 1 { "" } else { "s" }
                );
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "migrate_test.rs"]
mod tests;
