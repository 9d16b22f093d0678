//! Status command implementation

use anyhow::{Context, Result};
use mf_core::Version;
use mf_migrate::scripts::{self, FDW_DOWN_SCRIPT, FDW_UP_SCRIPT, SETUP_SCRIPT};
use mf_migrate::{Migration, VersionState, VersionTracker};
use serde::Serialize;

use crate::cli::{GlobalArgs, OutputFormat, StatusArgs};
use crate::commands::common::{cancel_on_ctrl_c, connect, connection_options, load_project};

/// One versioned step as seen from the database
#[derive(Debug, Serialize)]
struct VersionStatus {
    version: Version,
    before: Option<String>,
    up: Option<String>,
    after: Option<String>,
    down: Option<String>,
    applied: bool,
}

#[derive(Debug, Serialize)]
struct StatusReport {
    current_version: Option<Version>,
    dirty: bool,
    target_version: Version,
    fixed_scripts: Vec<String>,
    versions: Vec<VersionStatus>,
}

/// Execute the status command
pub async fn execute(args: &StatusArgs, global: &GlobalArgs) -> Result<()> {
    let project = load_project(global)?;
    let opts = connection_options(&project, global, |b| b)?;
    let source_folder = opts.source_folder();

    let index = scripts::discover(source_folder)
        .with_context(|| format!("Failed to scan {}", source_folder.display()))?;
    let fixed_scripts: Vec<String> = [SETUP_SCRIPT, FDW_UP_SCRIPT, FDW_DOWN_SCRIPT]
        .into_iter()
        .filter(|name| source_folder.join(name).is_file())
        .map(String::from)
        .collect();

    let run = cancel_on_ctrl_c();
    let db = connect(&opts, &run).await?;
    let state = Migration::from_options(&opts)
        .tracker(db.as_ref())
        .version()
        .await
        .context("Failed to read migration version")?;
    db.close().await;

    let (current_version, dirty) = match state {
        VersionState::Nil => (None, false),
        VersionState::At { version, dirty } => (Some(version), dirty),
    };
    let applied_up_to = current_version.unwrap_or(0);

    let report = StatusReport {
        current_version,
        dirty,
        target_version: opts.migration_version(),
        fixed_scripts,
        versions: index
            .into_iter()
            .map(|(version, found)| VersionStatus {
                version,
                before: found.before,
                up: found.up,
                after: found.after,
                down: found.down,
                applied: version <= applied_up_to,
            })
            .collect(),
    };

    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_text(&report),
    }
    Ok(())
}

fn print_text(report: &StatusReport) {
    match report.current_version {
        Some(v) if report.dirty => println!("Current version: v{v} (dirty)"),
        Some(v) => println!("Current version: v{v}"),
        None => println!("Current version: none recorded"),
    }
    println!("Target version:  v{}", report.target_version);

    if !report.fixed_scripts.is_empty() {
        println!();
        println!("Scripts run on every migration:");
        for name in &report.fixed_scripts {
            println!("  {name}");
        }
    }

    println!();
    if report.versions.is_empty() {
        println!("No versioned scripts found");
        return;
    }
    println!(
        "{:<10} {:<9} {:<32} {:<32} AFTER",
        "VERSION", "STATE", "BEFORE", "UP"
    );
    for v in &report.versions {
        let state = if v.applied {
            "applied"
        } else if v.version <= report.target_version {
            "pending"
        } else {
            "future"
        };
        println!(
            "{:<10} {:<9} {:<32} {:<32} {}",
            v.version,
            state,
            v.before.as_deref().unwrap_or("-"),
            v.up.as_deref().unwrap_or("-"),
            v.after.as_deref().unwrap_or("-")
        );
    }
}

#[cfg(test)]
#[path = "status_test.rs"]
mod tests;
