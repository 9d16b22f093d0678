//! Version command implementation

use anyhow::{Context, Result};
use mf_migrate::{Migration, VersionState, VersionTracker};
use serde_json::json;

use crate::cli::{GlobalArgs, OutputFormat, VersionArgs};
use crate::commands::common::{cancel_on_ctrl_c, connect, connection_options, load_project};

/// Execute the version command
pub async fn execute(args: &VersionArgs, global: &GlobalArgs) -> Result<()> {
    let project = load_project(global)?;
    let opts = connection_options(&project, global, |b| b)?;

    let run = cancel_on_ctrl_c();
    let db = connect(&opts, &run).await?;
    let migration = Migration::from_options(&opts);
    let state = migration
        .tracker(db.as_ref())
        .version()
        .await
        .context("Failed to read migration version")?;
    db.close().await;

    match args.output {
        OutputFormat::Json => {
            let value = match state {
                VersionState::Nil => json!({ "version": null, "dirty": false }),
                VersionState::At { version, dirty } => {
                    json!({ "version": version, "dirty": dirty })
                }
            };
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Text => match state {
            VersionState::Nil => println!("No migration version recorded"),
            VersionState::At { version, dirty } if dirty => {
                println!("v{version} (dirty)")
            }
            VersionState::At { version, .. } => println!("v{version}"),
        },
    }
    Ok(())
}
