//! Force command implementation

use anyhow::{Context, Result};
use mf_migrate::{Migration, VersionState, VersionTracker};

use crate::cli::{ForceArgs, GlobalArgs};
use crate::commands::common::{cancel_on_ctrl_c, connect, connection_options, load_project};

/// Execute the force command
pub async fn execute(args: &ForceArgs, global: &GlobalArgs) -> Result<()> {
    let project = load_project(global)?;
    let opts = connection_options(&project, global, |b| b)?;

    let run = cancel_on_ctrl_c();
    let db = connect(&opts, &run).await?;
    let tracker = Migration::from_options(&opts).tracker(db.as_ref());

    let previous = tracker.version().await.context("Failed to read migration version")?;
    tracker
        .force(args.version)
        .await
        .with_context(|| format!("Failed to record version {}", args.version))?;
    db.close().await;

    match previous {
        VersionState::Nil => println!("Recorded v{}", args.version),
        VersionState::At { version, dirty } => println!(
            "Recorded v{} (was v{}{})",
            args.version,
            version,
            if dirty { ", dirty" } else { "" }
        ),
    }
    Ok(())
}
