//! Project state command handlers.
//!
//! Handles showing pending changes, listing history, and importing or
//! restoring the workspace.

use crate::runner::{Runner, RunnerConfig};

/// Print how the workspace differs from the current state.
pub async fn handle_status(config: RunnerConfig) -> anyhow::Result<()> {
    let runner = Runner::new(config).await?;
    let state = runner.state_manager().current_state().await;
    let pending = runner.state_manager().pending_changes().await?;

    println!("Project: {}", runner.project_id());
    println!("State: {} ({} files)", state.id, state.files.len());
    if pending.is_empty() {
        println!("Workspace matches the current state.");
    } else {
        println!("Pending changes ({}):", pending.summary());
        print!("{pending}");
    }
    Ok(())
}

/// List all persisted states, oldest first.
pub async fn handle_history(config: RunnerConfig) -> anyhow::Result<()> {
    let runner = Runner::new(config).await?;
    let history = runner.state_manager().history().await?;

    if history.is_empty() {
        println!("No states recorded for {}.", runner.project_id());
        return Ok(());
    }

    println!("{:<32} {:<32} {:>6}  {:<20}", "STATE", "PARENT", "FILES", "CREATED");
    println!("{}", "-".repeat(94));
    for summary in history {
        let parent = summary
            .parent_id
            .as_ref()
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<32} {:<32} {:>6}  {:<20}",
            summary.id,
            parent,
            summary.file_count,
            summary.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

/// Commit the workspace as a new state.
pub async fn handle_import(config: RunnerConfig) -> anyhow::Result<()> {
    let runner = Runner::new(config).await?;
    let (state, changes) = runner.state_manager().import_changes().await?;

    println!(
        "Imported {} files as state {} ({}).",
        state.files.len(),
        state.id,
        changes.summary()
    );
    Ok(())
}

/// Overwrite the workspace from the current state.
pub async fn handle_restore(config: RunnerConfig) -> anyhow::Result<()> {
    let runner = Runner::new(config).await?;
    let undone = runner.state_manager().restore_files().await?;
    let state = runner.state_manager().current_state().await;

    if undone.is_empty() {
        println!("Workspace already matches state {}.", state.id);
    } else {
        println!("Restored state {} ({} undone):", state.id, undone.summary());
        print!("{undone}");
    }
    Ok(())
}
